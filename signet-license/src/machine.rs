//! Machine identity: a version-4 UUID derived from stable host
//! identifiers.
//!
//! The machine-id file (explicit path, else the systemd/dbus locations)
//! supplies 32 hex digits; the UUID version and variant bits are forced so
//! the result is a well-formed v4 UUID.  Hosts without a machine-id fall
//! back to a random UUID persisted once under the user config directory,
//! so the identity is reproducible across runs.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::{Builder, Uuid, Variant, Version};

use crate::{LicenseError, LicenseResult};

const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// The verifying host's machine UUID.
///
/// With an explicit `machine_id_path` only that file is consulted; it is
/// an error for it to be missing or unparseable.  Otherwise the standard
/// locations are probed, then the persisted fallback.
///
/// # Errors
///
/// Returns [`LicenseError::Io`] / [`LicenseError::Machine`] when no
/// identity can be established.
pub fn machine_uuid(machine_id_path: Option<&Path>) -> LicenseResult<Uuid> {
    if let Some(path) = machine_id_path {
        let text = fs::read_to_string(path)?;
        return parse_machine_id(text.trim()).ok_or_else(|| {
            LicenseError::Machine(format!("unparseable machine-id in {}", path.display()))
        });
    }
    for candidate in MACHINE_ID_PATHS {
        if let Ok(text) = fs::read_to_string(candidate) {
            if let Some(uuid) = parse_machine_id(text.trim()) {
                return Ok(uuid);
            }
        }
    }
    cached_machine_uuid()
}

/// Parses 32 hex digits (hyphens tolerated) into a v4-stamped UUID.
fn parse_machine_id(text: &str) -> Option<Uuid> {
    let digits: String = text.chars().filter(|c| *c != '-').collect();
    let bytes: [u8; 16] = hex::decode(digits).ok()?.try_into().ok()?;
    Some(
        Builder::from_bytes(bytes)
            .with_variant(Variant::RFC4122)
            .with_version(Version::Random)
            .into_uuid(),
    )
}

/// Read-or-generate-once fallback identity.
fn cached_machine_uuid() -> LicenseResult<Uuid> {
    let dir = dirs::config_dir()
        .ok_or_else(|| LicenseError::Machine("no user config directory".to_string()))?
        .join("signet");
    let path = cache_path(&dir);
    if let Ok(text) = fs::read_to_string(&path) {
        if let Some(uuid) = parse_machine_id(text.trim()) {
            return Ok(uuid);
        }
    }
    let fresh = Uuid::new_v4();
    fs::create_dir_all(&dir)?;
    fs::write(&path, format!("{}\n", fresh.simple()))?;
    Ok(fresh)
}

fn cache_path(dir: &Path) -> PathBuf {
    dir.join("machine-id")
}
