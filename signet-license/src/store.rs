//! Key/license stores and the authorization search.
//!
//! Licenses and keypairs live in files named `<basename>.crypto-license*`
//! and `<basename>.crypto-keypair*`, searched across a prioritized path
//! list (most specific location first).  `check` pairs every loadable
//! keypair with every license it may wield and yields the candidates that
//! fully verify right now; per-candidate failures are logged and the
//! search continues — "nothing found" is an empty result, never an error.
//! `authorize` goes one step further and issues a machine-bound
//! sub-license from a matching candidate.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use signet_crypto::{CryptoError, Keypair, KeypairEncrypted, KeypairPlaintext};
use signet_types::Timestamp;

use crate::domainkey::TxtResolver;
use crate::machine::machine_uuid;
use crate::model::{issue, Author, Grant, License, LicenseSigned, Machine, Pubkey};
use crate::verify::{verify, LicenseDerived, VerifyOptions};
use crate::{LicenseError, LicenseResult};

/// File extension of serialized signed licenses.
pub const LICENSE_EXTENSION: &str = "crypto-license";
/// File extension of encrypted keypair files.
pub const KEYPAIR_EXTENSION: &str = "crypto-keypair";
/// File extension of plaintext keypair files.
pub const KEYPAIR_PLAINTEXT_EXTENSION: &str = "crypto-keypair-plaintext";

/// Where `authorize` persists newly created artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SavePolicy {
    /// The most general writable location (system/user config).
    #[default]
    MostGeneral,
    /// The most specific writable location (extras, then cwd).
    MostSpecific,
}

/// Configuration search paths for `filename`, most general first: system
/// config, user config, `~/.signet`, current directory, caller extras
/// (explicitly supplied, so most specific).
#[must_use]
pub fn config_paths(filename: &str, extra: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    #[cfg(unix)]
    paths.push(PathBuf::from("/etc/signet").join(filename));
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("signet").join(filename));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".signet").join(filename));
    }
    paths.push(PathBuf::from(filename));
    for dir in extra {
        paths.push(dir.join(filename));
    }
    paths
}

/// Glob-expands a pattern across the search paths, most specific location
/// first, matches within one location in sorted order.
fn glob_files(pattern: &str, extra: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for candidate in config_paths(pattern, extra).iter().rev() {
        let Some(text) = candidate.to_str() else {
            continue;
        };
        let Ok(matches) = glob::glob(text) else {
            debug!(pattern = text, "unusable glob pattern");
            continue;
        };
        let mut batch: Vec<PathBuf> = matches.flatten().collect();
        batch.sort();
        found.extend(batch);
    }
    found
}

/// A keypair recovered from the store.
#[derive(Debug, Clone)]
pub struct LoadedKey {
    /// Where it was found.
    pub path: PathBuf,
    /// The recovered keypair.
    pub keypair: Keypair,
    /// Whether it was recovered from the encrypted form.
    pub encrypted: bool,
}

/// Loads every signed license matching `<basename>.crypto-license*`.
///
/// Unreadable or malformed files are logged and skipped.
#[must_use]
pub fn load_licenses(basename: &str, extra: &[PathBuf]) -> Vec<(PathBuf, LicenseSigned)> {
    let mut found = Vec::new();
    for path in glob_files(&format!("{basename}.{LICENSE_EXTENSION}*"), extra) {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                debug!(path = %path.display(), %err, "license file unreadable");
                continue;
            }
        };
        match LicenseSigned::from_json(&text) {
            Ok(signed) => found.push((path, signed)),
            Err(err) => {
                warn!(path = %path.display(), %err, "license file malformed");
            }
        }
    }
    found
}

/// Loads every keypair matching `<basename>.crypto-keypair*`, trying the
/// encrypted form first, then plaintext.
///
/// Decryption failures (wrong credentials for that file) are logged and
/// skipped; the search continues.
#[must_use]
pub fn load_keys(
    basename: &str,
    username: Option<&str>,
    password: Option<&str>,
    extra: &[PathBuf],
) -> Vec<LoadedKey> {
    let mut found = Vec::new();
    for path in glob_files(&format!("{basename}.{KEYPAIR_EXTENSION}*"), extra) {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                debug!(path = %path.display(), %err, "keypair file unreadable");
                continue;
            }
        };
        if let Ok(encrypted) = serde_json::from_str::<KeypairEncrypted>(&text) {
            let (Some(username), Some(password)) = (username, password) else {
                debug!(path = %path.display(), "encrypted keypair but no credentials");
                continue;
            };
            match encrypted.into_keypair(username, password) {
                Ok(keypair) => found.push(LoadedKey {
                    path,
                    keypair,
                    encrypted: true,
                }),
                Err(CryptoError::DecryptionFailed) => {
                    warn!(path = %path.display(), "keypair decryption failed; skipped");
                }
                Err(err) => {
                    warn!(path = %path.display(), %err, "keypair unusable; skipped");
                }
            }
            continue;
        }
        match serde_json::from_str::<KeypairPlaintext>(&text) {
            Ok(plaintext) => found.push(LoadedKey {
                path,
                keypair: plaintext.into_keypair(),
                encrypted: false,
            }),
            Err(err) => {
                debug!(path = %path.display(), %err, "not a keypair file");
            }
        }
    }
    found
}

/// Options for [`check`].
pub struct CheckOptions<'a> {
    /// Store basename the key/license globs derive from.
    pub basename: String,
    /// Credentials for encrypted keypair files.
    pub username: Option<String>,
    /// Credentials for encrypted keypair files.
    pub password: Option<String>,
    /// Confirm author keys against DNS.
    pub confirm: bool,
    /// The instant validity is judged at.
    pub now: Timestamp,
    /// Explicit machine-id file, for tests and containers.
    pub machine_id_path: Option<PathBuf>,
    /// Extra store directories, general to specific.
    pub extra: Vec<PathBuf>,
    /// Additional grant constraints every candidate must satisfy.
    pub constraints: Option<Grant>,
    /// TXT resolver used when `confirm` is set.
    pub resolver: Option<&'a dyn TxtResolver>,
}

impl CheckOptions<'_> {
    /// Options judging validity now, with no confirmation, credentials or
    /// constraints.
    #[must_use]
    pub fn new(basename: impl Into<String>) -> Self {
        Self {
            basename: basename.into(),
            username: None,
            password: None,
            confirm: false,
            now: Timestamp::now(),
            machine_id_path: None,
            extra: Vec::new(),
            constraints: None,
            resolver: None,
        }
    }
}

/// Searches the stores for `(keypair, license)` pairs that fully verify
/// right now under the given constraints.
///
/// This is a filter, not a single verification: per-candidate failures are
/// logged and skipped, duplicate `(key, license)` pairs collapse, and an
/// empty result is a normal outcome.
#[must_use]
pub fn check(opts: &CheckOptions<'_>) -> Vec<(Keypair, LicenseDerived)> {
    let machine_id = match machine_uuid(opts.machine_id_path.as_deref()) {
        Ok(uuid) => Some(uuid),
        Err(err) => {
            warn!(%err, "no machine identity; machine constraints unenforced");
            None
        }
    };

    let keys = load_keys(
        &opts.basename,
        opts.username.as_deref(),
        opts.password.as_deref(),
        &opts.extra,
    );
    let licenses = load_licenses(&opts.basename, &opts.extra);

    let mut seen: BTreeSet<([u8; 32], [u8; 32])> = BTreeSet::new();
    let mut found = Vec::new();
    for key in &keys {
        for (path, signed) in &licenses {
            if !admits(&signed.license, &key.keypair) {
                debug!(path = %path.display(), "license not usable by this key");
                continue;
            }
            let mut vopts = VerifyOptions::new(opts.now);
            vopts.confirm = opts.confirm;
            vopts.resolver = opts.resolver;
            vopts.machine_id = machine_id;
            match verify(signed, &vopts, opts.constraints.as_ref()) {
                Ok(derived) => {
                    if !derived.timespan.contains(opts.now) {
                        debug!(
                            path = %path.display(),
                            window = %derived.timespan.describe(),
                            "license not currently valid"
                        );
                        continue;
                    }
                    let Ok(digest) = signed.license.digest() else {
                        continue;
                    };
                    if seen.insert((key.keypair.vk(), digest)) {
                        found.push((key.keypair.clone(), derived));
                    }
                }
                Err(err) => {
                    debug!(path = %path.display(), %err, "candidate rejected");
                }
            }
        }
    }
    found
}

/// Whether `keypair` may wield this license: it is the constrained client,
/// the client is a wildcard or absent, or it authored the license itself.
fn admits(license: &License, keypair: &Keypair) -> bool {
    let vk = Pubkey::from(keypair);
    if license.author.pubkey == Some(vk) {
        return true;
    }
    match &license.client {
        None => true,
        Some(client) => client.pubkey.is_none_or(|pubkey| pubkey == vk),
    }
}

/// Options for [`authorize`].
pub struct AuthorizeOptions<'a> {
    /// The domain whose product is wanted.
    pub domain: String,
    /// The wanted product.
    pub product: String,
    /// Store basename the key/license globs derive from.
    pub basename: String,
    /// Name of the requesting agent, recorded as the derived license's
    /// author (defaults to the basename).
    pub agent_name: Option<String>,
    /// Credentials for encrypted keypair files (and for encrypting a
    /// freshly created agent keypair).
    pub username: Option<String>,
    /// See `username`.
    pub password: Option<String>,
    /// Confirm author keys against DNS.
    pub confirm: bool,
    /// The instant validity is judged at.
    pub now: Timestamp,
    /// Explicit machine-id file, for tests and containers.
    pub machine_id_path: Option<PathBuf>,
    /// Extra store directories, general to specific.
    pub extra: Vec<PathBuf>,
    /// Where new artifacts are persisted.
    pub save: SavePolicy,
    /// TXT resolver used when `confirm` is set.
    pub resolver: Option<&'a dyn TxtResolver>,
}

impl AuthorizeOptions<'_> {
    /// Options for the common offline case.
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        product: impl Into<String>,
        basename: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            product: product.into(),
            basename: basename.into(),
            agent_name: None,
            username: None,
            password: None,
            confirm: false,
            now: Timestamp::now(),
            machine_id_path: None,
            extra: Vec::new(),
            save: SavePolicy::default(),
            resolver: None,
        }
    }
}

/// Finds a verified license granting `(domain, product)`, and issues a new
/// sub-license bound to this machine and to the local agent keypair
/// (located in the store, or freshly generated and persisted).
///
/// Returns `Ok(None)` when no applicable valid license exists.
///
/// # Errors
///
/// Returns errors only for the issuance side (no machine identity, key
/// creation or persistence failures); search misses are `Ok(None)`.
pub fn authorize(opts: &AuthorizeOptions<'_>) -> LicenseResult<Option<(Keypair, LicenseSigned)>> {
    let machine = machine_uuid(opts.machine_id_path.as_deref())?;

    // Locate the agent keypair, or create and persist one.
    let agent = match load_keys(
        &opts.basename,
        opts.username.as_deref(),
        opts.password.as_deref(),
        &opts.extra,
    )
    .into_iter()
    .next()
    {
        Some(loaded) => loaded.keypair,
        None => create_agent_keypair(opts)?,
    };

    // Search for a currently valid license granting the wanted product to
    // this agent on this machine.
    let constraints = Grant {
        machine: Some(Machine::Bind(true)),
        ..Grant::default()
    };
    let mut vopts = VerifyOptions::new(opts.now).with_machine(machine);
    vopts.confirm = opts.confirm;
    vopts.resolver = opts.resolver;

    let mut derived = None;
    for (path, signed) in load_licenses(&opts.basename, &opts.extra) {
        if !admits(&signed.license, &agent) {
            continue;
        }
        if !grants_product(&signed.license, &opts.domain, &opts.product) {
            debug!(path = %path.display(), "license does not cover the wanted product");
            continue;
        }
        match verify(&signed, &vopts, Some(&constraints)) {
            Ok(candidate) if candidate.timespan.contains(opts.now) => {
                derived = Some(candidate);
                break;
            }
            Ok(candidate) => {
                debug!(
                    path = %path.display(),
                    window = %candidate.timespan.describe(),
                    "license not currently valid"
                );
            }
            Err(err) => {
                debug!(path = %path.display(), %err, "candidate rejected");
            }
        }
    }
    let Some(derived) = derived else {
        return Ok(None);
    };

    // Issue the derived, machine-bound sub-license, signed by the agent.
    let agent_name = opts
        .agent_name
        .clone()
        .unwrap_or_else(|| opts.basename.clone());
    let license = License::new(Author::new(agent_name).with_pubkey(Pubkey::from(&agent)))
        .with_dependency(derived.signed)
        .with_grant(Grant {
            machine: Some(Machine::Id(machine)),
            option: derived.grant.option,
            timespan: None,
        });
    let signed = issue(license, &agent)?;

    let filename = format!(
        "{}.{LICENSE_EXTENSION}-{}",
        opts.basename,
        machine.as_hyphenated()
    );
    let saved = save_file(
        opts.save,
        &opts.extra,
        &filename,
        signed.to_canonical()?.as_bytes(),
    )?;
    debug!(path = %saved.display(), "derived license saved");

    Ok(Some((agent, signed)))
}

/// Whether this license, or anything it transitively depends on, covers
/// `(domain, product)`.
fn grants_product(license: &License, domain: &str, product: &str) -> bool {
    let own = license
        .author
        .domain
        .as_deref()
        .is_some_and(|d| d.eq_ignore_ascii_case(domain))
        && license.author.product.as_deref() == Some(product);
    own || license
        .dependencies
        .iter()
        .any(|dep| grants_product(&dep.license, domain, product))
}

/// Generates the agent keypair and persists it — encrypted when
/// credentials were supplied, plaintext otherwise.
fn create_agent_keypair(opts: &AuthorizeOptions<'_>) -> LicenseResult<Keypair> {
    let keypair = Keypair::generate();
    let (filename, contents) = match (opts.username.as_deref(), opts.password.as_deref()) {
        (Some(username), Some(password)) => (
            format!("{}.{KEYPAIR_EXTENSION}", opts.basename),
            KeypairEncrypted::encrypt(&keypair, username, password)?.to_canonical()?,
        ),
        _ => (
            format!("{}.{KEYPAIR_PLAINTEXT_EXTENSION}", opts.basename),
            KeypairPlaintext::new(keypair.clone()).to_canonical()?,
        ),
    };
    let saved = save_file(opts.save, &opts.extra, &filename, contents.as_bytes())?;
    debug!(path = %saved.display(), "agent keypair saved");
    Ok(keypair)
}

/// Writes `contents` to the first writable candidate location under the
/// save policy, returning the path used.
fn save_file(
    policy: SavePolicy,
    extra: &[PathBuf],
    filename: &str,
    contents: &[u8],
) -> LicenseResult<PathBuf> {
    let mut candidates = config_paths(filename, extra);
    if policy == SavePolicy::MostSpecific {
        candidates.reverse();
    }
    let mut last_err: Option<std::io::Error> = None;
    for candidate in candidates {
        if let Some(parent) = candidate.parent() {
            if !parent.as_os_str().is_empty() && fs::create_dir_all(parent).is_err() {
                continue;
            }
        }
        match fs::write(&candidate, contents) {
            Ok(()) => return Ok(candidate),
            Err(err) => last_err = Some(err),
        }
    }
    Err(LicenseError::Io(last_err.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no writable location for {filename}"),
        )
    })))
}
