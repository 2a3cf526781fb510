mod common;

use common::{
    awesome_derived_signed, enduser_keypair, ts, write_machine_id, MACHINE_ID_TEXT, MACHINE_UUID,
};
use pretty_assertions::assert_eq;
use signet_crypto::{KeypairEncrypted, KeypairPlaintext};
use signet_license::{
    authorize, check, load_keys, load_licenses, machine_uuid, verify, AuthorizeOptions,
    CheckOptions, Grant, Machine, SavePolicy, VerifyOptions,
};

const BASENAME: &str = "etherip-app";
const USERNAME: &str = "a@b.c";
const PASSWORD: &str = "password";

/// Populates a store directory: the end-user keypair in both forms, the
/// derived Awesome license, and the fixture machine-id.
fn seed_store(dir: &std::path::Path) {
    let plaintext = KeypairPlaintext::new(enduser_keypair());
    std::fs::write(
        dir.join(format!("{BASENAME}.crypto-keypair-plaintext")),
        plaintext.to_canonical().unwrap(),
    )
    .unwrap();

    let encrypted = KeypairEncrypted::encrypt(&enduser_keypair(), USERNAME, PASSWORD).unwrap();
    std::fs::write(
        dir.join(format!("{BASENAME}.crypto-keypair")),
        encrypted.to_canonical().unwrap(),
    )
    .unwrap();

    std::fs::write(
        dir.join(format!("{BASENAME}.crypto-license")),
        awesome_derived_signed().to_canonical().unwrap(),
    )
    .unwrap();

    write_machine_id(dir);
}

fn check_opts(dir: &std::path::Path) -> CheckOptions<'static> {
    let mut opts = CheckOptions::new(BASENAME);
    opts.username = Some(USERNAME.to_string());
    opts.password = Some(PASSWORD.to_string());
    opts.now = ts("2022-09-30 00:00:00");
    opts.machine_id_path = Some(dir.join("machine-id"));
    opts.extra = vec![dir.to_path_buf()];
    opts
}

// ── Machine identity ─────────────────────────────────────────────

#[test]
fn machine_uuid_from_fixture_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_machine_id(dir.path());
    let uuid = machine_uuid(Some(&path)).unwrap();
    assert_eq!(uuid.to_string(), MACHINE_UUID);
    assert_eq!(uuid.get_version_num(), 4);
}

#[test]
fn explicit_machine_id_path_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    assert!(machine_uuid(Some(&dir.path().join("absent"))).is_err());
}

// ── Loading ──────────────────────────────────────────────────────

#[test]
fn load_licenses_skips_malformed_files() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());
    std::fs::write(
        dir.path().join(format!("{BASENAME}.crypto-license-broken")),
        "not json",
    )
    .unwrap();
    let loaded = load_licenses(BASENAME, &[dir.path().to_path_buf()]);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].1, awesome_derived_signed());
}

#[test]
fn load_keys_recovers_both_forms() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());
    let keys = load_keys(
        BASENAME,
        Some(USERNAME),
        Some(PASSWORD),
        &[dir.path().to_path_buf()],
    );
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().all(|k| k.keypair == enduser_keypair()));
    assert_eq!(keys.iter().filter(|k| k.encrypted).count(), 1);
}

#[test]
fn load_keys_skips_undecryptable_files() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());
    let keys = load_keys(
        BASENAME,
        Some(USERNAME),
        Some("passwor"),
        &[dir.path().to_path_buf()],
    );
    // The encrypted file fails closed; the plaintext one still loads.
    assert_eq!(keys.len(), 1);
    assert!(!keys[0].encrypted);
}

// ── check ────────────────────────────────────────────────────────

#[test]
fn check_finds_the_valid_candidate() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());
    let found = check(&check_opts(dir.path()));
    // Both keypair files recover the same key; candidates deduplicate.
    assert_eq!(found.len(), 1);
    let (keypair, derived) = &found[0];
    assert_eq!(keypair, &enduser_keypair());
    assert_eq!(
        derived.timespan.start.unwrap().render_canonical(),
        "2022-09-29 17:22:33 UTC"
    );
}

#[test]
fn check_with_wrong_password_still_finds_the_plaintext_key() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());
    let mut opts = check_opts(dir.path());
    opts.password = Some("passwor".to_string());
    assert_eq!(check(&opts).len(), 1);
}

#[test]
fn check_outside_the_window_finds_nothing() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());
    let mut opts = check_opts(dir.path());
    opts.now = ts("2023-06-01 00:00:00"); // past the Dominion expiry
    assert!(check(&opts).is_empty());
}

#[test]
fn check_with_machine_constraint() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());
    let mut opts = check_opts(dir.path());
    opts.constraints = Some(Grant {
        machine: Some(Machine::Bind(true)),
        ..Grant::default()
    });
    let found = check(&opts);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].1.grant.machine, Some(Machine::Bind(true)));
}

#[test]
fn check_on_an_empty_store_returns_empty() {
    let dir = tempfile::tempdir().unwrap();
    write_machine_id(dir.path());
    assert!(check(&check_opts(dir.path())).is_empty());
}

// ── authorize ────────────────────────────────────────────────────

fn authorize_opts(dir: &std::path::Path) -> AuthorizeOptions<'static> {
    let mut opts = AuthorizeOptions::new("awesome-inc.com", "EtherNet/IP Tool", BASENAME);
    opts.username = Some(USERNAME.to_string());
    opts.password = Some(PASSWORD.to_string());
    opts.now = ts("2022-09-30 00:00:00");
    opts.machine_id_path = Some(dir.join("machine-id"));
    opts.extra = vec![dir.to_path_buf()];
    opts.save = SavePolicy::MostSpecific;
    opts
}

#[test]
fn authorize_issues_a_machine_bound_sub_license() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());

    let (agent, signed) = authorize(&authorize_opts(dir.path())).unwrap().unwrap();
    assert_eq!(agent, enduser_keypair()); // located in the store

    // Bound to this machine, derived from the Awesome license.
    assert_eq!(
        signed.license.grant.machine,
        Some(Machine::Id(MACHINE_UUID.parse().unwrap()))
    );
    assert_eq!(signed.license.dependencies.len(), 1);
    assert_eq!(signed.license.dependencies[0], awesome_derived_signed());
    assert!(signed.authenticate().is_ok());

    // Persisted beside the store, named for the machine.
    let saved = dir
        .path()
        .join(format!("{BASENAME}.crypto-license-{MACHINE_UUID}"));
    assert_eq!(
        std::fs::read_to_string(saved).unwrap(),
        signed.to_canonical().unwrap()
    );

    // The sub-license verifies on this machine.
    let vopts = VerifyOptions::new(ts("2022-09-30 00:00:00"))
        .with_machine(MACHINE_UUID.parse().unwrap());
    let derived = verify(&signed, &vopts, None).unwrap();
    assert_eq!(
        derived.timespan.start.unwrap().render_canonical(),
        "2022-09-29 17:22:33 UTC"
    );
}

#[test]
fn authorize_misses_cleanly_for_unknown_products() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());
    let mut opts = authorize_opts(dir.path());
    opts.product = "Some Other Tool".to_string();
    assert!(authorize(&opts).unwrap().is_none());
}

#[test]
fn authorize_generates_an_agent_keypair_when_none_exists() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());
    // Remove the stored keys; only the license remains.
    std::fs::remove_file(dir.path().join(format!("{BASENAME}.crypto-keypair"))).unwrap();
    std::fs::remove_file(
        dir.path()
            .join(format!("{BASENAME}.crypto-keypair-plaintext")),
    )
    .unwrap();

    // The license admits any key: its client names End User, LLC with a
    // concrete pubkey, so a fresh agent key is rejected...
    let result = authorize(&authorize_opts(dir.path())).unwrap();
    assert!(result.is_none());

    // ...but the generated agent keypair was persisted (encrypted, since
    // credentials were given) for future grants.
    let keyfile = dir.path().join(format!("{BASENAME}.crypto-keypair"));
    let text = std::fs::read_to_string(keyfile).unwrap();
    let encrypted: KeypairEncrypted = serde_json::from_str(&text).unwrap();
    assert!(encrypted.into_keypair(USERNAME, PASSWORD).is_ok());
}

#[test]
fn machine_id_text_matches_fixture() {
    // The fixture mirrors a systemd machine-id: bare hex, no hyphens.
    assert_eq!(MACHINE_ID_TEXT.len(), 32);
    assert!(MACHINE_ID_TEXT.bytes().all(|b| b.is_ascii_hexdigit()));
}
