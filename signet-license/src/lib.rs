//! Signed license chains for Signet.
//!
//! A [`License`] binds an author (identified by a domain-verified Ed25519
//! key), an optional client, a grant (time window, machine binding,
//! feature options), and zero or more dependency licenses that must
//! themselves be valid and whose windows constrain the derived license.
//! This crate answers: is this signed license, and everything it
//! transitively depends on, currently valid for this machine and client —
//! and does the author's claimed key match the one published out-of-band
//! in DNS?
//!
//! # Verification flow
//!
//! Serialized license bytes → canonical re-encoding → digest → signature
//! check → per-dependency recursion → timespan intersection → merged
//! grant view.  Issuance runs the same pipe the other way: license value
//! → canonical encoding → sign → attach signature → serialize.
//!
//! # Trust model
//!
//! Whoever controls the DNS TXT record for a domain is the authority for
//! keys under that domain.  There is no revocation list, transparency log
//! or cross-signing.
//!
//! The core is computation-only: pure functions over immutable values
//! plus blocking DNS/file reads.  Scheduling belongs to the host
//! application.

mod domainkey;
mod error;
mod machine;
mod model;
mod store;
mod verify;

pub use domainkey::{
    confirm_author, domainkey, domainkey_service, fetch_domainkey, parse_domainkey_record,
    SystemResolver, TxtResolver, DOMAINKEY_SERVICE,
};
pub use error::{DnsError, LicenseError, LicenseResult};
pub use machine::machine_uuid;
pub use model::{
    issue, Author, Client, Grant, License, LicenseSignature, LicenseSigned, Machine, Pubkey,
};
pub use store::{
    authorize, check, config_paths, load_keys, load_licenses, AuthorizeOptions, CheckOptions,
    LoadedKey, SavePolicy, KEYPAIR_EXTENSION, KEYPAIR_PLAINTEXT_EXTENSION, LICENSE_EXTENSION,
};
pub use verify::{verify, LicenseDerived, VerifyOptions};

#[cfg(feature = "online")]
pub use domainkey::DohResolver;

// The temporal and key-material vocabulary of licenses, re-exported for
// callers.
pub use signet_crypto::{Keypair, KeypairEncrypted, KeypairPlaintext};
pub use signet_types::{Duration, Timespan, Timestamp};

