//! Shared fixtures for license tests.
//!
//! The keypairs are fixed seeds, so every canonical encoding, digest and
//! Ed25519 signature below is fully deterministic.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;

use signet_crypto::Keypair;
use signet_license::{
    issue, Author, Client, DnsError, Grant, License, LicenseSigned, Pubkey, TxtResolver,
};
use signet_types::{Duration, Timespan, Timestamp};

pub const DOMINION_SK_HEX: &str = "431f3fb4339144cb5bdeb77db3148a5d340269fa3bc0bf2bf598ce0625750fdca991119e30d96539a70cd34983dd00714259f8b60a2163bdb748f3fc0cf036c9";
pub const AWESOME_SK_HEX: &str = "4e4d27b26b6f4db69871709d68da53854bd61aeee70e63e3b3ff124379c1c6147321ce7a2fb87395fe0ff9e2416bc31b9a25475aa2e2375d70f4c326ffd47eb4";

pub const MACHINE_ID_TEXT: &str = "000102030405060708090a0b0c0d0e0f";
pub const MACHINE_UUID: &str = "00010203-0405-4607-8809-0a0b0c0d0e0f";

pub fn keypair_from_hex(sk_hex: &str) -> Keypair {
    let bytes: [u8; 64] = hex::decode(sk_hex).unwrap().try_into().unwrap();
    Keypair::from_sk(&bytes).unwrap()
}

pub fn dominion_keypair() -> Keypair {
    keypair_from_hex(DOMINION_SK_HEX)
}

pub fn awesome_keypair() -> Keypair {
    keypair_from_hex(AWESOME_SK_HEX)
}

pub fn enduser_keypair() -> Keypair {
    Keypair::from_seed(&[0u8; 32])
}

pub fn ts(text: &str) -> Timestamp {
    Timestamp::parse(text).unwrap()
}

pub fn dur(text: &str) -> Duration {
    Duration::parse(text).unwrap()
}

pub fn span(start: &str, length: &str) -> Timespan {
    Timespan::new(Some(ts(start)), Some(dur(length)))
}

pub fn dominion_author() -> Author {
    Author::new("Dominion Research & Development Corp.")
        .with_domain("dominionrnd.com")
        .with_product("Cpppo Test")
        .with_pubkey(Pubkey::from(&dominion_keypair()))
}

/// The base Dominion license: any client, any machine, 1 year.
pub fn dominion_license() -> License {
    License::new(dominion_author()).with_grant(Grant::from_timespan(span(
        "2021-09-30 11:22:33 Canada/Mountain",
        "1y",
    )))
}

pub fn dominion_signed() -> LicenseSigned {
    issue(dominion_license(), &dominion_keypair()).unwrap()
}

/// The Dominion license issued to Awesome, Inc. specifically.
pub fn dominion_for_awesome_signed() -> LicenseSigned {
    let license = License::new(dominion_author())
        .with_client(Client::new(
            "Awesome, Inc.",
            Pubkey::from(&awesome_keypair()),
        ))
        .with_grant(Grant::from_timespan(span(
            "2021-09-30 11:22:33 Canada/Mountain",
            "1y",
        )));
    issue(license, &dominion_keypair()).unwrap()
}

/// Awesome, Inc.'s derived license for End User, LLC, depending on the
/// Dominion license.
pub fn awesome_derived_signed() -> LicenseSigned {
    let license = License::new(
        Author::new("Awesome, Inc.")
            .with_domain("awesome-inc.com")
            .with_product("EtherNet/IP Tool")
            .with_pubkey(Pubkey::from(&awesome_keypair())),
    )
    .with_client(Client::new(
        "End User, LLC",
        Pubkey::from(&enduser_keypair()),
    ))
    .with_dependency(dominion_for_awesome_signed())
    .with_grant(Grant::from_timespan(span(
        "2022-09-29 11:22:33 Canada/Mountain",
        "1y",
    )));
    issue(license, &awesome_keypair()).unwrap()
}

/// Writes the fixture machine-id into `dir`, returning its path.
pub fn write_machine_id(dir: &std::path::Path) -> PathBuf {
    let path = dir.join("machine-id");
    std::fs::write(&path, MACHINE_ID_TEXT).unwrap();
    path
}

/// A canned TXT resolver; unknown names report `NotFound`.
pub struct StubResolver {
    records: HashMap<String, Vec<String>>,
    failing: bool,
}

impl StubResolver {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            failing: false,
        }
    }

    /// A resolver whose every lookup fails like a transport error.
    pub fn failing() -> Self {
        Self {
            records: HashMap::new(),
            failing: true,
        }
    }

    pub fn with_record(mut self, name: &str, record: &str) -> Self {
        self.records
            .entry(name.to_string())
            .or_default()
            .push(record.to_string());
        self
    }
}

impl TxtResolver for StubResolver {
    fn txt(&self, name: &str) -> Result<Vec<String>, DnsError> {
        if self.failing {
            return Err(DnsError::Lookup {
                name: name.to_string(),
                detail: "stub transport failure".to_string(),
            });
        }
        match self.records.get(name) {
            Some(records) => Ok(records.clone()),
            None => Err(DnsError::NotFound {
                name: name.to_string(),
            }),
        }
    }
}
