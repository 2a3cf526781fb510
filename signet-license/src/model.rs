//! The license entity graph and digest/issuance over its canonical form.
//!
//! A `License` binds an author (domain-verified key), an optional client,
//! zero or more dependency licenses, and a grant.  `LicenseSigned` pairs a
//! license with the Ed25519 signature computed once, at issuance, over the
//! license's canonical encoding; the pair is immutable thereafter and any
//! mutation is detected at verification.
//!
//! A dependency embeds as a full `{license, signature}` object; its
//! signature always verifies against the dependency subtree re-encoded
//! standalone, so nesting depth never perturbs signing bytes.

use std::collections::BTreeMap;
use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use signet_crypto::{verify_signature, Keypair};
use signet_types::{canonical, Timespan};

use crate::{LicenseError, LicenseResult};

/// A 32-byte Ed25519 public key, base64 on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pubkey([u8; 32]);

impl Pubkey {
    /// Wraps raw key bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Decodes the base64 wire form.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Crypto`] on malformed base64 or length.
    pub fn from_b64(text: &str) -> LicenseResult<Self> {
        let bytes = BASE64.decode(text).map_err(|e| {
            signet_crypto::CryptoError::InvalidKey(format!("invalid pubkey base64: {e}"))
        })?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            signet_crypto::CryptoError::InvalidKey("public key must be 32 bytes".to_string())
        })?;
        Ok(Self(bytes))
    }

    /// The base64 wire form.
    #[must_use]
    pub fn to_b64(&self) -> String {
        BASE64.encode(self.0)
    }
}

impl From<[u8; 32]> for Pubkey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<&Keypair> for Pubkey {
    fn from(keypair: &Keypair) -> Self {
        Self(keypair.vk())
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_b64())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self.to_b64())
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_b64())
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_b64(&text).map_err(D::Error::custom)
    }
}

/// A 64-byte detached Ed25519 signature, base64 on the wire.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LicenseSignature([u8; 64]);

impl LicenseSignature {
    /// Wraps raw signature bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// The raw signature bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// The base64 wire form.
    #[must_use]
    pub fn to_b64(&self) -> String {
        BASE64.encode(self.0)
    }
}

impl fmt::Debug for LicenseSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LicenseSignature({})", self.to_b64())
    }
}

impl Serialize for LicenseSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_b64())
    }
}

impl<'de> Deserialize<'de> for LicenseSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = BASE64.decode(&text).map_err(D::Error::custom)?;
        let bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("signature must be 64 bytes"))?;
        Ok(Self(bytes))
    }
}

/// The issuing party: the claimed signing key for a domain/product pair.
///
/// `domain` and `product` are only required when DNS confirmation is
/// wanted; `pubkey` may be omitted before issuance (it is filled from the
/// signing key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Author {
    /// The DNS domain publishing the signing key.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub domain: Option<String>,
    /// The organization or agent name.
    pub name: String,
    /// The licensed product.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub product: Option<String>,
    /// The claimed Ed25519 signing public key.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pubkey: Option<Pubkey>,
}

impl Author {
    /// An author with only a name; the rest defaults to `None`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            domain: None,
            name: name.into(),
            product: None,
            pubkey: None,
        }
    }

    /// Sets the publishing domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the licensed product.
    #[must_use]
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Sets the claimed signing key.
    #[must_use]
    pub fn with_pubkey(mut self, pubkey: Pubkey) -> Self {
        self.pubkey = Some(pubkey);
        self
    }

    /// Identification for diagnostics, eg. `Awesome, Inc.'s 'EtherNet/IP
    /// Tool'`.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.product {
            Some(product) => format!("{}'s '{}'", self.name, product),
            None => self.name.clone(),
        }
    }
}

/// The party a license is issued to; absent means any client key may use
/// the license, and an unset pubkey is a wildcard client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Client {
    /// The client name.
    pub name: String,
    /// The client's Ed25519 public key, when constrained.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pubkey: Option<Pubkey>,
}

impl Client {
    /// A client constrained to one key.
    #[must_use]
    pub fn new(name: impl Into<String>, pubkey: Pubkey) -> Self {
        Self {
            name: name.into(),
            pubkey: Some(pubkey),
        }
    }
}

/// A machine-binding constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Machine {
    /// `true`: bind to the verifying machine's UUID at issuance time
    /// (`false` is accepted and means unconstrained).
    Bind(bool),
    /// Only this machine.
    Id(Uuid),
}

/// The rights conferred: a time window, a machine binding, and feature
/// options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Grant {
    /// Machine binding; absent means unconstrained.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub machine: Option<Machine>,
    /// Feature options; merged across the dependency chain.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub option: BTreeMap<String, serde_json::Value>,
    /// Validity window; absent means unbounded.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timespan: Option<Timespan>,
}

impl Grant {
    /// A grant with only a validity window.
    #[must_use]
    pub fn from_timespan(timespan: Timespan) -> Self {
        Self {
            timespan: Some(timespan),
            ..Self::default()
        }
    }

    /// True when nothing is constrained; empty grants are omitted from the
    /// canonical form.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.machine.is_none() && self.option.is_empty() && self.timespan.is_none()
    }
}

/// A license: author, optional client, dependency licenses, and a grant.
///
/// The effective validity window is never wider than any dependency's
/// window; verification computes the intersection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct License {
    /// The issuing party.
    pub author: Author,
    /// The party issued to, when constrained.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub client: Option<Client>,
    /// Licenses this one derives from; all must verify.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dependencies: Vec<LicenseSigned>,
    /// The conferred rights.
    #[serde(skip_serializing_if = "Grant::is_empty", default)]
    pub grant: Grant,
}

impl License {
    /// A license with only an author.
    #[must_use]
    pub fn new(author: Author) -> Self {
        Self {
            author,
            client: None,
            dependencies: Vec::new(),
            grant: Grant::default(),
        }
    }

    /// Sets the client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Appends a dependency license.
    #[must_use]
    pub fn with_dependency(mut self, dependency: LicenseSigned) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Sets the grant.
    #[must_use]
    pub fn with_grant(mut self, grant: Grant) -> Self {
        self.grant = grant;
        self
    }

    /// The license's own validity window (unbounded when unspecified).
    #[must_use]
    pub fn timespan(&self) -> Timespan {
        self.grant.timespan.unwrap_or_default()
    }

    /// The canonical encoding: the exact signing/digest payload.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Types`] when encoding fails.
    pub fn to_canonical(&self) -> LicenseResult<String> {
        Ok(canonical::to_canonical(self)?)
    }

    /// SHA-256 over the canonical encoding.
    ///
    /// # Errors
    ///
    /// See [`License::to_canonical`].
    pub fn digest(&self) -> LicenseResult<[u8; 32]> {
        Ok(Sha256::digest(self.to_canonical()?.as_bytes()).into())
    }

    /// The digest, hex-encoded.
    ///
    /// # Errors
    ///
    /// See [`License::to_canonical`].
    pub fn digest_hex(&self) -> LicenseResult<String> {
        Ok(hex::encode(self.digest()?))
    }

    /// The digest, base64-encoded.
    ///
    /// # Errors
    ///
    /// See [`License::to_canonical`].
    pub fn digest_b64(&self) -> LicenseResult<String> {
        Ok(BASE64.encode(self.digest()?))
    }
}

/// A license plus the detached signature over its canonical encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LicenseSigned {
    /// The signed license.
    pub license: License,
    /// Ed25519 signature over `license`'s canonical encoding.
    pub signature: LicenseSignature,
}

impl LicenseSigned {
    /// Parses the serialized `{license, signature}` form, rejecting
    /// unknown fields.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Serialization`] on malformed input.
    pub fn from_json(text: &str) -> LicenseResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// The canonical serialized form written to license files.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Types`] when encoding fails.
    pub fn to_canonical(&self) -> LicenseResult<String> {
        Ok(canonical::to_canonical(self)?)
    }

    /// SHA-256 over the canonical `{license, signature}` form.
    ///
    /// # Errors
    ///
    /// See [`LicenseSigned::to_canonical`].
    pub fn digest(&self) -> LicenseResult<[u8; 32]> {
        Ok(Sha256::digest(self.to_canonical()?.as_bytes()).into())
    }

    /// The digest, base64-encoded.
    ///
    /// # Errors
    ///
    /// See [`LicenseSigned::to_canonical`].
    pub fn digest_b64(&self) -> LicenseResult<String> {
        Ok(BASE64.encode(self.digest()?))
    }

    /// Verifies the signature against the author's claimed key, over the
    /// freshly re-encoded license.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidSignature`] on any mismatch, and
    /// [`LicenseError::Incompatible`] when the author carries no key to
    /// verify against.
    pub fn authenticate(&self) -> LicenseResult<()> {
        let Some(pubkey) = self.license.author.pubkey else {
            return Err(LicenseError::Incompatible {
                who: self.license.author.describe(),
                detail: "author public key unknown; nothing to authenticate against".to_string(),
            });
        };
        let payload = self.license.to_canonical()?;
        verify_signature(
            payload.as_bytes(),
            self.signature.as_bytes(),
            pubkey.as_bytes(),
        )
        .map_err(|_| LicenseError::InvalidSignature {
            who: self.license.author.describe(),
        })
    }
}

/// Signs a license, producing the immutable `LicenseSigned` pair.
///
/// An absent `author.pubkey` is filled from the signing key; a present one
/// must match it.
///
/// # Errors
///
/// Returns [`LicenseError::Incompatible`] when the claimed author key does
/// not match the signing key.
pub fn issue(mut license: License, keypair: &Keypair) -> LicenseResult<LicenseSigned> {
    let signer = Pubkey::from(keypair);
    match license.author.pubkey {
        None => license.author.pubkey = Some(signer),
        Some(claimed) if claimed != signer => {
            return Err(LicenseError::Incompatible {
                who: license.author.describe(),
                detail: format!(
                    "author key {claimed} does not match signing key {signer}"
                ),
            });
        }
        Some(_) => {}
    }
    let payload = license.to_canonical()?;
    let signature = LicenseSignature::from_bytes(keypair.sign(payload.as_bytes()));
    Ok(LicenseSigned { license, signature })
}
