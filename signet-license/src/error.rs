//! Error types for license issuance and verification.
//!
//! The taxonomy matters to callers: `InvalidSignature` is fatal with no
//! retry; `Incompatible` is fatal for one candidate but a search over many
//! continues past it; `Dns` carries a `NotFound`/`Lookup` distinction so
//! the call site can decide whether a failed confirmation is fatal or
//! skipped (offline/dev environments).

use thiserror::Error;

use signet_crypto::CryptoError;

/// DNS TXT resolution failures, distinguishable by kind.
#[derive(Debug, Error)]
pub enum DnsError {
    /// The record does not exist (NXDOMAIN / empty answer).
    #[error("no TXT record found at {name}")]
    NotFound {
        /// The queried record path.
        name: String,
    },

    /// The lookup could not be completed (timeout, transport failure,
    /// missing resolver configuration).
    #[error("DNS lookup for {name} failed: {detail}")]
    Lookup {
        /// The queried record path.
        name: String,
        /// Resolver-reported cause.
        detail: String,
    },
}

/// Licensing errors.
///
/// Every fatal variant names the license it concerns (author and product)
/// and the concrete values that conflicted, sufficient to diagnose without
/// re-running under a debugger.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The signature does not verify over the canonical encoding.
    #[error("license for {who}: signature does not verify")]
    InvalidSignature {
        /// The license's author and product.
        who: String,
    },

    /// A semantic conflict: key mismatch, timespan non-overlap, machine or
    /// client mismatch.
    #[error("license for {who}: {detail}")]
    Incompatible {
        /// The license's author and product.
        who: String,
        /// The concrete conflicting values.
        detail: String,
    },

    /// A license depends, possibly indirectly, on itself.
    #[error("license for {who}: circular dependency")]
    Circular {
        /// The license's author and product.
        who: String,
    },

    /// Author-key confirmation could not be attempted.
    #[error(transparent)]
    Dns(#[from] DnsError),

    /// A published domainkey TXT record that does not parse.
    #[error("malformed domainkey record {record:?}: {detail}")]
    MalformedRecord {
        /// The record text as fetched.
        record: String,
        /// What was wrong with it.
        detail: String,
    },

    /// A label that cannot be punycode-encoded.
    #[error("cannot punycode-encode label {0:?}")]
    Punycode(String),

    /// Key material failures, including `CryptoError::DecryptionFailed`.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Malformed duration/timestamp literals or canonical-encoding
    /// failures.
    #[error(transparent)]
    Types(#[from] signet_types::Error),

    /// Malformed license JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File I/O on license or keypair storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No machine identity could be established.
    #[error("no machine identity available: {0}")]
    Machine(String),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
