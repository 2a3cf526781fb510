//! Error types for key material handling.

use thiserror::Error;

/// Key material errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key bytes of the wrong length or an inconsistent seed/pubkey pair.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Ed25519 signature verification failed.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// The password KDF rejected its parameters or input.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// AEAD encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Wrong credentials or corrupted ciphertext; the authentication tag
    /// did not match.
    #[error("decryption failed (wrong credentials or corrupted ciphertext)")]
    DecryptionFailed,

    /// Keypair file JSON is malformed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Canonical encoding failed.
    #[error("canonical encoding failed: {0}")]
    Canonical(#[from] signet_types::Error),
}

/// Result type for key material operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
