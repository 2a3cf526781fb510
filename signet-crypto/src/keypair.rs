//! Ed25519 signing keypairs.
//!
//! The secret wire form is 64 bytes: the 32-byte seed followed by the
//! 32-byte public key.  A keypair reconstructed from the seed alone, from
//! the 64-byte secret, or from secret+public together is bit-identical;
//! the embedded public half is always cross-checked against the derived
//! one.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;

use crate::{CryptoError, CryptoResult};

/// Size of the derivation seed in bytes.
pub const SEED_SIZE: usize = 32;
/// Size of the secret key wire form (`seed ‖ pubkey`) in bytes.
pub const SECRET_KEY_SIZE: usize = 64;
/// Size of the public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// An Ed25519 signing keypair.
///
/// Secret material is zeroized on drop (via `ed25519-dalek`); `Debug`
/// shows only the public half.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generates a new random keypair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Derives the keypair deterministically from a 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; SEED_SIZE]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    /// Recovers the keypair from the 64-byte `seed ‖ pubkey` secret form.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] when the embedded public key
    /// does not match the one derived from the seed.
    pub fn from_sk(sk: &[u8; SECRET_KEY_SIZE]) -> CryptoResult<Self> {
        let signing = SigningKey::from_keypair_bytes(sk).map_err(|_| {
            CryptoError::InvalidKey("embedded public key does not match seed".to_string())
        })?;
        Ok(Self { signing })
    }

    /// Recovers the keypair from secret and public halves together.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] when either cross-check fails.
    pub fn from_parts(sk: &[u8; SECRET_KEY_SIZE], vk: &[u8; PUBLIC_KEY_SIZE]) -> CryptoResult<Self> {
        let keypair = Self::from_sk(sk)?;
        if &keypair.vk() != vk {
            return Err(CryptoError::InvalidKey(
                "public key does not match secret key".to_string(),
            ));
        }
        Ok(keypair)
    }

    /// Recovers the keypair from any accepted secret length: a 32-byte
    /// seed or the 64-byte `seed ‖ pubkey` form.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] on any other length or an
    /// inconsistent pair.
    pub fn from_secret_bytes(sk: &[u8]) -> CryptoResult<Self> {
        match sk.len() {
            SEED_SIZE => {
                let mut seed = [0u8; SEED_SIZE];
                seed.copy_from_slice(sk);
                Ok(Self::from_seed(&seed))
            }
            SECRET_KEY_SIZE => {
                let mut full = [0u8; SECRET_KEY_SIZE];
                full.copy_from_slice(sk);
                Self::from_sk(&full)
            }
            other => Err(CryptoError::InvalidKey(format!(
                "secret key must be {SEED_SIZE} or {SECRET_KEY_SIZE} bytes, got {other}"
            ))),
        }
    }

    /// The 32-byte derivation seed.
    #[must_use]
    pub fn seed(&self) -> [u8; SEED_SIZE] {
        self.signing.to_bytes()
    }

    /// The 64-byte secret wire form (`seed ‖ pubkey`).
    #[must_use]
    pub fn sk(&self) -> [u8; SECRET_KEY_SIZE] {
        self.signing.to_keypair_bytes()
    }

    /// The 32-byte public key.
    #[must_use]
    pub fn vk(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.signing.verifying_key().to_bytes()
    }

    /// The public key, base64-encoded.
    #[must_use]
    pub fn vk_b64(&self) -> String {
        BASE64.encode(self.vk())
    }

    /// Signs a message, returning the 64-byte detached signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

impl PartialEq for Keypair {
    fn eq(&self, other: &Self) -> bool {
        self.seed() == other.seed()
    }
}

impl Eq for Keypair {}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("vk", &self.vk_b64())
            .field("sk", &"[REDACTED]")
            .finish()
    }
}

/// Verifies a detached signature against a 32-byte public key.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKey`] for malformed public keys and
/// [`CryptoError::SignatureInvalid`] when the signature does not verify.
pub fn verify_signature(
    message: &[u8],
    signature: &[u8; 64],
    vk: &[u8; PUBLIC_KEY_SIZE],
) -> CryptoResult<()> {
    let verifying = VerifyingKey::from_bytes(vk)
        .map_err(|_| CryptoError::InvalidKey("malformed public key".to_string()))?;
    verifying
        .verify(message, &Signature::from_bytes(signature))
        .map_err(|_| CryptoError::SignatureInvalid)
}
