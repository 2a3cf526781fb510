//! Key material for Signet.
//!
//! This crate handles:
//! - Ed25519 keypair derivation from a 32-byte seed, and recovery from the
//!   64-byte `seed ‖ pubkey` secret form or from secret+public together
//! - Plaintext keypair files (`{"sk": base64, "vk": base64}`)
//! - Password-encrypted keypair files (`{"salt": hex, "ciphertext": hex}`,
//!   Argon2id + ChaCha20-Poly1305)
//!
//! Decryption fails closed: wrong credentials surface as
//! [`CryptoError::DecryptionFailed`], never as garbage key bytes.

mod error;
mod keypair;
mod storage;

pub use error::{CryptoError, CryptoResult};
pub use keypair::{verify_signature, Keypair, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE, SEED_SIZE};
pub use storage::{KeypairEncrypted, KeypairPlaintext, SALT_SIZE};
