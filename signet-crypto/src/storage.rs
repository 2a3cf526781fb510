//! Keypair files: plaintext and password-encrypted forms.
//!
//! Plaintext form: `{"sk": base64(seed ‖ pubkey), "vk": base64(pubkey)}`.
//! Encrypted form: `{"salt": hex(12 bytes), "ciphertext": hex(seed
//! ciphertext + tag)}` where the symmetric key is Argon2id over the
//! password (salted with a digest of the stored salt and the username) and
//! the AEAD is ChaCha20-Poly1305 with the stored salt as nonce.
//!
//! The KDF parameters are fixed by the file format: 19 MiB memory, 2
//! iterations, 1 lane.  Changing them breaks every existing keyfile.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::keypair::{Keypair, SEED_SIZE};
use crate::{CryptoError, CryptoResult};

/// Size of the stored salt (and AEAD nonce) in bytes.
pub const SALT_SIZE: usize = 12;

const KEY_SIZE: usize = 32;
const KDF_MEMORY_KIB: u32 = 19 * 1024;
const KDF_ITERATIONS: u32 = 2;
const KDF_LANES: u32 = 1;

/// A keypair stored in the clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypairPlaintext {
    keypair: Keypair,
}

impl KeypairPlaintext {
    /// Wraps an existing keypair.
    #[must_use]
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Reconstructs from raw secret bytes (32-byte seed or 64-byte
    /// `seed ‖ pubkey`), optionally cross-checking a public key.
    ///
    /// All accepted forms produce identical serializations.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] on malformed or inconsistent
    /// material.
    pub fn from_secret_bytes(sk: &[u8], vk: Option<&[u8]>) -> CryptoResult<Self> {
        let keypair = Keypair::from_secret_bytes(sk)?;
        if let Some(vk) = vk {
            if vk != keypair.vk() {
                return Err(CryptoError::InvalidKey(
                    "public key does not match secret key".to_string(),
                ));
            }
        }
        Ok(Self { keypair })
    }

    /// Reconstructs from base64-encoded fields as stored on disk.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] on malformed base64 or
    /// inconsistent material.
    pub fn from_encoded(sk: &str, vk: Option<&str>) -> CryptoResult<Self> {
        let sk_bytes = BASE64
            .decode(sk)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid sk base64: {e}")))?;
        let vk_bytes = match vk {
            Some(text) => Some(
                BASE64
                    .decode(text)
                    .map_err(|e| CryptoError::InvalidKey(format!("invalid vk base64: {e}")))?,
            ),
            None => None,
        };
        Self::from_secret_bytes(&sk_bytes, vk_bytes.as_deref())
    }

    /// The contained keypair.
    #[must_use]
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Consumes into the contained keypair.
    #[must_use]
    pub fn into_keypair(self) -> Keypair {
        self.keypair
    }

    /// The canonical file form.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Canonical`] when encoding fails.
    pub fn to_canonical(&self) -> CryptoResult<String> {
        Ok(signet_types::canonical::to_canonical(self)?)
    }
}

impl Serialize for KeypairPlaintext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("KeypairPlaintext", 2)?;
        state.serialize_field("sk", &BASE64.encode(self.keypair.sk()))?;
        state.serialize_field("vk", &self.keypair.vk_b64())?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for KeypairPlaintext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Repr {
            sk: String,
            #[serde(default)]
            vk: Option<String>,
        }
        let repr = Repr::deserialize(deserializer)?;
        Self::from_encoded(&repr.sk, repr.vk.as_deref()).map_err(D::Error::custom)
    }
}

/// A keypair encrypted under user credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypairEncrypted {
    salt: [u8; SALT_SIZE],
    ciphertext: Vec<u8>,
}

impl KeypairEncrypted {
    /// Encrypts a keypair's seed under the given credentials with a
    /// freshly generated salt.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyDerivation`] or
    /// [`CryptoError::Encryption`] on primitive failure.
    pub fn encrypt(keypair: &Keypair, username: &str, password: &str) -> CryptoResult<Self> {
        let mut salt = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        Self::encrypt_with_salt(keypair, username, password, salt)
    }

    /// Encrypts a keypair's seed under the given credentials and salt.
    ///
    /// # Errors
    ///
    /// See [`KeypairEncrypted::encrypt`].
    pub fn encrypt_with_salt(
        keypair: &Keypair,
        username: &str,
        password: &str,
        salt: [u8; SALT_SIZE],
    ) -> CryptoResult<Self> {
        let mut key = derive_key(username, password, &salt)?;
        let cipher = ChaCha20Poly1305::new((&key).into());
        key.zeroize();
        let mut seed = keypair.seed();
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&salt), seed.as_ref())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        seed.zeroize();
        Ok(Self { salt, ciphertext })
    }

    /// Reassembles from previously stored parts.
    #[must_use]
    pub fn from_parts(salt: [u8; SALT_SIZE], ciphertext: Vec<u8>) -> Self {
        Self { salt, ciphertext }
    }

    /// Decrypts back into the keypair.  The decrypted seed lives only for
    /// the duration of this call.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::DecryptionFailed`] on wrong credentials or
    /// corrupted ciphertext (authentication tag mismatch).
    pub fn into_keypair(&self, username: &str, password: &str) -> CryptoResult<Keypair> {
        let mut key = derive_key(username, password, &self.salt)?;
        let cipher = ChaCha20Poly1305::new((&key).into());
        key.zeroize();
        let mut seed = cipher
            .decrypt(Nonce::from_slice(&self.salt), self.ciphertext.as_ref())
            .map_err(|_| CryptoError::DecryptionFailed)?;
        if seed.len() != SEED_SIZE {
            seed.zeroize();
            return Err(CryptoError::DecryptionFailed);
        }
        let mut fixed = [0u8; SEED_SIZE];
        fixed.copy_from_slice(&seed);
        seed.zeroize();
        let keypair = Keypair::from_seed(&fixed);
        fixed.zeroize();
        Ok(keypair)
    }

    /// The stored salt.
    #[must_use]
    pub fn salt(&self) -> &[u8; SALT_SIZE] {
        &self.salt
    }

    /// The stored ciphertext (seed ciphertext plus tag).
    #[must_use]
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// The canonical file form.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Canonical`] when encoding fails.
    pub fn to_canonical(&self) -> CryptoResult<String> {
        Ok(signet_types::canonical::to_canonical(self)?)
    }
}

impl Serialize for KeypairEncrypted {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("KeypairEncrypted", 2)?;
        state.serialize_field("ciphertext", &hex::encode(&self.ciphertext))?;
        state.serialize_field("salt", &hex::encode(self.salt))?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for KeypairEncrypted {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Repr {
            salt: String,
            ciphertext: String,
        }
        let repr = Repr::deserialize(deserializer)?;
        let salt_bytes = hex::decode(&repr.salt).map_err(D::Error::custom)?;
        let salt: [u8; SALT_SIZE] = salt_bytes
            .try_into()
            .map_err(|_| D::Error::custom(format!("salt must be {SALT_SIZE} bytes")))?;
        let ciphertext = hex::decode(&repr.ciphertext).map_err(D::Error::custom)?;
        Ok(Self { salt, ciphertext })
    }
}

/// Derives the symmetric key from `(username, password, salt)`.
fn derive_key(username: &str, password: &str, salt: &[u8; SALT_SIZE]) -> CryptoResult<[u8; KEY_SIZE]> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(username.to_lowercase().as_bytes());
    let digest = hasher.finalize();

    let params = Params::new(KDF_MEMORY_KIB, KDF_ITERATIONS, KDF_LANES, Some(KEY_SIZE))
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password.as_bytes(), &digest[..16], &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}
