//! Per-account key derivation.
//!
//! Keys are derived with PBKDF2-HMAC-SHA256 from the account identifier
//! combined with the deployment master secret. A fresh 64-byte salt is
//! drawn for every encryption, so the same account never reuses a key
//! across envelopes. The salt travels inside the envelope.

use crate::config::CryptoConfig;
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Size of a derived key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of a key-derivation salt in bytes.
pub const SALT_SIZE: usize = 64;

/// Separator between account id and master secret in the key material.
const MATERIAL_SEPARATOR: u8 = b':';

/// A symmetric key derived for one account and one salt.
///
/// Zeroized on drop. `Debug` never prints key bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    /// Wraps raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(<redacted>)")
    }
}

/// Random salt mixed into key derivation.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    /// Draws a fresh salt from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copies a salt out of a slice; `None` if the length is wrong.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; SALT_SIZE] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({SALT_SIZE} bytes)")
    }
}

/// Derives per-account keys from an injected [`CryptoConfig`].
///
/// Stateless apart from the configuration; safe to share across threads.
/// Derivation is deliberately slow and should run off async executors.
#[derive(Clone, Debug)]
pub struct KeyDeriver {
    config: CryptoConfig,
}

impl KeyDeriver {
    pub fn new(config: CryptoConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CryptoConfig {
        &self.config
    }

    /// Derives the key for `account_id`.
    ///
    /// With `salt = None` a fresh random salt is generated. The salt used is
    /// always returned so the caller can embed it next to the ciphertext.
    pub fn derive(&self, account_id: &str, salt: Option<&Salt>) -> (DerivedKey, Salt) {
        let salt = salt.cloned().unwrap_or_else(Salt::random);
        let material = self.key_material(account_id);

        let mut bytes = [0u8; KEY_SIZE];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            &material,
            salt.as_bytes(),
            self.config.kdf_iterations(),
            &mut bytes,
        );
        let key = DerivedKey::from_bytes(bytes);
        bytes.zeroize();

        (key, salt)
    }

    fn key_material(&self, account_id: &str) -> Zeroizing<Vec<u8>> {
        let secret = self.config.master_secret().as_bytes();
        let mut material = Vec::with_capacity(account_id.len() + 1 + secret.len());
        material.extend_from_slice(account_id.as_bytes());
        material.push(MATERIAL_SEPARATOR);
        material.extend_from_slice(secret);
        Zeroizing::new(material)
    }
}
