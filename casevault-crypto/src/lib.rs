//! Account-scoped encryption for CaseVault case documents.
//!
//! Provides per-account authenticated encryption using:
//! - PBKDF2-HMAC-SHA256 key derivation from the account id and a
//!   deployment-wide master secret, with a fresh 64-byte salt per envelope
//! - AES-256-GCM with a 16-byte IV and 16-byte tag
//! - A printable envelope carrying salt, IV, tag and ciphertext together
//!
//! # Architecture
//!
//! 1. **Envelope codec**: `encrypt(payload, account)` / `decrypt(envelope,
//!    account)`. The only isolation boundary between accounts.
//!
//! 2. **Field sealer**: encrypts the redactable fields of a structured
//!    record into one envelope, leaving the record shape stable.
//!
//! 3. **Packager**: wraps whole files in a versioned, owner-tagged artifact
//!    for secure download and later re-upload.
//!
//! Higher layers reach the codec only through [`AccountEncryptor`], so they
//! never handle derived keys.

pub mod cipher;
mod codec;
mod config;
pub mod encryptor;
pub mod envelope;
mod error;
pub mod fields;
mod key;
pub mod package;

pub use cipher::{ALGORITHM, IV_SIZE, TAG_SIZE};
pub use codec::EnvelopeCodec;
pub use config::{
    CryptoConfig, DEFAULT_KDF_ITERATIONS, KDF_ITERATIONS_ENV, MASTER_SECRET_ENV, MasterSecret,
};
pub use encryptor::AccountEncryptor;
pub use envelope::{Envelope, HEADER_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use fields::{
    FieldSealer, Record, RedactionSchema, SENTINEL, SealState, SealVersion, SensitiveField,
    seal_state,
};
pub use key::{DerivedKey, KEY_SIZE, KeyDeriver, SALT_SIZE, Salt};
pub use package::{
    HumanInstructions, OpenedPackage, PACKAGE_EXTENSION, PACKAGE_FORMAT_VERSION, PackageInfo,
    PackageMetadata, Packager, SecurePackage,
};
