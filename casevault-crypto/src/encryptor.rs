//! Abstract encryption interface for routing payloads through the codec.
//!
//! The field sealer, the package builder and the policy layer depend on
//! `Arc<dyn AccountEncryptor>`; they never see derived keys. `EnvelopeCodec`
//! is the production implementation. Tests wrap it to count calls.

use crate::error::CryptoResult;
use std::sync::Arc;

/// Account-scoped encryption of opaque byte payloads.
pub trait AccountEncryptor: Send + Sync {
    /// Encrypt `payload` for `account_id`, returning a printable envelope.
    fn encrypt(&self, payload: &[u8], account_id: &str) -> CryptoResult<String>;

    /// Decrypt an envelope previously produced by `encrypt` for `account_id`.
    fn decrypt(&self, envelope: &str, account_id: &str) -> CryptoResult<Vec<u8>>;
}

impl<T: AccountEncryptor + ?Sized> AccountEncryptor for Arc<T> {
    fn encrypt(&self, payload: &[u8], account_id: &str) -> CryptoResult<String> {
        (**self).encrypt(payload, account_id)
    }

    fn decrypt(&self, envelope: &str, account_id: &str) -> CryptoResult<Vec<u8>> {
        (**self).decrypt(envelope, account_id)
    }
}
