//! Shared fixtures for casevault-crypto integration tests.

#![allow(dead_code)]

use casevault_crypto::{AccountEncryptor, CryptoConfig, CryptoResult, EnvelopeCodec};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Low iteration count so tests stay fast; production uses the default.
pub const TEST_ITERATIONS: u32 = 1_000;

pub fn test_config() -> CryptoConfig {
    CryptoConfig::new("test-deployment-secret")
        .unwrap()
        .with_kdf_iterations(TEST_ITERATIONS)
        .unwrap()
}

pub fn test_codec() -> EnvelopeCodec {
    EnvelopeCodec::new(test_config())
}

/// Wraps a codec and counts calls into it.
pub struct CountingEncryptor {
    inner: EnvelopeCodec,
    encrypts: AtomicUsize,
    decrypts: AtomicUsize,
}

impl CountingEncryptor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: test_codec(),
            encrypts: AtomicUsize::new(0),
            decrypts: AtomicUsize::new(0),
        })
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypts.load(Ordering::SeqCst)
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }
}

impl AccountEncryptor for CountingEncryptor {
    fn encrypt(&self, payload: &[u8], account_id: &str) -> CryptoResult<String> {
        self.encrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.encrypt(payload, account_id)
    }

    fn decrypt(&self, envelope: &str, account_id: &str) -> CryptoResult<Vec<u8>> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.decrypt(envelope, account_id)
    }
}
