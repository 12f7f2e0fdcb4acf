//! Shared fixtures for casevault-policy integration tests.

#![allow(dead_code)]

use casevault_crypto::{
    AccountEncryptor, CryptoConfig, CryptoError, CryptoResult, EnvelopeCodec, Record,
};
use casevault_policy::PolicyConfig;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;

pub const TEST_ITERATIONS: u32 = 1_000;

pub fn test_codec() -> Arc<EnvelopeCodec> {
    Arc::new(EnvelopeCodec::new(
        CryptoConfig::new("policy-test-secret")
            .unwrap()
            .with_kdf_iterations(TEST_ITERATIONS)
            .unwrap(),
    ))
}

pub fn config(staging: &Path) -> PolicyConfig {
    PolicyConfig {
        staging_dir: staging.to_path_buf(),
        ..PolicyConfig::default()
    }
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture must be an object, got {other}"),
    }
}

pub fn case_record() -> Record {
    record(json!({
        "title": "Exchange fraud report",
        "agency": "Metro PD",
        "caseNumber": "2024-001",
        "victimName": "J. Doe",
        "crimeDescription": "Victim lured into fake exchange; 2.3 BTC stolen.",
        "walletAddresses": ["bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh"],
    }))
}

/// Encryptor whose every call fails.
pub struct FailingEncryptor;

impl AccountEncryptor for FailingEncryptor {
    fn encrypt(&self, _payload: &[u8], _account_id: &str) -> CryptoResult<String> {
        Err(CryptoError::Encryption("hardware key unavailable".into()))
    }

    fn decrypt(&self, _envelope: &str, _account_id: &str) -> CryptoResult<Vec<u8>> {
        Err(CryptoError::Encryption("hardware key unavailable".into()))
    }
}
