//! Deployment-wide encryption configuration.
//!
//! The master secret is injected explicitly into every component that
//! derives keys. Nothing in this crate reads process globals on its own;
//! `from_env` is a convenience for binaries.

use crate::error::{CryptoError, CryptoResult};
use std::fmt;
use zeroize::Zeroizing;

/// Default PBKDF2 iteration count.
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// Environment variable holding the master secret.
pub const MASTER_SECRET_ENV: &str = "CASEVAULT_MASTER_SECRET";

/// Environment variable overriding the PBKDF2 iteration count.
pub const KDF_ITERATIONS_ENV: &str = "CASEVAULT_KDF_ITERATIONS";

/// Deployment-wide secret mixed into every account key.
///
/// Zeroized on drop. `Debug` never prints the value.
#[derive(Clone)]
pub struct MasterSecret(Zeroizing<String>);

impl MasterSecret {
    pub fn new(secret: impl Into<String>) -> CryptoResult<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(CryptoError::Config("master secret must not be empty".into()));
        }
        Ok(Self(Zeroizing::new(secret)))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(<redacted>)")
    }
}

/// Configuration consumed by [`KeyDeriver`](crate::KeyDeriver) and
/// [`EnvelopeCodec`](crate::EnvelopeCodec).
#[derive(Clone, Debug)]
pub struct CryptoConfig {
    master_secret: MasterSecret,
    kdf_iterations: u32,
}

impl CryptoConfig {
    /// Builds a config with the default iteration count.
    pub fn new(master_secret: impl Into<String>) -> CryptoResult<Self> {
        Ok(Self {
            master_secret: MasterSecret::new(master_secret)?,
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
        })
    }

    /// Overrides the PBKDF2 iteration count.
    ///
    /// Every node of a deployment must agree on this value: it is not
    /// recorded in envelopes.
    pub fn with_kdf_iterations(mut self, iterations: u32) -> CryptoResult<Self> {
        if iterations == 0 {
            return Err(CryptoError::Config("KDF iterations must be positive".into()));
        }
        self.kdf_iterations = iterations;
        Ok(self)
    }

    /// Reads `CASEVAULT_MASTER_SECRET` and `CASEVAULT_KDF_ITERATIONS`.
    pub fn from_env() -> CryptoResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> CryptoResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup(MASTER_SECRET_ENV)
            .ok_or_else(|| CryptoError::Config(format!("{MASTER_SECRET_ENV} is not set")))?;
        let config = Self::new(secret)?;

        match lookup(KDF_ITERATIONS_ENV) {
            Some(raw) => {
                let iterations = raw.trim().parse::<u32>().map_err(|e| {
                    CryptoError::Config(format!("{KDF_ITERATIONS_ENV}={raw:?}: {e}"))
                })?;
                config.with_kdf_iterations(iterations)
            }
            None => Ok(config),
        }
    }

    pub fn master_secret(&self) -> &MasterSecret {
        &self.master_secret
    }

    pub fn kdf_iterations(&self) -> u32 {
        self.kdf_iterations
    }
}
