//! Policy configuration.

use crate::error::{PolicyError, PolicyResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENCRYPTION_ENABLED_ENV: &str = "CASEVAULT_ENCRYPTION_ENABLED";
pub const STAGING_DIR_ENV: &str = "CASEVAULT_STAGING_DIR";
pub const STAGING_TTL_ENV: &str = "CASEVAULT_STAGING_TTL_SECS";

/// Longest accepted staging TTL: one day.
pub const MAX_STAGING_TTL_SECS: u64 = 86_400;

/// Configuration for the sealing pipeline and download service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Seal sensitive record fields on creation.
    pub encryption_enabled: bool,

    /// Directory for staged ephemeral packages.
    pub staging_dir: PathBuf,

    /// How long a staged package survives before deletion (seconds).
    pub staging_ttl_secs: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            encryption_enabled: true,
            staging_dir: std::env::temp_dir().join("casevault-staging"),
            staging_ttl_secs: 300, // 5 minutes for slow clients
        }
    }
}

impl PolicyConfig {
    pub fn staging_ttl(&self) -> Duration {
        Duration::from_secs(self.staging_ttl_secs)
    }

    /// Checks values that cannot be expressed in the type.
    pub fn validate(&self) -> PolicyResult<()> {
        if self.staging_ttl_secs > MAX_STAGING_TTL_SECS {
            return Err(PolicyError::Config(format!(
                "staging TTL of {}s exceeds the {MAX_STAGING_TTL_SECS}s maximum",
                self.staging_ttl_secs
            )));
        }
        Ok(())
    }

    /// Reads overrides from `CASEVAULT_*` environment variables.
    pub fn from_env() -> PolicyResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Applies overrides from an arbitrary variable source on top of the
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> PolicyResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENCRYPTION_ENABLED_ENV) {
            config.encryption_enabled = parse_bool(&raw).ok_or_else(|| {
                PolicyError::Config(format!("{ENCRYPTION_ENABLED_ENV}={raw:?} is not a boolean"))
            })?;
        }
        if let Some(raw) = lookup(STAGING_DIR_ENV) {
            if raw.trim().is_empty() {
                return Err(PolicyError::Config(format!("{STAGING_DIR_ENV} is empty")));
            }
            config.staging_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup(STAGING_TTL_ENV) {
            config.staging_ttl_secs = raw
                .trim()
                .parse()
                .map_err(|e| PolicyError::Config(format!("{STAGING_TTL_ENV}={raw:?}: {e}")))?;
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
