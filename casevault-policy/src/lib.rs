//! Hybrid encryption policy for CaseVault.
//!
//! Decides what gets encrypted and when:
//!
//! - Sensitive structured fields are sealed on record creation, before the
//!   record is persisted ([`SealingPipeline`])
//! - Rendered files stay plaintext at rest; a secure download wraps the
//!   current file in a fresh package on demand, and an ephemeral download
//!   stages that package briefly on disk ([`DownloadService`])
//! - Plaintext and legacy-sealed records are upgraded forward, one account
//!   at a time ([`Migrator`])
//!
//! All key-derivation work runs on tokio's blocking pool.
//!
//! Audit events are emitted under the [`AUDIT_TARGET`] tracing target.

pub mod blocking;
mod config;
mod download;
mod error;
mod migration;
mod pipeline;

pub use config::{
    ENCRYPTION_ENABLED_ENV, MAX_STAGING_TTL_SECS, PolicyConfig, STAGING_DIR_ENV, STAGING_TTL_ENV,
};
pub use download::{DownloadService, StagedPackage};
pub use error::{ACCESS_DENIED_MESSAGE, PolicyError, PolicyResult};
pub use migration::{MigrationReport, Migrator, SkippedRecord};
pub use pipeline::SealingPipeline;

/// Tracing target for audit events.
pub const AUDIT_TARGET: &str = "casevault::audit";
