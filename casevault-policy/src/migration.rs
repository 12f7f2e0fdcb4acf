//! Forward-only migration of an account's records to the current seal
//! version.
//!
//! | stored state       | action                         |
//! |--------------------|--------------------------------|
//! | plaintext          | sealed                         |
//! | `hybrid-1.0`       | opened, then re-sealed         |
//! | `user-key-1.0`     | left as is                     |
//! | unrecognized tag   | skipped and reported           |
//!
//! There is no operation that writes a record back to plaintext. A re-seal
//! covers the configured schema plus every field the legacy seal covered.

use crate::AUDIT_TARGET;
use crate::blocking::run_blocking;
use crate::config::PolicyConfig;
use crate::error::{PolicyError, PolicyResult};
use casevault_crypto::{
    AccountEncryptor, CryptoError, FieldSealer, RedactionSchema, SealState, seal_state,
};
use casevault_storage::{RecordStore, StoredRecord};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// A record the migration left untouched, and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    pub id: String,
    pub reason: String,
}

/// Outcome of migrating one account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub account_id: String,
    /// Plaintext records that are now sealed.
    pub sealed: Vec<String>,
    /// Legacy-sealed records re-sealed under the current version.
    pub resealed: Vec<String>,
    /// Records already at the current version.
    pub unchanged: Vec<String>,
    pub skipped: Vec<SkippedRecord>,
}

impl MigrationReport {
    /// Number of records written.
    pub fn migrated(&self) -> usize {
        self.sealed.len() + self.resealed.len()
    }
}

enum Step {
    Sealed,
    Resealed,
    Unchanged,
    Skipped(String),
}

/// Upgrades stored records to the current seal version.
#[derive(Clone)]
pub struct Migrator {
    sealer: FieldSealer,
    schema: Arc<RedactionSchema>,
    records: Arc<dyn RecordStore>,
    encryption_enabled: bool,
}

impl Migrator {
    pub fn new(
        encryptor: Arc<dyn AccountEncryptor>,
        records: Arc<dyn RecordStore>,
        config: &PolicyConfig,
    ) -> Self {
        Self {
            sealer: FieldSealer::new(encryptor),
            schema: Arc::new(RedactionSchema::case_document()),
            records,
            encryption_enabled: config.encryption_enabled,
        }
    }

    pub fn with_schema(mut self, schema: RedactionSchema) -> Self {
        self.schema = Arc::new(schema);
        self
    }

    /// Brings every record owned by `account_id` to the current seal
    /// version.
    ///
    /// Records that cannot be opened are skipped and reported rather than
    /// aborting the run. Storage failures abort.
    pub async fn migrate_account(&self, account_id: &str) -> PolicyResult<MigrationReport> {
        if !self.encryption_enabled {
            return Err(PolicyError::SealingDisabled);
        }
        if account_id.is_empty() {
            return Err(CryptoError::MissingAccount.into());
        }

        let records = self.records.clone();
        let owner = account_id.to_string();
        let owned = run_blocking(move || Ok(records.list_by_owner(&owner)?)).await?;

        let mut report = MigrationReport {
            account_id: account_id.to_string(),
            ..MigrationReport::default()
        };

        for record in owned {
            let id = record.id.clone();
            match self.migrate_record(record).await? {
                Step::Sealed => report.sealed.push(id),
                Step::Resealed => report.resealed.push(id),
                Step::Unchanged => report.unchanged.push(id),
                Step::Skipped(reason) => {
                    warn!(
                        target: AUDIT_TARGET,
                        account = account_id,
                        record_id = %id,
                        reason = %reason,
                        "record skipped by migration"
                    );
                    report.skipped.push(SkippedRecord { id, reason });
                }
            }
        }

        info!(
            target: AUDIT_TARGET,
            account = account_id,
            sealed = report.sealed.len(),
            resealed = report.resealed.len(),
            unchanged = report.unchanged.len(),
            skipped = report.skipped.len(),
            "account migration complete"
        );
        Ok(report)
    }

    async fn migrate_record(&self, record: StoredRecord) -> PolicyResult<Step> {
        let step = match seal_state(&record.data) {
            SealState::Plaintext => Step::Sealed,
            SealState::Sealed(version) if version.is_current() => return Ok(Step::Unchanged),
            SealState::Sealed(_) => Step::Resealed,
            SealState::Unrecognized(label) if label.is_empty() => {
                return Ok(Step::Skipped("seal markers without a version".into()));
            }
            SealState::Unrecognized(label) => {
                return Ok(Step::Skipped(format!("unrecognized seal version {label:?}")));
            }
        };

        let sealer = self.sealer.clone();
        let schema = self.schema.clone();
        let records = self.records.clone();

        run_blocking(move || {
            let sealed = match sealer.reseal_fields(&record.data, &schema, &record.owner_id) {
                Ok(sealed) => sealed,
                Err(e) if e.is_access_denied() => {
                    return Ok(Step::Skipped(format!("cannot open sealed content: {e}")));
                }
                Err(e) => return Err(e.into()),
            };
            records.update(&record.id, sealed)?;
            Ok(step)
        })
        .await
    }
}
