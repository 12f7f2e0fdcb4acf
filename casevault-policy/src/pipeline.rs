//! Record creation and reading under the sealing policy.

use crate::AUDIT_TARGET;
use crate::blocking::run_blocking;
use crate::config::PolicyConfig;
use crate::error::{PolicyError, PolicyResult};
use casevault_crypto::fields::RESERVED_FIELDS;
use casevault_crypto::{AccountEncryptor, CryptoError, FieldSealer, Record, RedactionSchema};
use casevault_storage::{RecordStore, StoredRecord};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Seals sensitive fields between "record created" and "record persisted".
///
/// With encryption enabled, a record reaches the store only in sealed form;
/// if sealing fails nothing is written. With encryption disabled, records
/// are stored as given and never carry seal markers.
#[derive(Clone)]
pub struct SealingPipeline {
    sealer: FieldSealer,
    schema: Arc<RedactionSchema>,
    records: Arc<dyn RecordStore>,
    encryption_enabled: bool,
}

impl SealingPipeline {
    /// Creates a pipeline using the case-document redaction schema.
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

    pub fn encryption_enabled(&self) -> bool {
        self.encryption_enabled
    }

    pub fn schema(&self) -> &RedactionSchema {
        &self.schema
    }

    /// Seals (when enabled) and persists a new record for `owner_id`.
    ///
    /// Returns the record as stored.
    pub async fn create_record(&self, owner_id: &str, data: Record) -> PolicyResult<StoredRecord> {
        if owner_id.is_empty() {
            return Err(CryptoError::MissingAccount.into());
        }
        if let Some(reserved) = RESERVED_FIELDS.iter().find(|f| data.contains_key(**f)) {
            return Err(CryptoError::ReservedField((*reserved).to_string()).into());
        }

        let stored_data = if self.encryption_enabled {
            let sealer = self.sealer.clone();
            let schema = self.schema.clone();
            let owner = owner_id.to_string();
            let sealed = run_blocking(move || Ok(sealer.seal_fields(&data, &schema, &owner)?)).await;
            match sealed {
                Ok(sealed) => sealed,
                Err(e) => {
                    error!(
                        target: AUDIT_TARGET,
                        account = owner_id,
                        error = %e,
                        "sealing failed, record not persisted"
                    );
                    return Err(e);
                }
            }
        } else {
            debug!(account = owner_id, "encryption disabled, storing record unsealed");
            data
        };

        let record = StoredRecord::new(owner_id, stored_data);
        let records = self.records.clone();
        let to_insert = record.clone();
        run_blocking(move || Ok(records.insert(&to_insert)?)).await?;

        info!(
            target: AUDIT_TARGET,
            account = owner_id,
            record_id = %record.id,
            sealed = self.encryption_enabled,
            "record created"
        );
        Ok(record)
    }

    /// Loads a record and returns its opened view for `account_id`.
    ///
    /// The opened data exists only in the returned value; the stored record
    /// is never rewritten.
    pub async fn read_record(&self, id: &str, account_id: &str) -> PolicyResult<StoredRecord> {
        if account_id.is_empty() {
            return Err(CryptoError::MissingAccount.into());
        }

        let records = self.records.clone();
        let record_id = id.to_string();
        let mut record = run_blocking(move || Ok(records.get(&record_id)?))
            .await?
            .ok_or_else(|| PolicyError::RecordNotFound(id.to_string()))?;

        if record.owner_id != account_id {
            warn!(
                target: AUDIT_TARGET,
                account = account_id,
                record_id = id,
                "record read denied: not the owner"
            );
            return Err(CryptoError::OwnershipMismatch.into());
        }

        let sealer = self.sealer.clone();
        let account = account_id.to_string();
        let data = std::mem::take(&mut record.data);
        record.data = run_blocking(move || Ok(sealer.open_fields(&data, &account)?)).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casevault_crypto::{CryptoConfig, EnvelopeCodec};
    use casevault_storage::MemoryRecordStore;
    use serde_json::json;

    fn pipeline(enabled: bool) -> SealingPipeline {
        let codec = EnvelopeCodec::new(
            CryptoConfig::new("unit-secret")
                .unwrap()
                .with_kdf_iterations(100)
                .unwrap(),
        );
        let config = PolicyConfig {
            encryption_enabled: enabled,
            ..PolicyConfig::default()
        };
        SealingPipeline::new(Arc::new(codec), Arc::new(MemoryRecordStore::new()), &config)
    }

    #[tokio::test]
    async fn empty_owner_rejected() {
        let err = pipeline(true)
            .create_record("", Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::Crypto(CryptoError::MissingAccount)));
    }

    #[tokio::test]
    async fn caller_cannot_supply_seal_markers() {
        for enabled in [true, false] {
            let mut data = Record::new();
            data.insert("isSealed".into(), json!(true));
            let err = pipeline(enabled)
                .create_record("u-1", data)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                PolicyError::Crypto(CryptoError::ReservedField(_))
            ));
        }
    }

    #[test]
    fn custom_schema_replaces_default() {
        let p = pipeline(true).with_schema(RedactionSchema::new(["notes"]).unwrap());
        assert!(p.schema().contains("notes"));
        assert!(!p.schema().contains("caseNumber"));
    }
}
