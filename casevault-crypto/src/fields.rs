//! Field-selective record sealing.
//!
//! A record is a JSON object. The fields named by a [`RedactionSchema`] that
//! are present and non-empty are collected into one side object, encrypted
//! as a single envelope, and replaced in the record by [`SENTINEL`]. Three
//! reserved fields record the seal:
//!
//! | field           | value                          |
//! |-----------------|--------------------------------|
//! | `sealedContent` | envelope of the side object    |
//! | `isSealed`      | `true`                         |
//! | `sealVersion`   | [`SealVersion::CURRENT`] label |
//!
//! Every other field is left untouched in both directions.

use crate::encryptor::AccountEncryptor;
use crate::error::{CryptoError, CryptoResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A structured record: a JSON object keyed by field name.
pub type Record = Map<String, Value>;

/// Placeholder written over every sealed field.
pub const SENTINEL: &str = "[ENCRYPTED]";

pub const SEALED_CONTENT_FIELD: &str = "sealedContent";
pub const IS_SEALED_FIELD: &str = "isSealed";
pub const SEAL_VERSION_FIELD: &str = "sealVersion";

/// Field names that carry seal metadata and may never be redacted.
pub const RESERVED_FIELDS: [&str; 3] = [SEALED_CONTENT_FIELD, IS_SEALED_FIELD, SEAL_VERSION_FIELD];

// ============================================================================
// Seal versions
// ============================================================================

/// Sealing scheme recorded in `sealVersion`.
///
/// Both versions share the same record layout. `Hybrid1` is read-only:
/// new seals are always written as [`SealVersion::CURRENT`], and the
/// migration tooling upgrades old records forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SealVersion {
    #[serde(rename = "hybrid-1.0")]
    Hybrid1,
    #[serde(rename = "user-key-1.0")]
    UserKey1,
}

impl SealVersion {
    pub const CURRENT: SealVersion = SealVersion::UserKey1;

    pub fn as_str(&self) -> &'static str {
        match self {
            SealVersion::Hybrid1 => "hybrid-1.0",
            SealVersion::UserKey1 => "user-key-1.0",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "hybrid-1.0" => Some(SealVersion::Hybrid1),
            "user-key-1.0" => Some(SealVersion::UserKey1),
            _ => None,
        }
    }

    pub fn is_current(&self) -> bool {
        *self == Self::CURRENT
    }
}

impl fmt::Display for SealVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encryption state of a stored record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SealState {
    /// No seal markers at all.
    Plaintext,
    /// Sealed under a recognized scheme.
    Sealed(SealVersion),
    /// Seal markers present but the version is unknown or missing.
    /// Such records pass through `open_fields` untouched.
    Unrecognized(String),
}

/// Classifies a record by its seal markers.
pub fn seal_state(record: &Record) -> SealState {
    match record.get(SEAL_VERSION_FIELD) {
        Some(Value::String(label)) => match SealVersion::parse(label) {
            Some(version) => SealState::Sealed(version),
            None => SealState::Unrecognized(label.clone()),
        },
        Some(other) => SealState::Unrecognized(other.to_string()),
        None => {
            let flagged = record.get(IS_SEALED_FIELD).and_then(Value::as_bool) == Some(true);
            if flagged || record.contains_key(SEALED_CONTENT_FIELD) {
                SealState::Unrecognized(String::new())
            } else {
                SealState::Plaintext
            }
        }
    }
}

// ============================================================================
// Redaction schema
// ============================================================================

/// Built-in sensitive fields of a case document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SensitiveField {
    CaseNumber,
    CrimeType,
    CrimeDescription,
    VictimName,
    VictimContact,
    SuspectDetails,
    WalletAddresses,
    TransactionHashes,
    TransactionDetails,
    EvidenceNotes,
}

impl SensitiveField {
    pub const ALL: [SensitiveField; 10] = [
        SensitiveField::CaseNumber,
        SensitiveField::CrimeType,
        SensitiveField::CrimeDescription,
        SensitiveField::VictimName,
        SensitiveField::VictimContact,
        SensitiveField::SuspectDetails,
        SensitiveField::WalletAddresses,
        SensitiveField::TransactionHashes,
        SensitiveField::TransactionDetails,
        SensitiveField::EvidenceNotes,
    ];

    /// Field name as it appears in records.
    pub fn as_str(&self) -> &'static str {
        match self {
            SensitiveField::CaseNumber => "caseNumber",
            SensitiveField::CrimeType => "crimeType",
            SensitiveField::CrimeDescription => "crimeDescription",
            SensitiveField::VictimName => "victimName",
            SensitiveField::VictimContact => "victimContact",
            SensitiveField::SuspectDetails => "suspectDetails",
            SensitiveField::WalletAddresses => "walletAddresses",
            SensitiveField::TransactionHashes => "transactionHashes",
            SensitiveField::TransactionDetails => "transactionDetails",
            SensitiveField::EvidenceNotes => "evidenceNotes",
        }
    }
}

/// Explicit set of redactable field names.
///
/// Fields not named here pass through sealing untouched by contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedactionSchema {
    fields: BTreeSet<String>,
}

impl RedactionSchema {
    /// Builds a schema from field names. Reserved and empty names are
    /// rejected.
    pub fn new<I, S>(fields: I) -> CryptoResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for field in fields {
            let field = field.into();
            if field.is_empty() {
                return Err(CryptoError::Config("redactable field name is empty".into()));
            }
            if RESERVED_FIELDS.contains(&field.as_str()) {
                return Err(CryptoError::ReservedField(field));
            }
            set.insert(field);
        }
        Ok(Self { fields: set })
    }

    /// Schema covering every [`SensitiveField`].
    pub fn case_document() -> Self {
        Self {
            fields: SensitiveField::ALL
                .iter()
                .map(|f| f.as_str().to_string())
                .collect(),
        }
    }

    /// This schema widened by `extra` field names.
    pub fn union<I, S>(&self, extra: I) -> CryptoResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            self.fields
                .iter()
                .cloned()
                .chain(extra.into_iter().map(Into::into)),
        )
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for RedactionSchema {
    fn default() -> Self {
        Self::case_document()
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

// ============================================================================
// FieldSealer
// ============================================================================

/// Seals and opens the redactable fields of records.
#[derive(Clone)]
pub struct FieldSealer {
    encryptor: Arc<dyn AccountEncryptor>,
}

impl FieldSealer {
    pub fn new(encryptor: Arc<dyn AccountEncryptor>) -> Self {
        Self { encryptor }
    }

    /// Returns a sealed copy of `record`.
    ///
    /// Only fields named by `schema` that are present and non-empty are
    /// encrypted and replaced by [`SENTINEL`]. Fails with
    /// [`CryptoError::AlreadySealed`] if the record carries seal markers.
    pub fn seal_fields(
        &self,
        record: &Record,
        schema: &RedactionSchema,
        account_id: &str,
    ) -> CryptoResult<Record> {
        if seal_state(record) != SealState::Plaintext {
            return Err(CryptoError::AlreadySealed);
        }

        let side: Record = schema
            .iter()
            .filter_map(|name| {
                record
                    .get(name)
                    .filter(|v| !is_empty_value(v))
                    .map(|v| (name.to_string(), v.clone()))
            })
            .collect();

        let payload = serde_json::to_vec(&side)?;
        let envelope = self.encryptor.encrypt(&payload, account_id)?;

        let mut sealed = record.clone();
        for name in side.keys() {
            sealed.insert(name.clone(), Value::String(SENTINEL.to_string()));
        }
        sealed.insert(SEALED_CONTENT_FIELD.into(), Value::String(envelope));
        sealed.insert(IS_SEALED_FIELD.into(), Value::Bool(true));
        sealed.insert(
            SEAL_VERSION_FIELD.into(),
            Value::String(SealVersion::CURRENT.as_str().into()),
        );

        debug!(
            account = account_id,
            sealed_fields = side.len(),
            version = %SealVersion::CURRENT,
            "sealed record fields"
        );
        Ok(sealed)
    }

    /// Returns the opened view of `record`.
    ///
    /// Plaintext records and records with an unknown seal version are
    /// returned unchanged. For recognized versions the envelope is decrypted
    /// for `account_id` and the sentinel fields are restored; the seal
    /// metadata fields are dropped from the view. A decryption failure is
    /// returned as-is and never produces blank fields.
    pub fn open_fields(&self, record: &Record, account_id: &str) -> CryptoResult<Record> {
        self.open_with_sealed_names(record, account_id)
            .map(|(opened, _)| opened)
    }

    /// Opens `record` and seals it again under [`SealVersion::CURRENT`].
    ///
    /// The new seal covers `schema` plus every field the previous seal
    /// covered, so a field that was sealed stays sealed even when `schema`
    /// does not name it. Plaintext records are sealed with `schema` alone;
    /// records with an unknown seal version fail with
    /// [`CryptoError::AlreadySealed`].
    pub fn reseal_fields(
        &self,
        record: &Record,
        schema: &RedactionSchema,
        account_id: &str,
    ) -> CryptoResult<Record> {
        let (opened, previously_sealed) = self.open_with_sealed_names(record, account_id)?;
        if previously_sealed.is_empty() {
            return self.seal_fields(&opened, schema, account_id);
        }
        let widened = schema.union(previously_sealed)?;
        self.seal_fields(&opened, &widened, account_id)
    }

    /// Opened view plus the names of the fields the seal covered.
    fn open_with_sealed_names(
        &self,
        record: &Record,
        account_id: &str,
    ) -> CryptoResult<(Record, BTreeSet<String>)> {
        let version = match seal_state(record) {
            SealState::Plaintext => return Ok((record.clone(), BTreeSet::new())),
            SealState::Unrecognized(label) => {
                warn!(
                    account = account_id,
                    version = %label,
                    "record carries unrecognized seal version, passing through"
                );
                return Ok((record.clone(), BTreeSet::new()));
            }
            SealState::Sealed(version) => version,
        };

        let envelope = record
            .get(SEALED_CONTENT_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CryptoError::MalformedEnvelope(format!(
                    "{version} record has no {SEALED_CONTENT_FIELD}"
                ))
            })?;

        let plaintext = self.encryptor.decrypt(envelope, account_id)?;
        let side: Record = serde_json::from_slice(&plaintext).map_err(|e| {
            CryptoError::MalformedEnvelope(format!("sealed content is not a field map: {e}"))
        })?;

        let mut opened = record.clone();
        for reserved in RESERVED_FIELDS {
            opened.remove(reserved);
        }
        let mut names = BTreeSet::new();
        for (name, value) in side {
            opened.insert(name.clone(), value);
            names.insert(name);
        }
        Ok((opened, names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test fixture must be an object"),
        }
    }

    #[test]
    fn version_labels_roundtrip() {
        for v in [SealVersion::Hybrid1, SealVersion::UserKey1] {
            assert_eq!(SealVersion::parse(v.as_str()), Some(v));
        }
        assert_eq!(SealVersion::parse("user-key-2.0"), None);
        assert!(SealVersion::UserKey1.is_current());
        assert!(!SealVersion::Hybrid1.is_current());
    }

    #[test]
    fn seal_state_classification() {
        assert_eq!(seal_state(&obj(json!({"a": 1}))), SealState::Plaintext);
        assert_eq!(
            seal_state(&obj(json!({"a": 1, "isSealed": false}))),
            SealState::Plaintext
        );
        assert_eq!(
            seal_state(&obj(json!({"sealVersion": "hybrid-1.0"}))),
            SealState::Sealed(SealVersion::Hybrid1)
        );
        assert_eq!(
            seal_state(&obj(json!({"sealVersion": "v9"}))),
            SealState::Unrecognized("v9".into())
        );
        assert_eq!(
            seal_state(&obj(json!({"isSealed": true}))),
            SealState::Unrecognized(String::new())
        );
    }

    #[test]
    fn schema_rejects_reserved_names() {
        let err = RedactionSchema::new(["caseNumber", "sealedContent"]).unwrap_err();
        assert!(matches!(err, CryptoError::ReservedField(f) if f == "sealedContent"));
    }

    #[test]
    fn union_widens_and_still_validates() {
        let base = RedactionSchema::new(["caseNumber"]).unwrap();
        let widened = base.union(["officerNotes"]).unwrap();
        assert!(widened.contains("caseNumber"));
        assert!(widened.contains("officerNotes"));
        assert_eq!(base.len(), 1);

        let err = base.union(["isSealed"]).unwrap_err();
        assert!(matches!(err, CryptoError::ReservedField(f) if f == "isSealed"));
    }

    #[test]
    fn schema_rejects_empty_name() {
        assert!(RedactionSchema::new([""]).is_err());
    }

    #[test]
    fn case_document_schema_covers_all_fields() {
        let schema = RedactionSchema::case_document();
        assert_eq!(schema.len(), SensitiveField::ALL.len());
        assert!(schema.contains("caseNumber"));
        assert!(schema.contains("walletAddresses"));
        assert!(!schema.contains("title"));
    }

    #[test]
    fn empty_values() {
        assert!(is_empty_value(&json!(null)));
        assert!(is_empty_value(&json!("")));
        assert!(is_empty_value(&json!([])));
        assert!(is_empty_value(&json!({})));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(false)));
        assert!(!is_empty_value(&json!(" ")));
    }
}
