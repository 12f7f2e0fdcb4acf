//! Record storage: case records as JSON objects owned by one account.
//!
//! Stores persist whatever `data` they are handed. Whether that data is
//! sealed is decided above this layer; a store never inspects or rewrites
//! field contents.

use crate::error::{StorageError, StorageResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Field map of a stored record.
pub type RecordData = Map<String, Value>;

/// A persisted case record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: String,
    pub owner_id: String,
    pub data: RecordData,
    /// Unix milliseconds.
    pub created_at: i64,
    /// Unix milliseconds.
    pub modified_at: i64,
}

impl StoredRecord {
    /// Creates a record with a fresh time-ordered id.
    pub fn new(owner_id: impl Into<String>, data: RecordData) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            owner_id: owner_id.into(),
            data,
            created_at: now,
            modified_at: now,
        }
    }
}

/// Persistence for structured records.
pub trait RecordStore: Send + Sync {
    /// Returns the record, or `None` if no record has this id.
    fn get(&self, id: &str) -> StorageResult<Option<StoredRecord>>;

    /// Persists a new record. Fails if the id is already taken.
    fn insert(&self, record: &StoredRecord) -> StorageResult<()>;

    /// Replaces the data of an existing record and bumps `modified_at`.
    fn update(&self, id: &str, data: RecordData) -> StorageResult<StoredRecord>;

    /// All records owned by `owner_id`, oldest first.
    fn list_by_owner(&self, owner_id: &str) -> StorageResult<Vec<StoredRecord>>;
}

fn sort_oldest_first(records: &mut [StoredRecord]) {
    records.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

// ============================================================================
// MemoryRecordStore
// ============================================================================

/// In-process record store.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, StoredRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> StorageResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    fn read(
        &self,
    ) -> StorageResult<std::sync::RwLockReadGuard<'_, HashMap<String, StoredRecord>>> {
        self.records
            .read()
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn write(
        &self,
    ) -> StorageResult<std::sync::RwLockWriteGuard<'_, HashMap<String, StoredRecord>>> {
        self.records
            .write()
            .map_err(|e| StorageError::Backend(e.to_string()))
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, id: &str) -> StorageResult<Option<StoredRecord>> {
        Ok(self.read()?.get(id).cloned())
    }

    fn insert(&self, record: &StoredRecord) -> StorageResult<()> {
        let mut records = self.write()?;
        if records.contains_key(&record.id) {
            return Err(StorageError::Backend(format!(
                "record already exists: {}",
                record.id
            )));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn update(&self, id: &str, data: RecordData) -> StorageResult<StoredRecord> {
        let mut records = self.write()?;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("record {id}")))?;
        record.data = data;
        record.modified_at = Utc::now().timestamp_millis();
        Ok(record.clone())
    }

    fn list_by_owner(&self, owner_id: &str) -> StorageResult<Vec<StoredRecord>> {
        let mut owned: Vec<StoredRecord> = self
            .read()?
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        sort_oldest_first(&mut owned);
        Ok(owned)
    }
}

// ============================================================================
// DirRecordStore
// ============================================================================

/// Record store keeping one pretty-printed JSON file per record.
#[derive(Clone, Debug)]
pub struct DirRecordStore {
    root: PathBuf,
}

impl DirRecordStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> StorageResult<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(format!("record id {id:?}")));
        }
        Ok(self.root.join(format!("{id}.json")))
    }

    fn load(path: &Path) -> StorageResult<Option<StoredRecord>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes to `<id>.json.tmp`, then renames over the record file.
    fn save(path: &Path, record: &StoredRecord) -> StorageResult<()> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl RecordStore for DirRecordStore {
    fn get(&self, id: &str) -> StorageResult<Option<StoredRecord>> {
        Self::load(&self.path_for(id)?)
    }

    fn insert(&self, record: &StoredRecord) -> StorageResult<()> {
        let path = self.path_for(&record.id)?;
        if path.exists() {
            return Err(StorageError::Backend(format!(
                "record already exists: {}",
                record.id
            )));
        }
        Self::save(&path, record)?;
        debug!(id = %record.id, "record written");
        Ok(())
    }

    fn update(&self, id: &str, data: RecordData) -> StorageResult<StoredRecord> {
        let path = self.path_for(id)?;
        let mut record =
            Self::load(&path)?.ok_or_else(|| StorageError::NotFound(format!("record {id}")))?;
        record.data = data;
        record.modified_at = Utc::now().timestamp_millis();
        Self::save(&path, &record)?;
        Ok(record)
    }

    fn list_by_owner(&self, owner_id: &str) -> StorageResult<Vec<StoredRecord>> {
        let mut owned = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(record) = Self::load(&path)? {
                if record.owner_id == owner_id {
                    owned.push(record);
                }
            }
        }
        sort_oldest_first(&mut owned);
        Ok(owned)
    }
}
