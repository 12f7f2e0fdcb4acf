//! Byte storage for rendered documents and staged packages.
//!
//! Keys are relative, `/`-separated paths. Files are stored as given; the
//! primary rendered document stays plaintext at rest.

use crate::error::{StorageError, StorageResult};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Persistence for opaque file bytes.
pub trait FileStore: Send + Sync {
    fn read(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Creates or replaces the file at `key`.
    fn write(&self, key: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Removes the file at `key`. Missing files are `NotFound`.
    fn delete(&self, key: &str) -> StorageResult<()>;

    fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// Rejects empty, absolute and parent-relative keys.
fn validate_key(key: &str) -> StorageResult<()> {
    let path = Path::new(key);
    let mut has_normal = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::InvalidKey(key.to_string()));
            }
        }
    }
    if !has_normal {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// ============================================================================
// LocalFileStore
// ============================================================================

/// File store rooted at a local directory.
#[derive(Clone, Debug)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for `key`, refusing anything that escapes the root.
    pub fn resolve(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

fn not_found(key: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |e| {
        if e.kind() == ErrorKind::NotFound {
            StorageError::NotFound(format!("file {key}"))
        } else {
            StorageError::Io(e)
        }
    }
}

impl FileStore for LocalFileStore {
    fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.resolve(key)?;
        fs::read(path).map_err(not_found(key))
    }

    fn write(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        debug!(key, len = bytes.len(), "file written");
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.resolve(key)?;
        fs::remove_file(path).map_err(not_found(key))?;
        debug!(key, "file deleted");
        Ok(())
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.resolve(key)?.is_file())
    }
}

// ============================================================================
// MemoryFileStore
// ============================================================================

/// In-process file store.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileStore for MemoryFileStore {
    fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        validate_key(key)?;
        self.files
            .read()
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("file {key}")))
    }

    fn write(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        self.files
            .write()
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.files
            .write()
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("file {key}")))
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(self
            .files
            .read()
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .contains_key(key))
    }
}
