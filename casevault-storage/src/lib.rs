//! Storage collaborators for CaseVault.
//!
//! The encryption layer never touches storage directly. The policy layer
//! reads and writes through two narrow interfaces:
//!
//! - [`RecordStore`]: structured case records keyed by id and grouped by
//!   owning account
//! - [`FileStore`]: rendered document bytes keyed by a relative path
//!
//! Each has an in-memory implementation for tests and embedding, and an
//! on-disk implementation rooted at a directory.

mod error;
mod file_store;
mod record_store;

pub use error::{StorageError, StorageResult};
pub use file_store::{FileStore, LocalFileStore, MemoryFileStore};
pub use record_store::{DirRecordStore, MemoryRecordStore, RecordData, RecordStore, StoredRecord};
