//! Offloading of CPU-bound and blocking work.
//!
//! Every envelope operation runs a full PBKDF2 derivation. Callers on the
//! async runtime route that work, and synchronous storage I/O, through
//! [`run_blocking`] so other requests keep making progress.

use crate::error::{PolicyError, PolicyResult};

/// Runs `work` on tokio's blocking pool and flattens the join error.
pub async fn run_blocking<T, F>(work: F) -> PolicyResult<T>
where
    F: FnOnce() -> PolicyResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PolicyError::Blocking(e.to_string()))?
}
