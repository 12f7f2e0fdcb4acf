//! Document downloads: plain, secure package, and ephemeral staged package.
//!
//! Rendered files stay plaintext in the [`FileStore`]. A secure download
//! builds a fresh package from the current file every time; no encrypted
//! copy is kept as the canonical form. The ephemeral variant additionally
//! writes the package to a staging directory and deletes it after the
//! configured TTL. Cleanup is best effort: a failed delete is logged and
//! not retried.

use crate::AUDIT_TARGET;
use crate::blocking::run_blocking;
use crate::config::PolicyConfig;
use crate::error::{PolicyError, PolicyResult};
use casevault_crypto::{
    AccountEncryptor, OpenedPackage, PACKAGE_EXTENSION, PackageInfo, Packager, SecurePackage,
};
use casevault_storage::{FileStore, LocalFileStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A package written to the staging directory.
#[derive(Debug)]
pub struct StagedPackage {
    /// Where the artifact can be served from until cleanup runs.
    pub path: PathBuf,
    /// Suggested download name.
    pub artifact_name: String,
    pub package: SecurePackage,
    /// Resolves to `true` once the staged file has been deleted, or `false`
    /// if deletion failed.
    pub cleanup: JoinHandle<bool>,
}

/// Serves documents from a [`FileStore`] under the hybrid policy.
#[derive(Clone)]
pub struct DownloadService {
    files: Arc<dyn FileStore>,
    packager: Packager,
    staging: Arc<LocalFileStore>,
    staging_ttl: Duration,
}

impl DownloadService {
    /// Creates the service, creating the staging directory if needed.
    ///
    /// Fails with [`PolicyError::Config`] if the staging TTL is out of
    /// range.
    pub fn new(
        encryptor: Arc<dyn AccountEncryptor>,
        files: Arc<dyn FileStore>,
        config: &PolicyConfig,
    ) -> PolicyResult<Self> {
        config.validate()?;
        let staging = LocalFileStore::open(&config.staging_dir)?;
        Ok(Self {
            files,
            packager: Packager::new(encryptor),
            staging: Arc::new(staging),
            staging_ttl: config.staging_ttl(),
        })
    }

    pub fn staging_ttl(&self) -> Duration {
        self.staging_ttl
    }

    /// Returns the stored file unchanged.
    pub async fn plain_download(&self, key: &str) -> PolicyResult<Vec<u8>> {
        let files = self.files.clone();
        let key = key.to_string();
        run_blocking(move || Ok(files.read(&key)?)).await
    }

    /// Builds a fresh package of the file at `key` for `account_id`.
    ///
    /// If `info` has no filename, the last component of `key` is used.
    pub async fn secure_download(
        &self,
        key: &str,
        account_id: &str,
        info: PackageInfo,
    ) -> PolicyResult<SecurePackage> {
        let files = self.files.clone();
        let packager = self.packager.clone();
        let owned_key = key.to_string();
        let account = account_id.to_string();
        let info = with_default_filename(info, key);

        let package = run_blocking(move || {
            let bytes = files.read(&owned_key)?;
            Ok(packager.build(&bytes, &account, info)?)
        })
        .await?;

        info!(
            target: AUDIT_TARGET,
            account = account_id,
            key,
            "secure package built"
        );
        Ok(package)
    }

    /// Builds a package, stages it on disk, and schedules its deletion
    /// after the staging TTL.
    pub async fn ephemeral_download(
        &self,
        key: &str,
        account_id: &str,
        info: PackageInfo,
    ) -> PolicyResult<StagedPackage> {
        let deadline = Instant::now()
            .checked_add(self.staging_ttl)
            .ok_or_else(|| {
                PolicyError::Config(format!(
                    "staging TTL of {}s is out of range",
                    self.staging_ttl.as_secs()
                ))
            })?;

        let package = self.secure_download(key, account_id, info).await?;
        let artifact = package.to_bytes()?;
        let staging_key = format!("{}.{PACKAGE_EXTENSION}", uuid::Uuid::new_v4());

        let staging = self.staging.clone();
        let write_key = staging_key.clone();
        run_blocking(move || Ok(staging.write(&write_key, &artifact)?)).await?;
        let path = self.staging.resolve(&staging_key)?;

        info!(
            target: AUDIT_TARGET,
            account = account_id,
            staged = %path.display(),
            ttl_secs = self.staging_ttl.as_secs(),
            "ephemeral package staged"
        );

        let cleanup = tokio::spawn(delete_at(self.staging.clone(), staging_key, deadline));

        Ok(StagedPackage {
            path,
            artifact_name: package.artifact_name(),
            package,
            cleanup,
        })
    }

    /// Opens a re-uploaded package artifact for `account_id`.
    pub async fn import_package(
        &self,
        artifact: Vec<u8>,
        account_id: &str,
    ) -> PolicyResult<OpenedPackage> {
        let packager = self.packager.clone();
        let account = account_id.to_string();
        let result = run_blocking(move || Ok(packager.open_artifact(&artifact, &account)?)).await;

        match &result {
            Ok(opened) => info!(
                target: AUDIT_TARGET,
                account = account_id,
                filename = %opened.filename,
                "package imported"
            ),
            Err(e) if e.is_access_denied() => warn!(
                target: AUDIT_TARGET,
                account = account_id,
                error = %e,
                "package import denied"
            ),
            Err(e) => warn!(account = account_id, error = %e, "package import failed"),
        }
        result
    }
}

fn with_default_filename(mut info: PackageInfo, key: &str) -> PackageInfo {
    if info.original_filename.is_none() {
        let name = key.rsplit('/').next().unwrap_or(key);
        if !name.is_empty() {
            info.original_filename = Some(name.to_string());
        }
    }
    info
}

async fn delete_at(staging: Arc<LocalFileStore>, key: String, deadline: Instant) -> bool {
    tokio::time::sleep_until(deadline).await;

    let delete_key = key.clone();
    let result: PolicyResult<()> = run_blocking(move || Ok(staging.delete(&delete_key)?)).await;
    match result {
        Ok(()) => {
            debug!(target: AUDIT_TARGET, staged = %key, "ephemeral package deleted");
            true
        }
        Err(e) => {
            warn!(
                target: AUDIT_TARGET,
                staged = %key,
                error = %e,
                "failed to delete ephemeral package"
            );
            false
        }
    }
}

impl std::fmt::Debug for DownloadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadService")
            .field("staging", &self.staging.root())
            .field("staging_ttl", &self.staging_ttl)
            .finish_non_exhaustive()
    }
}
