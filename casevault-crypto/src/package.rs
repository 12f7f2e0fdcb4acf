//! Encrypted file packages for secure download and re-upload.
//!
//! A package is a self-contained JSON artifact: the file bytes sealed in an
//! envelope for one account, plus ownership metadata and instructions for
//! the human holding the file. Packages are built on demand from the
//! plaintext file and are not the canonical storage form.
//!
//! The `ownerId` check on open is a fast-fail convenience. The envelope's
//! AEAD tag, verified under a key derived from the requester's account id,
//! is what actually keeps other accounts out.

use crate::cipher::{ALGORITHM, IV_SIZE, TAG_SIZE};
use crate::encryptor::AccountEncryptor;
use crate::error::{CryptoError, CryptoResult};
use crate::key::SALT_SIZE;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Package container format version written by this crate.
pub const PACKAGE_FORMAT_VERSION: &str = "1.0";

/// Marker identifying a CaseVault package artifact.
pub const PACKAGE_MARKER: &str = "casevault.secure-package";

/// File extension for package artifacts.
pub const PACKAGE_EXTENSION: &str = "cvpkg";

/// Key-derivation label recorded in metadata.
pub const KDF: &str = "pbkdf2-hmac-sha256";

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Caller-supplied description of the packaged file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl PackageInfo {
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        self.original_filename = Some(name.into());
        self
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn with_document_id(mut self, id: impl Into<String>) -> Self {
        self.document_id = Some(id.into());
        self
    }

    pub fn with_document_type(mut self, kind: impl Into<String>) -> Self {
        self.document_type = Some(kind.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Metadata stored alongside the envelope.
///
/// Read-only once built: the owner is fixed at creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    algorithm: String,
    kdf: String,
    salt_length: usize,
    iv_length: usize,
    tag_length: usize,
    owner_id: String,
    original_filename: String,
    mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    document_type: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    extra: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
}

impl PackageMetadata {
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn kdf(&self) -> &str {
        &self.kdf
    }

    pub fn salt_length(&self) -> usize {
        self.salt_length
    }

    pub fn iv_length(&self) -> usize {
        self.iv_length
    }

    pub fn tag_length(&self) -> usize {
        self.tag_length
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    pub fn document_type(&self) -> Option<&str> {
        self.document_type.as_deref()
    }

    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Instructions for whoever holds the downloaded artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HumanInstructions {
    pub description: String,
    pub steps: Vec<String>,
}

impl Default for HumanInstructions {
    fn default() -> Self {
        Self {
            description: "This is an encrypted CaseVault document package. Only the account \
                          that downloaded it can decrypt it."
                .to_string(),
            steps: vec![
                "Store this file somewhere safe; it is useless without your account.".to_string(),
                "Sign in to CaseVault with the account that downloaded it.".to_string(),
                "Open Secure Documents and choose \"Upload encrypted package\".".to_string(),
                "Select this file to receive the original document.".to_string(),
            ],
        }
    }
}

/// A versioned encrypted package.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurePackage {
    marker: String,
    format_version: String,
    envelope: String,
    metadata: PackageMetadata,
    human_instructions: HumanInstructions,
}

impl SecurePackage {
    pub fn format_version(&self) -> &str {
        &self.format_version
    }

    pub fn envelope(&self) -> &str {
        &self.envelope
    }

    pub fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    pub fn human_instructions(&self) -> &HumanInstructions {
        &self.human_instructions
    }

    /// Suggested download name, e.g. `report.pdf.cvpkg`.
    pub fn artifact_name(&self) -> String {
        format!("{}.{PACKAGE_EXTENSION}", self.metadata.original_filename)
    }

    /// Serializes the artifact.
    pub fn to_bytes(&self) -> CryptoResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parses an artifact. The marker and `formatVersion` are checked before
    /// the rest of the structure is interpreted.
    pub fn parse(artifact: &[u8]) -> CryptoResult<Self> {
        let value: Value = serde_json::from_slice(artifact)
            .map_err(|e| CryptoError::MalformedPackage(e.to_string()))?;

        match value.get("marker").and_then(Value::as_str) {
            Some(PACKAGE_MARKER) => {}
            _ => {
                return Err(CryptoError::MalformedPackage(
                    "not a CaseVault package".into(),
                ));
            }
        }

        let version = value
            .get("formatVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| CryptoError::MalformedPackage("missing formatVersion".into()))?;
        check_format_version(version)?;

        serde_json::from_value(value).map_err(|e| CryptoError::MalformedPackage(e.to_string()))
    }
}

/// Result of opening a package.
#[derive(Clone, Debug)]
pub struct OpenedPackage {
    pub bytes: Vec<u8>,
    pub metadata: PackageMetadata,
    pub filename: String,
}

/// Builds and opens [`SecurePackage`]s.
#[derive(Clone)]
pub struct Packager {
    encryptor: Arc<dyn AccountEncryptor>,
}

impl Packager {
    pub fn new(encryptor: Arc<dyn AccountEncryptor>) -> Self {
        Self { encryptor }
    }

    /// Encrypts `file_bytes` for `account_id` and wraps it with metadata.
    pub fn build(
        &self,
        file_bytes: &[u8],
        account_id: &str,
        info: PackageInfo,
    ) -> CryptoResult<SecurePackage> {
        let envelope = self.encryptor.encrypt(file_bytes, account_id)?;

        let original_filename = match info.original_filename.as_deref().map(sanitize_filename) {
            Some(name) if !name.is_empty() => name,
            _ => format!(
                "{}.bin",
                sanitize_filename(info.document_id.as_deref().unwrap_or("document"))
            ),
        };

        let metadata = PackageMetadata {
            algorithm: ALGORITHM.to_string(),
            kdf: KDF.to_string(),
            salt_length: SALT_SIZE,
            iv_length: IV_SIZE,
            tag_length: TAG_SIZE,
            owner_id: account_id.to_string(),
            original_filename,
            mime_type: info
                .mime_type
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
            document_id: info.document_id,
            document_type: info.document_type,
            extra: info.extra,
            created_at: Utc::now(),
        };

        debug!(
            account = account_id,
            file_len = file_bytes.len(),
            document_id = metadata.document_id.as_deref().unwrap_or("-"),
            "built secure package"
        );

        Ok(SecurePackage {
            marker: PACKAGE_MARKER.to_string(),
            format_version: PACKAGE_FORMAT_VERSION.to_string(),
            envelope,
            metadata,
            human_instructions: HumanInstructions::default(),
        })
    }

    /// Decrypts a package for `requesting_account`.
    ///
    /// Check order: format version, then owner (without touching the
    /// encryptor), then the envelope itself.
    ///
    /// Only the envelope is authenticated. The metadata block (owner id,
    /// filename, MIME type, document fields) travels in the clear and is not
    /// bound to the ciphertext, so anyone holding the artifact can edit it.
    /// The owner check is a fast reject; the account-derived key is what
    /// actually gates access. Callers must treat the returned metadata as
    /// untrusted hints. The returned `filename` is always reduced to a bare
    /// file name.
    pub fn open(
        &self,
        package: &SecurePackage,
        requesting_account: &str,
    ) -> CryptoResult<OpenedPackage> {
        check_format_version(&package.format_version)?;

        if package.metadata.owner_id != requesting_account {
            warn!(
                account = requesting_account,
                "package owner mismatch, rejecting before decrypt"
            );
            return Err(CryptoError::OwnershipMismatch);
        }

        let bytes = self.encryptor.decrypt(&package.envelope, requesting_account)?;
        let filename = match sanitize_filename(&package.metadata.original_filename) {
            name if name.is_empty() => "document.bin".to_string(),
            name => name,
        };

        Ok(OpenedPackage {
            bytes,
            metadata: package.metadata.clone(),
            filename,
        })
    }

    /// Parses and opens a serialized artifact.
    pub fn open_artifact(
        &self,
        artifact: &[u8],
        requesting_account: &str,
    ) -> CryptoResult<OpenedPackage> {
        let package = SecurePackage::parse(artifact)?;
        self.open(&package, requesting_account)
    }
}

fn check_format_version(version: &str) -> CryptoResult<()> {
    if version != PACKAGE_FORMAT_VERSION {
        return Err(CryptoError::UnsupportedVersion(format!(
            "package format {version}"
        )));
    }
    Ok(())
}

/// Keeps only the final path component of a user-supplied file name.
fn sanitize_filename(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches('.')
        .to_string()
}
