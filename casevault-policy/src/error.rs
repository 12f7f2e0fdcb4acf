//! Error types for the policy layer.

use casevault_crypto::CryptoError;
use casevault_storage::StorageError;
use thiserror::Error;

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Shown to end users for every "you cannot open this" failure.
pub const ACCESS_DENIED_MESSAGE: &str =
    "This content cannot be opened with your account. It may belong to another account or be damaged.";

/// Errors that can occur while applying the encryption policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("record encryption is disabled")]
    SealingDisabled,

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A worker task running key derivation or storage I/O panicked or was
    /// cancelled.
    #[error("blocking task failed: {0}")]
    Blocking(String),
}

impl PolicyError {
    /// Whether the failure means the requester cannot open the content.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, PolicyError::Crypto(e) if e.is_access_denied())
    }

    /// Message safe to show an end user.
    ///
    /// Wrong account, tampered data, forged ownership and malformed input all
    /// produce [`ACCESS_DENIED_MESSAGE`]. Details stay in the logs.
    pub fn user_message(&self) -> &'static str {
        if self.is_access_denied() {
            return ACCESS_DENIED_MESSAGE;
        }
        match self {
            PolicyError::Crypto(CryptoError::UnsupportedVersion(_)) => {
                "This file was created by a newer version of CaseVault and cannot be opened here."
            }
            PolicyError::Crypto(CryptoError::MissingAccount) => {
                "You must be signed in to access this content."
            }
            PolicyError::RecordNotFound(_) | PolicyError::Storage(StorageError::NotFound(_)) => {
                "The requested document was not found."
            }
            PolicyError::SealingDisabled => "Record encryption is not enabled for this deployment.",
            _ => "Something went wrong while processing the document. Please try again.",
        }
    }
}
