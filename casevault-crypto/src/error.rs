//! Error types for the encryption layer.

use thiserror::Error;

/// Result type for encryption operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors produced by key derivation, the envelope codec, field sealing
/// and package handling.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Missing or invalid deployment configuration (master secret, KDF
    /// parameters, redaction schema).
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("account identifier must not be empty")]
    MissingAccount,

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The AEAD tag did not verify: the envelope was sealed for another
    /// account, or the bytes were corrupted or tampered with.
    #[error("authentication failed (wrong account key or tampered data)")]
    AuthenticationFailure,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Package metadata names a different owner than the requester.
    #[error("package owner does not match requesting account")]
    OwnershipMismatch,

    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    #[error("malformed package: {0}")]
    MalformedPackage(String),

    #[error("record is not a sealable object: {0}")]
    InvalidRecord(String),

    #[error("record is already sealed")]
    AlreadySealed,

    #[error("field name is reserved for seal metadata: {0}")]
    ReservedField(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CryptoError {
    /// Whether this error means "this content cannot be opened by you".
    ///
    /// Callers must present all of these identically to end users; the
    /// distinction is kept only for logs.
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            CryptoError::AuthenticationFailure
                | CryptoError::OwnershipMismatch
                | CryptoError::MalformedEnvelope(_)
                | CryptoError::MalformedPackage(_)
        )
    }
}
