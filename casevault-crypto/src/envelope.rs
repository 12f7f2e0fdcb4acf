//! Self-describing ciphertext envelope.
//!
//! Wire format, base64 (standard alphabet, padded):
//!
//! ```text
//! [64 bytes: salt][16 bytes: IV][16 bytes: tag][N bytes: ciphertext]
//! ```
//!
//! The salt and IV are fresh per envelope, so an envelope is sufficient to
//! decrypt given only the owning account id and the deployment secret.

use crate::cipher::{IV_SIZE, TAG_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{SALT_SIZE, Salt};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Length of the fixed header preceding the ciphertext.
pub const HEADER_SIZE: usize = SALT_SIZE + IV_SIZE + TAG_SIZE;

/// Decoded envelope segments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub salt: Salt,
    pub iv: [u8; IV_SIZE],
    pub tag: [u8; TAG_SIZE],
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Concatenates the segments and encodes them as one printable string.
    pub fn encode(&self) -> String {
        let mut raw = Vec::with_capacity(HEADER_SIZE + self.ciphertext.len());
        raw.extend_from_slice(self.salt.as_bytes());
        raw.extend_from_slice(&self.iv);
        raw.extend_from_slice(&self.tag);
        raw.extend_from_slice(&self.ciphertext);
        STANDARD.encode(raw)
    }

    /// Decodes a printable envelope into its four segments.
    pub fn decode(encoded: &str) -> CryptoResult<Self> {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::MalformedEnvelope(format!("base64 decode: {e}")))?;

        if raw.len() < HEADER_SIZE {
            return Err(CryptoError::MalformedEnvelope(format!(
                "expected at least {HEADER_SIZE} bytes, got {}",
                raw.len()
            )));
        }

        let (salt_bytes, rest) = raw.split_at(SALT_SIZE);
        let (iv_bytes, rest) = rest.split_at(IV_SIZE);
        let (tag_bytes, ciphertext) = rest.split_at(TAG_SIZE);

        let salt = Salt::from_slice(salt_bytes)
            .ok_or_else(|| CryptoError::MalformedEnvelope("salt segment".into()))?;
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(iv_bytes);
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(tag_bytes);

        Ok(Self {
            salt,
            iv,
            tag,
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Total decoded length in bytes.
    pub fn len(&self) -> usize {
        HEADER_SIZE + self.ciphertext.len()
    }

    /// Whether the ciphertext segment is empty (the header is always present).
    pub fn is_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }
}
