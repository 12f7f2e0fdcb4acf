//! AES-256-GCM primitive with a 16-byte IV and detached tag.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce, Tag};
use rand::RngCore;

/// IV length in bytes.
pub const IV_SIZE: usize = 16;

/// Authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// Algorithm label recorded in package metadata.
pub const ALGORITHM: &str = "aes-256-gcm";

type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Draws a fresh random IV.
pub fn generate_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    rand::rng().fill_bytes(&mut iv);
    iv
}

/// Ciphertext and tag produced by [`seal`].
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
}

/// Encrypts `plaintext` under `key` and `iv`.
pub fn seal(key: &DerivedKey, iv: &[u8; IV_SIZE], plaintext: &[u8]) -> CryptoResult<Sealed> {
    let cipher = Aes256Gcm16::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::<U16>::from_slice(iv), b"", &mut buffer)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(&tag);
    Ok(Sealed {
        ciphertext: buffer,
        tag: tag_bytes,
    })
}

/// Decrypts and authenticates. Any tag mismatch is
/// [`CryptoError::AuthenticationFailure`]; no plaintext is returned in that case.
pub fn open(
    key: &DerivedKey,
    iv: &[u8; IV_SIZE],
    tag: &[u8; TAG_SIZE],
    ciphertext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm16::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::<U16>::from_slice(iv),
            b"",
            &mut buffer,
            Tag::<U16>::from_slice(tag),
        )
        .map_err(|_| CryptoError::AuthenticationFailure)?;

    Ok(buffer)
}
