//! Envelope codec: account-scoped authenticated encryption of byte payloads.
//!
//! Every call derives a key from a fresh salt, so repeated encryption of the
//! same payload for the same account yields unrelated envelopes. Decryption
//! re-derives the key from the embedded salt and the caller's account id;
//! the AEAD tag is the only thing that separates one account's data from
//! another's.

use crate::cipher::{self, generate_iv};
use crate::config::CryptoConfig;
use crate::encryptor::AccountEncryptor;
use crate::envelope::Envelope;
use crate::error::{CryptoError, CryptoResult};
use crate::key::KeyDeriver;
use tracing::debug;

/// Stateless envelope codec. Cheap to clone; share freely across threads.
#[derive(Clone, Debug)]
pub struct EnvelopeCodec {
    deriver: KeyDeriver,
}

impl EnvelopeCodec {
    pub fn new(config: CryptoConfig) -> Self {
        Self {
            deriver: KeyDeriver::new(config),
        }
    }

    pub fn from_deriver(deriver: KeyDeriver) -> Self {
        Self { deriver }
    }

    pub fn deriver(&self) -> &KeyDeriver {
        &self.deriver
    }

    /// Encrypts `payload` for `account_id` into a printable envelope.
    pub fn encrypt(&self, payload: &[u8], account_id: &str) -> CryptoResult<String> {
        require_account(account_id)?;

        let (key, salt) = self.deriver.derive(account_id, None);
        let iv = generate_iv();
        let sealed = cipher::seal(&key, &iv, payload)?;

        let envelope = Envelope {
            salt,
            iv,
            tag: sealed.tag,
            ciphertext: sealed.ciphertext,
        };
        debug!(
            account = account_id,
            payload_len = payload.len(),
            "sealed envelope"
        );
        Ok(envelope.encode())
    }

    /// Decrypts an envelope produced by [`encrypt`](Self::encrypt).
    ///
    /// Fails with [`CryptoError::AuthenticationFailure`] when `account_id`
    /// is not the account the envelope was sealed for, or the envelope was
    /// altered.
    pub fn decrypt(&self, envelope: &str, account_id: &str) -> CryptoResult<Vec<u8>> {
        require_account(account_id)?;

        let envelope = Envelope::decode(envelope)?;
        let (key, _) = self.deriver.derive(account_id, Some(&envelope.salt));
        cipher::open(&key, &envelope.iv, &envelope.tag, &envelope.ciphertext)
    }

    /// Encrypts a UTF-8 string.
    pub fn encrypt_string(&self, text: &str, account_id: &str) -> CryptoResult<String> {
        self.encrypt(text.as_bytes(), account_id)
    }

    /// Decrypts an envelope whose payload is UTF-8 text.
    pub fn decrypt_string(&self, envelope: &str, account_id: &str) -> CryptoResult<String> {
        let bytes = self.decrypt(envelope, account_id)?;
        String::from_utf8(bytes)
            .map_err(|e| CryptoError::MalformedEnvelope(format!("payload is not UTF-8: {e}")))
    }
}

impl AccountEncryptor for EnvelopeCodec {
    fn encrypt(&self, payload: &[u8], account_id: &str) -> CryptoResult<String> {
        EnvelopeCodec::encrypt(self, payload, account_id)
    }

    fn decrypt(&self, envelope: &str, account_id: &str) -> CryptoResult<Vec<u8>> {
        EnvelopeCodec::decrypt(self, envelope, account_id)
    }
}

fn require_account(account_id: &str) -> CryptoResult<()> {
    if account_id.is_empty() {
        return Err(CryptoError::MissingAccount);
    }
    Ok(())
}
