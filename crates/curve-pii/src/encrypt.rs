//! ENCRYPT strategy: AES-256-GCM, in either static-key mode or
//! envelope-encryption mode (§4.2.1).
//!
//! Static mode wire format: `Base64(iv[12] ‖ ciphertext ‖ tag[16])`.
//! Envelope mode wire format:
//! `Base64(uint16_be(len(encrypted_dek)) ‖ encrypted_dek ‖ iv[12] ‖ ciphertext ‖ tag[16])`.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;

use crate::key::{DekCache, KeyProvider, KeyProviderError};

const IV_LEN: usize = 12;

/// Errors raised while encrypting or decrypting an ENCRYPT-strategy field.
#[derive(Debug, thiserror::Error)]
pub enum EncryptError {
    /// The configured key provider failed.
    #[error("key provider error: {0}")]
    KeyProvider(#[from] KeyProviderError),
    /// Wire payload was shorter than the mandatory IV.
    #[error("ciphertext shorter than the {IV_LEN}-byte IV")]
    CiphertextTooShort,
    /// The envelope length-prefix didn't fit the remaining bytes.
    #[error("malformed envelope-encryption payload")]
    MalformedEnvelope,
    /// The underlying AES-GCM operation failed (bad key, tampered tag, ...).
    #[error("AES-GCM operation failed: {0}")]
    Cipher(String),
    /// Input wasn't valid base64.
    #[error("input is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// Decrypted plaintext was not valid UTF-8.
    #[error("decrypted plaintext is not valid UTF-8")]
    InvalidUtf8,
}

/// ENCRYPT strategy executor, bound to a [`KeyProvider`] and an optional
/// [`DekCache`] used only in envelope-encryption mode.
pub struct EncryptStrategy {
    key_provider: Arc<dyn KeyProvider>,
    dek_cache: Option<Arc<DekCache>>,
}

impl EncryptStrategy {
    /// Construct a strategy from a key provider and an optional DEK cache.
    /// The cache is ignored when the provider doesn't support envelope
    /// encryption.
    pub fn new(key_provider: Arc<dyn KeyProvider>, dek_cache: Option<Arc<DekCache>>) -> Self {
        Self { key_provider, dek_cache }
    }

    /// Encrypt `plaintext`, returning the base64-encoded wire payload. Empty
    /// input passes through unchanged.
    pub async fn encrypt(&self, plaintext: &str) -> Result<String, EncryptError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        if self.key_provider.supports_envelope() {
            self.encrypt_envelope(plaintext).await
        } else {
            self.encrypt_static(plaintext)
        }
    }

    /// Decrypt a base64-encoded wire payload back to plaintext. Empty input
    /// passes through unchanged.
    pub async fn decrypt(&self, encoded: &str) -> Result<String, EncryptError> {
        if encoded.is_empty() {
            return Ok(String::new());
        }
        if self.key_provider.supports_envelope() {
            self.decrypt_envelope(encoded).await
        } else {
            self.decrypt_static(encoded)
        }
    }

    fn encrypt_static(&self, plaintext: &str) -> Result<String, EncryptError> {
        let key = self.key_provider.static_key()?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| EncryptError::Cipher(e.to_string()))?;
        let iv = random_iv();
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|e| EncryptError::Cipher(e.to_string()))?;

        let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    fn decrypt_static(&self, encoded: &str) -> Result<String, EncryptError> {
        let key = self.key_provider.static_key()?;
        let raw = STANDARD.decode(encoded)?;
        if raw.len() < IV_LEN {
            return Err(EncryptError::CiphertextTooShort);
        }
        let (iv, ciphertext) = raw.split_at(IV_LEN);
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| EncryptError::Cipher(e.to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|e| EncryptError::Cipher(e.to_string()))?;
        String::from_utf8(plaintext).map_err(|_| EncryptError::InvalidUtf8)
    }

    async fn encrypt_envelope(&self, plaintext: &str) -> Result<String, EncryptError> {
        let (dek, encrypted_dek) = self.key_provider.generate_data_key().await?;
        if encrypted_dek.len() > u16::MAX as usize {
            return Err(EncryptError::MalformedEnvelope);
        }
        if let Some(cache) = &self.dek_cache {
            cache.insert(encrypted_dek.clone(), dek.clone());
        }

        let cipher = Aes256Gcm::new_from_slice(&dek).map_err(|e| EncryptError::Cipher(e.to_string()))?;
        let iv = random_iv();
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|e| EncryptError::Cipher(e.to_string()))?;

        let mut out = Vec::with_capacity(2 + encrypted_dek.len() + IV_LEN + ciphertext.len());
        out.extend_from_slice(&(encrypted_dek.len() as u16).to_be_bytes());
        out.extend_from_slice(&encrypted_dek);
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    async fn decrypt_envelope(&self, encoded: &str) -> Result<String, EncryptError> {
        let raw = STANDARD.decode(encoded)?;
        if raw.len() < 2 {
            return Err(EncryptError::MalformedEnvelope);
        }
        let (len_prefix, rest) = raw.split_at(2);
        let dek_len = u16::from_be_bytes([len_prefix[0], len_prefix[1]]) as usize;
        if rest.len() < dek_len + IV_LEN {
            return Err(EncryptError::MalformedEnvelope);
        }
        let (encrypted_dek, rest) = rest.split_at(dek_len);
        let (iv, ciphertext) = rest.split_at(IV_LEN);

        let dek = self.resolve_dek(encrypted_dek).await?;

        let cipher = Aes256Gcm::new_from_slice(&dek).map_err(|e| EncryptError::Cipher(e.to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|e| EncryptError::Cipher(e.to_string()))?;
        String::from_utf8(plaintext).map_err(|_| EncryptError::InvalidUtf8)
    }

    async fn resolve_dek(&self, encrypted_dek: &[u8]) -> Result<Vec<u8>, EncryptError> {
        if let Some(cache) = &self.dek_cache {
            if let Some(cached) = cache.get(encrypted_dek) {
                return Ok(cached);
            }
        }
        let dek = self.key_provider.decrypt_data_key(encrypted_dek).await?;
        if let Some(cache) = &self.dek_cache {
            cache.insert(encrypted_dek.to_vec(), dek.clone());
        }
        Ok(dek)
    }
}

fn random_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{LocalEnvelopeKeyProvider, StaticKeyProvider};
    use std::time::Duration;

    #[tokio::test]
    async fn static_mode_round_trips() {
        let provider = Arc::new(StaticKeyProvider::new(&[9u8; 32]).unwrap());
        let strategy = EncryptStrategy::new(provider, None);

        let encoded = strategy.encrypt("jane.doe@example.com").await.unwrap();
        let decoded = strategy.decrypt(&encoded).await.unwrap();
        assert_eq!(decoded, "jane.doe@example.com");
    }

    #[tokio::test]
    async fn static_mode_empty_input_passes_through() {
        let provider = Arc::new(StaticKeyProvider::new(&[9u8; 32]).unwrap());
        let strategy = EncryptStrategy::new(provider, None);
        assert_eq!(strategy.encrypt("").await.unwrap(), "");
        assert_eq!(strategy.decrypt("").await.unwrap(), "");
    }

    #[tokio::test]
    async fn static_mode_rejects_truncated_ciphertext() {
        let provider = Arc::new(StaticKeyProvider::new(&[9u8; 32]).unwrap());
        let strategy = EncryptStrategy::new(provider, None);
        let short = STANDARD.encode([1, 2, 3]);
        let err = strategy.decrypt(&short).await.unwrap_err();
        assert!(matches!(err, EncryptError::CiphertextTooShort));
    }

    #[tokio::test]
    async fn envelope_mode_round_trips() {
        let provider = Arc::new(LocalEnvelopeKeyProvider::new([5u8; 32]));
        let cache = Arc::new(DekCache::new(Duration::from_secs(60), 16));
        let strategy = EncryptStrategy::new(provider, Some(cache));

        let encoded = strategy.encrypt("+15551234567").await.unwrap();
        let decoded = strategy.decrypt(&encoded).await.unwrap();
        assert_eq!(decoded, "+15551234567");
    }

    #[tokio::test]
    async fn envelope_mode_populates_cache_on_decrypt() {
        let provider = Arc::new(LocalEnvelopeKeyProvider::new([5u8; 32]));
        let cache = Arc::new(DekCache::new(Duration::from_secs(60), 16));
        let strategy = EncryptStrategy::new(provider, Some(cache.clone()));

        assert!(cache.is_empty());
        let encoded = strategy.encrypt("value").await.unwrap();
        assert_eq!(cache.len(), 1, "encrypt should seed the cache with the fresh DEK");

        cache.invalidate_all();
        let _ = strategy.decrypt(&encoded).await.unwrap();
        assert_eq!(cache.len(), 1, "decrypt should repopulate the cache on a miss");
    }

    #[tokio::test]
    async fn envelope_mode_rejects_malformed_payload() {
        let provider = Arc::new(LocalEnvelopeKeyProvider::new([5u8; 32]));
        let strategy = EncryptStrategy::new(provider, None);
        let malformed = STANDARD.encode([0xFF, 0xFF, 1, 2, 3]);
        let err = strategy.decrypt(&malformed).await.unwrap_err();
        assert!(matches!(err, EncryptError::MalformedEnvelope));
    }
}
