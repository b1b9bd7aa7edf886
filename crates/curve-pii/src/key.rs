//! Key provider contract (§6) and the envelope-encryption data-key cache
//! (§4.2.1): TTL-bounded, oldest-entry eviction when full, invalidated
//! atomically on key rotation.

use std::time::{Duration, Instant};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use dashmap::DashMap;
use rand::RngCore;

/// Errors raised by key providers and the DEK cache.
#[derive(Debug, thiserror::Error)]
pub enum KeyProviderError {
    /// A static key was not exactly 32 bytes.
    #[error("static key must be exactly 32 bytes, got {0}")]
    InvalidStaticKeyLength(usize),
    /// A vault key id failed the `[A-Za-z0-9_-]+` path-traversal guard.
    #[error("vault key id must match [A-Za-z0-9_-]+, got {0:?}")]
    InvalidVaultKeyId(String),
    /// Envelope encryption was requested but this provider doesn't support it.
    #[error("envelope encryption not supported by this key provider")]
    EnvelopeUnsupported,
    /// The key provider backend itself failed (KMS unreachable, etc).
    #[error("key provider backend failure: {0}")]
    Backend(String),
}

/// Validate a vault key id against the `[A-Za-z0-9_-]+` path-traversal guard.
pub fn validate_vault_key_id(id: &str) -> Result<(), KeyProviderError> {
    let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(KeyProviderError::InvalidVaultKeyId(id.to_string()))
    }
}

/// External collaborator supplying key material for ENCRYPT fields (§6).
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Whether this provider supports envelope encryption (two-level key
    /// scheme) rather than a single static key.
    fn supports_envelope(&self) -> bool;

    /// Generate a new `(plaintext_dek, encrypted_dek)` pair.
    async fn generate_data_key(&self) -> Result<(Vec<u8>, Vec<u8>), KeyProviderError>;

    /// Unwrap a previously issued encrypted data key.
    async fn decrypt_data_key(&self, encrypted: &[u8]) -> Result<Vec<u8>, KeyProviderError>;

    /// Return the static 32-byte key, for providers that don't do envelope
    /// encryption.
    fn static_key(&self) -> Result<[u8; 32], KeyProviderError>;
}

/// Simplest [`KeyProvider`]: a single, fixed 32-byte key, exact length
/// enforced at construction (rejected at startup otherwise, per §4.2).
#[derive(Clone)]
pub struct StaticKeyProvider {
    key: [u8; 32],
}

impl StaticKeyProvider {
    /// Construct from raw key bytes; fails if not exactly 32 bytes.
    pub fn new(key_bytes: &[u8]) -> Result<Self, KeyProviderError> {
        let key: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| KeyProviderError::InvalidStaticKeyLength(key_bytes.len()))?;
        Ok(Self { key })
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    fn supports_envelope(&self) -> bool {
        false
    }

    async fn generate_data_key(&self) -> Result<(Vec<u8>, Vec<u8>), KeyProviderError> {
        Err(KeyProviderError::EnvelopeUnsupported)
    }

    async fn decrypt_data_key(&self, _encrypted: &[u8]) -> Result<Vec<u8>, KeyProviderError> {
        Err(KeyProviderError::EnvelopeUnsupported)
    }

    fn static_key(&self) -> Result<[u8; 32], KeyProviderError> {
        Ok(self.key)
    }
}

/// Local stand-in for an envelope-encryption KMS: wraps/unwraps generated
/// data keys under a single master key using AES-256-GCM. A real deployment
/// swaps this for the AWS/Vault KMS adapter named as an external
/// collaborator in §6; this implementation exists so the envelope-
/// encryption code path can be exercised without one.
#[derive(Clone)]
pub struct LocalEnvelopeKeyProvider {
    master_key: [u8; 32],
}

impl LocalEnvelopeKeyProvider {
    /// Construct from a 32-byte master key.
    pub fn new(master_key: [u8; 32]) -> Self {
        Self { master_key }
    }

    fn wrap(&self, dek: &[u8]) -> Result<Vec<u8>, KeyProviderError> {
        let cipher = Aes256Gcm::new_from_slice(&self.master_key)
            .map_err(|e| KeyProviderError::Backend(e.to_string()))?;
        let mut iv = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut iv);
        let nonce = Nonce::from_slice(&iv);
        let ciphertext = cipher
            .encrypt(nonce, dek)
            .map_err(|e| KeyProviderError::Backend(e.to_string()))?;

        let mut out = Vec::with_capacity(12 + ciphertext.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn unwrap_dek(&self, wrapped: &[u8]) -> Result<Vec<u8>, KeyProviderError> {
        if wrapped.len() < 12 {
            return Err(KeyProviderError::Backend("wrapped DEK shorter than IV".to_string()));
        }
        let (iv, ciphertext) = wrapped.split_at(12);
        let cipher = Aes256Gcm::new_from_slice(&self.master_key)
            .map_err(|e| KeyProviderError::Backend(e.to_string()))?;
        cipher
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|e| KeyProviderError::Backend(e.to_string()))
    }
}

#[async_trait]
impl KeyProvider for LocalEnvelopeKeyProvider {
    fn supports_envelope(&self) -> bool {
        true
    }

    async fn generate_data_key(&self) -> Result<(Vec<u8>, Vec<u8>), KeyProviderError> {
        let mut dek = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut dek);
        let encrypted = self.wrap(&dek)?;
        Ok((dek.to_vec(), encrypted))
    }

    async fn decrypt_data_key(&self, encrypted: &[u8]) -> Result<Vec<u8>, KeyProviderError> {
        self.unwrap_dek(encrypted)
    }

    fn static_key(&self) -> Result<[u8; 32], KeyProviderError> {
        Err(KeyProviderError::EnvelopeUnsupported)
    }
}

struct CachedDek {
    plaintext: Vec<u8>,
    inserted_at: Instant,
}

/// Bounded, TTL-expiring cache of decrypted data keys, keyed by their
/// encrypted form. Concurrent, lock-free reads via `dashmap`; eviction picks
/// the oldest entry when the cache is full.
pub struct DekCache {
    entries: DashMap<Vec<u8>, CachedDek>,
    ttl: Duration,
    max_entries: usize,
}

impl DekCache {
    /// Construct a cache with the given TTL and maximum entry count.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { entries: DashMap::new(), ttl, max_entries }
    }

    /// Look up a cached plaintext DEK by its encrypted form, honoring TTL.
    pub fn get(&self, encrypted_dek: &[u8]) -> Option<Vec<u8>> {
        let expired = self
            .entries
            .get(encrypted_dek)
            .map(|entry| entry.inserted_at.elapsed() > self.ttl);

        match expired {
            Some(true) => {
                self.entries.remove(encrypted_dek);
                None
            }
            Some(false) => self.entries.get(encrypted_dek).map(|e| e.plaintext.clone()),
            None => None,
        }
    }

    /// Insert a freshly decrypted plaintext DEK, evicting the oldest entry
    /// first if the cache is at capacity.
    pub fn insert(&self, encrypted_dek: Vec<u8>, plaintext: Vec<u8>) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&encrypted_dek) {
            self.evict_oldest();
        }
        self.entries.insert(encrypted_dek, CachedDek { plaintext, inserted_at: Instant::now() });
    }

    /// Invalidate every cached entry atomically; called on key rotation.
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    /// Current number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&self) {
        let oldest_key = self
            .entries
            .iter()
            .min_by_key(|entry| entry.inserted_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest_key {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_key_provider_rejects_short_keys() {
        let err = StaticKeyProvider::new(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, KeyProviderError::InvalidStaticKeyLength(16)));
    }

    #[test]
    fn static_key_provider_accepts_32_bytes() {
        let provider = StaticKeyProvider::new(&[7u8; 32]).unwrap();
        assert_eq!(provider.static_key().unwrap(), [7u8; 32]);
    }

    #[test]
    fn vault_key_id_guard_rejects_path_traversal() {
        assert!(validate_vault_key_id("../../etc/passwd").is_err());
        assert!(validate_vault_key_id("valid-key_123").is_ok());
    }

    #[tokio::test]
    async fn envelope_provider_round_trips_generated_dek() {
        let provider = LocalEnvelopeKeyProvider::new([3u8; 32]);
        let (plaintext, encrypted) = provider.generate_data_key().await.unwrap();
        let decrypted = provider.decrypt_data_key(&encrypted).await.unwrap();
        assert_eq!(plaintext, decrypted);
    }

    #[test]
    fn cache_hits_after_first_insert() {
        let cache = DekCache::new(Duration::from_secs(60), 10);
        assert!(cache.get(b"enc").is_none());
        cache.insert(b"enc".to_vec(), b"plain".to_vec());
        assert_eq!(cache.get(b"enc"), Some(b"plain".to_vec()));
    }

    #[test]
    fn cache_expires_entries_past_ttl() {
        let cache = DekCache::new(Duration::from_millis(1), 10);
        cache.insert(b"enc".to_vec(), b"plain".to_vec());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(b"enc").is_none());
    }

    #[test]
    fn cache_evicts_oldest_entry_when_full() {
        let cache = DekCache::new(Duration::from_secs(60), 2);
        cache.insert(b"first".to_vec(), b"a".to_vec());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(b"second".to_vec(), b"b".to_vec());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(b"third".to_vec(), b"c".to_vec());

        assert_eq!(cache.len(), 2);
        assert!(cache.get(b"first").is_none(), "oldest entry should have been evicted");
        assert!(cache.get(b"second").is_some());
        assert!(cache.get(b"third").is_some());
    }

    #[test]
    fn invalidate_all_clears_cache_atomically() {
        let cache = DekCache::new(Duration::from_secs(60), 10);
        cache.insert(b"enc".to_vec(), b"plain".to_vec());
        cache.invalidate_all();
        assert!(cache.is_empty());
    }
}
