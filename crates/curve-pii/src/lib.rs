#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **curve-pii** – Field-level PII transform engine (§4.2).
//!
//! Applies a declared [`PiiSchema`] to field values at serialization time:
//! MASK ([`mask`]) is deterministic and irreversible, HASH ([`hash`]) is a
//! keyed HMAC digest, and ENCRYPT ([`encrypt`]) is reversible AES-256-GCM,
//! either under a single static key or via envelope encryption with a
//! cached, per-message data key (§4.2.1).

pub mod encrypt;
pub mod hash;
pub mod key;
pub mod mask;

use std::sync::Arc;

use curve_types::{PiiSchema, PiiStrategy};

pub use encrypt::{EncryptError, EncryptStrategy};
pub use key::{DekCache, KeyProvider, KeyProviderError, LocalEnvelopeKeyProvider, StaticKeyProvider};

/// Errors raised while transforming a declared PII field.
#[derive(Debug, thiserror::Error)]
pub enum PiiError {
    /// The ENCRYPT strategy failed.
    #[error(transparent)]
    Encrypt(#[from] EncryptError),
    /// A reverse transform was requested for an irreversible strategy.
    #[error("field uses the {0:?} strategy, which cannot be reversed")]
    Irreversible(PiiStrategy),
}

/// Applies a [`PiiSchema`] to field values by dotted path, dispatching to
/// the strategy (MASK/ENCRYPT/HASH) declared for each field. Fields absent
/// from the schema pass through unchanged.
pub struct PiiTransformer {
    schema: PiiSchema,
    hash_salt: Vec<u8>,
    encrypt: EncryptStrategy,
}

impl PiiTransformer {
    /// Construct a transformer bound to a schema, a HASH salt, and the key
    /// material backing the ENCRYPT strategy.
    pub fn new(
        schema: PiiSchema,
        hash_salt: Vec<u8>,
        key_provider: Arc<dyn KeyProvider>,
        dek_cache: Option<Arc<DekCache>>,
    ) -> Self {
        Self { schema, hash_salt, encrypt: EncryptStrategy::new(key_provider, dek_cache) }
    }

    /// Transform `value` at `field_path` per the declared schema. Paths not
    /// present in the schema are returned unchanged.
    pub async fn transform_field(&self, field_path: &str, value: &str) -> Result<String, PiiError> {
        let Some(spec) = self.schema.get(field_path) else {
            return Ok(value.to_string());
        };

        match spec.strategy {
            PiiStrategy::Mask => Ok(mask::mask(spec.pii_type, value)),
            PiiStrategy::Hash => Ok(hash::hash(&self.hash_salt, value)),
            PiiStrategy::Encrypt => Ok(self.encrypt.encrypt(value).await?),
        }
    }

    /// Reverse a previously transformed field, when `field_path` is
    /// declared ENCRYPT. MASK and HASH are irreversible by design and
    /// return [`PiiError::Irreversible`].
    pub async fn reverse_field(&self, field_path: &str, value: &str) -> Result<String, PiiError> {
        let Some(spec) = self.schema.get(field_path) else {
            return Ok(value.to_string());
        };

        match spec.strategy {
            PiiStrategy::Encrypt => Ok(self.encrypt.decrypt(value).await?),
            other => Err(PiiError::Irreversible(other)),
        }
    }

    /// The schema this transformer was constructed with.
    pub fn schema(&self) -> &PiiSchema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve_types::PiiType;
    use std::time::Duration;

    fn transformer() -> PiiTransformer {
        let schema = PiiSchema::builder()
            .field("user.email", PiiType::Email, PiiStrategy::Mask)
            .field("user.ssn", PiiType::Generic, PiiStrategy::Encrypt)
            .field("user.external_id", PiiType::Generic, PiiStrategy::Hash)
            .build();
        let provider = Arc::new(LocalEnvelopeKeyProvider::new([1u8; 32]));
        let cache = Arc::new(DekCache::new(Duration::from_secs(60), 16));
        PiiTransformer::new(schema, b"test-salt".to_vec(), provider, Some(cache))
    }

    #[tokio::test]
    async fn undeclared_field_passes_through() {
        let t = transformer();
        assert_eq!(t.transform_field("user.name", "Jane").await.unwrap(), "Jane");
    }

    #[tokio::test]
    async fn mask_field_is_transformed() {
        let t = transformer();
        let masked = t.transform_field("user.email", "jane.doe@example.com").await.unwrap();
        assert_eq!(masked, "j***@ex***.com");
    }

    #[tokio::test]
    async fn encrypt_field_round_trips_via_reverse() {
        let t = transformer();
        let encrypted = t.transform_field("user.ssn", "123-45-6789").await.unwrap();
        assert_ne!(encrypted, "123-45-6789");
        let decrypted = t.reverse_field("user.ssn", &encrypted).await.unwrap();
        assert_eq!(decrypted, "123-45-6789");
    }

    #[tokio::test]
    async fn mask_and_hash_are_irreversible() {
        let t = transformer();
        let masked = t.transform_field("user.email", "jane.doe@example.com").await.unwrap();
        let err = t.reverse_field("user.email", &masked).await.unwrap_err();
        assert!(matches!(err, PiiError::Irreversible(PiiStrategy::Mask)));

        let hashed = t.transform_field("user.external_id", "abc123").await.unwrap();
        let err = t.reverse_field("user.external_id", &hashed).await.unwrap_err();
        assert!(matches!(err, PiiError::Irreversible(PiiStrategy::Hash)));
    }
}
