//! PII field-descriptor vocabulary, shared by the codec and the PII
//! transform engine so neither needs to depend on the other.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Category of sensitive data a field holds, driving MASK's pattern choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PiiType {
    /// Email address.
    Email,
    /// Telephone number.
    Phone,
    /// Person name.
    Name,
    /// Postal address.
    Address,
    /// Anything else sensitive with no dedicated pattern.
    Generic,
}

/// Transform applied to a sensitive field during serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PiiStrategy {
    /// Deterministic, type-dependent partial masking.
    Mask,
    /// AES-256-GCM encryption, static key or envelope-encrypted.
    Encrypt,
    /// HMAC-SHA256 keyed hash.
    Hash,
}

/// `(pii_type, strategy)` pair declared for one field path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiFieldSpec {
    /// What kind of data the field holds.
    pub pii_type: PiiType,
    /// How to transform it.
    pub strategy: PiiStrategy,
}

impl PiiFieldSpec {
    /// Construct a field spec.
    pub fn new(pii_type: PiiType, strategy: PiiStrategy) -> Self {
        Self { pii_type, strategy }
    }
}

/// Per-type schema descriptor: maps a dotted field path to its PII
/// treatment. Registered once at startup (hand-written or generated),
/// consulted by the codec at the hot path with no runtime reflection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PiiSchema {
    fields: HashMap<String, PiiFieldSpec>,
}

impl PiiSchema {
    /// Start building an empty schema.
    pub fn builder() -> PiiSchemaBuilder {
        PiiSchemaBuilder::default()
    }

    /// Look up the declared treatment for a field path, if any.
    pub fn get(&self, field_path: &str) -> Option<PiiFieldSpec> {
        self.fields.get(field_path).copied()
    }

    /// Iterate declared field paths and their specs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, PiiFieldSpec)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are declared sensitive.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builder for [`PiiSchema`].
#[derive(Debug, Default)]
pub struct PiiSchemaBuilder {
    fields: HashMap<String, PiiFieldSpec>,
}

impl PiiSchemaBuilder {
    /// Declare a field path sensitive with the given treatment.
    pub fn field(mut self, path: impl Into<String>, pii_type: PiiType, strategy: PiiStrategy) -> Self {
        self.fields.insert(path.into(), PiiFieldSpec::new(pii_type, strategy));
        self
    }

    /// Finish building.
    pub fn build(self) -> PiiSchema {
        PiiSchema { fields: self.fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_round_trips_lookup() {
        let schema = PiiSchema::builder()
            .field("email", PiiType::Email, PiiStrategy::Mask)
            .field("ssn", PiiType::Generic, PiiStrategy::Encrypt)
            .build();

        assert_eq!(schema.len(), 2);
        assert_eq!(
            schema.get("email"),
            Some(PiiFieldSpec::new(PiiType::Email, PiiStrategy::Mask))
        );
        assert_eq!(schema.get("missing"), None);
    }
}
