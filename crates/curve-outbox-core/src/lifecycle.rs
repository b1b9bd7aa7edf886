//! Schema lifecycle modes (§4.4): the core provides the DDL, it never
//! silently migrates.

use serde::{Deserialize, Serialize};

/// Controls whether and when a driver auto-creates its backing schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaLifecycle {
    /// Auto-create on ephemeral/in-memory test databases only.
    Embedded,
    /// Auto-create if the schema is missing, regardless of environment.
    Always,
    /// Never auto-create; the schema is externally managed.
    Never,
}
