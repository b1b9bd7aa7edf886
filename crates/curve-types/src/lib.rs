#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **curve-types** – Core data model for the curve event delivery pipeline.
//!
//! This crate is dependency-light and sits at the bottom of the crate graph
//! so that every other `curve-*` crate can depend on it without causing
//! cycles. It defines the event envelope, its nested metadata records,
//! severity levels, and the PII field-descriptor vocabulary shared by the
//! codec and the PII transform engine. It makes no assumptions about I/O,
//! cryptography, or storage.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod dlq;
pub mod error;
pub mod pii;

pub use dlq::DlqRecord;
pub use error::ErrorKind;
pub use pii::{PiiFieldSpec, PiiSchema, PiiStrategy, PiiType};

//─────────────────────────────
//  Severity
//─────────────────────────────

/// Severity level attached to an event, mirrored from the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Fine-grained diagnostic detail.
    Trace,
    /// Diagnostic detail useful during development.
    Debug,
    /// Normal operational event.
    Info,
    /// Unexpected but recoverable condition.
    Warn,
    /// Operation failed.
    Error,
    /// Operation failed in a way that threatens system integrity.
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

//─────────────────────────────
//  Metadata
//─────────────────────────────

/// Identifies the producing service instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Logical service name.
    pub service_name: Option<String>,
    /// Deployed service version.
    pub service_version: Option<String>,
    /// Instance identifier (pod name, process id, etc).
    pub instance_id: Option<String>,
    /// Host name or address.
    pub host: Option<String>,
    /// Correlation id of the upstream request, if any.
    pub correlation_id: Option<String>,
    /// Id of the event/command that caused this one, if any.
    pub causation_id: Option<String>,
}

/// Identifies who or what triggered the event. All fields optional: an
/// unauthenticated or system-initiated action carries an empty actor record
/// rather than failing assembly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorMetadata {
    /// Subject (user/service account) identifier.
    pub subject_id: Option<String>,
    /// Role the subject acted under.
    pub role: Option<String>,
    /// Client IP address, if known.
    pub client_ip: Option<String>,
}

/// Distributed-tracing identifiers carried through, never generated here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceMetadata {
    /// Trace identifier.
    pub trace_id: Option<String>,
    /// Span identifier within the trace.
    pub span_id: Option<String>,
    /// Correlation identifier, independent of the tracing system.
    pub correlation_id: Option<String>,
}

/// Identifies the payload schema and its version.
///
/// `version` must be `>= 1`; use [`SchemaMetadata::new`] to enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    /// Schema name.
    pub name: String,
    /// Schema version, always `>= 1`.
    pub version: u32,
}

impl SchemaMetadata {
    /// Construct schema metadata, rejecting a version of zero.
    pub fn new(name: impl Into<String>, version: u32) -> Result<Self, error::CurveTypeError> {
        if version == 0 {
            return Err(error::CurveTypeError::InvalidSchemaVersion);
        }
        Ok(Self { name: name.into(), version })
    }
}

/// Full ambient metadata record attached to every envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Producing-service identity.
    pub source: SourceMetadata,
    /// Actor that triggered the event.
    pub actor: ActorMetadata,
    /// Distributed tracing identifiers.
    pub trace: TraceMetadata,
    /// Payload schema identity, `None` until the assembler stamps it.
    pub schema: Option<SchemaMetadata>,
    /// Free-form string tags; insertion order is not significant.
    pub tags: HashMap<String, String>,
}

//─────────────────────────────
//  Payload marker
//─────────────────────────────

/// Marker trait implemented by any type usable as an envelope payload.
///
/// This mirrors the blanket `EventPayload` marker used for storage payloads
/// elsewhere in the ecosystem: any `Serialize + Send + Sync` type qualifies
/// automatically, so callers never need to write an impl block by hand.
pub trait EventPayload: Serialize + Send + Sync {}

impl<T> EventPayload for T where T: Serialize + Send + Sync {}

//─────────────────────────────
//  Envelope
//─────────────────────────────

/// Immutable, canonical event record produced by the assembler and
/// transmitted to the broker.
///
/// `occurred_at` is stamped at assembly time; `published_at` is `None` until
/// the dispatcher stamps it immediately before the broker write (§4.1: the
/// dispatcher stamps post-serialize, pre-ack).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<P> {
    /// Snowflake-style 64-bit event identifier.
    pub event_id: u64,
    /// Non-empty, domain-meaningful event type.
    pub event_type: String,
    /// Severity of the event.
    pub severity: Severity,
    /// UTC timestamp, millisecond resolution, stamped at assembly time.
    pub occurred_at: DateTime<Utc>,
    /// UTC timestamp, millisecond resolution, stamped by the dispatcher.
    pub published_at: Option<DateTime<Utc>>,
    /// Ambient metadata.
    pub metadata: EventMetadata,
    /// Domain payload value.
    pub payload: P,
}

impl<P> EventEnvelope<P> {
    /// Returns `true` once `published_at` has been stamped and the ordering
    /// invariant `occurred_at <= published_at` holds.
    pub fn is_dispatch_consistent(&self) -> bool {
        match self.published_at {
            Some(published_at) => self.occurred_at <= published_at,
            None => true,
        }
    }

    /// Stamp `published_at` with the given instant.
    ///
    /// Called by the dispatcher immediately before the broker write. A
    /// backward skew of up to 100ms relative to `occurred_at` is tolerated
    /// silently; larger skew is the caller's responsibility to log (this
    /// type has no logging dependency).
    pub fn stamp_published_at(&mut self, now: DateTime<Utc>) {
        self.published_at = Some(now);
    }
}
