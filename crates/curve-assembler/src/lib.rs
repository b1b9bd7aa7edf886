#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **curve-assembler** – Envelope assembler for the curve event delivery
//! pipeline (§4.1).
//!
//! Turns an in-process payload value into an immutable [`EventEnvelope`]:
//! allocates a Snowflake id, stamps `occurred_at`, and resolves ambient
//! metadata (actor, trace, source, schema, tags) from a pluggable context
//! provider. Never fails on missing *optional* metadata — only on an empty
//! `event_type` or id-generation failure.

mod assembler;
mod clock;
mod context;

pub use assembler::{AssemblerError, EnvelopeAssembler};
pub use clock::{Clock, SystemClock};
pub use context::{
    ActorProvider, CompositeContextProvider, ContextProvider, NoActor, NoSchemaOrTags, NoTrace,
    SchemaProvider, SourceProvider, StaticSource, TagsProvider, TraceProvider,
};

pub use curve_types::EventEnvelope;
