//! Ambient context resolution (§4.1): composes independent sub-providers
//! for actor, trace, source, schema, and tags. Each sub-provider may return
//! `None`/empty — the assembler never fails on missing optional metadata,
//! because downstream consumers distinguish "unknown" from "empty".

use curve_types::{ActorMetadata, EventMetadata, SchemaMetadata, SourceMetadata, TraceMetadata};
use std::collections::HashMap;

/// Resolves the full ambient [`EventMetadata`] for a payload of type `P`.
///
/// Implementations compose the narrower sub-provider traits below; a single
/// blanket impl does that composition for any type implementing all four,
/// so most callers only need [`CompositeContextProvider`].
pub trait ContextProvider<P>: Send + Sync {
    /// Resolve metadata for the given payload, read once per assembly.
    fn current_metadata(&self, payload: &P) -> EventMetadata;
}

/// Resolves actor identity, independent of payload type.
pub trait ActorProvider: Send + Sync {
    /// Current actor, or a default/empty record if unknown.
    fn actor(&self) -> ActorMetadata;
}

/// Resolves distributed-tracing identifiers, carried through rather than
/// generated here (§1 non-goal: tracing propagation is out of scope beyond
/// carrying externally assigned ids).
pub trait TraceProvider: Send + Sync {
    /// Current trace context, or empty if none is active.
    fn trace(&self) -> TraceMetadata;
}

/// Resolves the producing service's identity.
pub trait SourceProvider: Send + Sync {
    /// Source metadata for this process.
    fn source(&self) -> SourceMetadata;
}

/// Resolves the schema identity for a payload of type `P`.
pub trait SchemaProvider<P>: Send + Sync {
    /// Schema name/version for this payload type, if registered.
    fn schema(&self, payload: &P) -> Option<SchemaMetadata>;
}

/// Resolves free-form tags for a payload of type `P`.
pub trait TagsProvider<P>: Send + Sync {
    /// Tags to attach, empty if none apply.
    fn tags(&self, payload: &P) -> HashMap<String, String>;
}

/// Combines the four sub-providers into one [`ContextProvider`].
pub struct CompositeContextProvider<A, T, S, Sc, Tg> {
    actor: A,
    trace: T,
    source: S,
    schema: Sc,
    tags: Tg,
}

impl<A, T, S, Sc, Tg> CompositeContextProvider<A, T, S, Sc, Tg> {
    /// Compose sub-providers into one.
    pub fn new(actor: A, trace: T, source: S, schema: Sc, tags: Tg) -> Self {
        Self { actor, trace, source, schema, tags }
    }
}

impl<P, A, T, S, Sc, Tg> ContextProvider<P> for CompositeContextProvider<A, T, S, Sc, Tg>
where
    A: ActorProvider,
    T: TraceProvider,
    S: SourceProvider,
    Sc: SchemaProvider<P>,
    Tg: TagsProvider<P>,
{
    fn current_metadata(&self, payload: &P) -> EventMetadata {
        EventMetadata {
            source: self.source.source(),
            actor: self.actor.actor(),
            trace: self.trace.trace(),
            schema: self.schema.schema(payload),
            tags: self.tags.tags(payload),
        }
    }
}

/// Static [`SourceProvider`] carrying a fixed service identity, the common
/// case for a single deployed service instance.
#[derive(Debug, Clone, Default)]
pub struct StaticSource(pub SourceMetadata);

impl SourceProvider for StaticSource {
    fn source(&self) -> SourceMetadata {
        self.0.clone()
    }
}

/// [`ActorProvider`]/[`TraceProvider`] that always resolve to empty
/// records, useful for system-initiated events with no caller context.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActor;

impl ActorProvider for NoActor {
    fn actor(&self) -> ActorMetadata {
        ActorMetadata::default()
    }
}

/// [`TraceProvider`] that always resolves to an empty trace record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrace;

impl TraceProvider for NoTrace {
    fn trace(&self) -> TraceMetadata {
        TraceMetadata::default()
    }
}

/// [`SchemaProvider`]/[`TagsProvider`] that never declare a schema or tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSchemaOrTags;

impl<P> SchemaProvider<P> for NoSchemaOrTags {
    fn schema(&self, _payload: &P) -> Option<SchemaMetadata> {
        None
    }
}

impl<P> TagsProvider<P> for NoSchemaOrTags {
    fn tags(&self, _payload: &P) -> HashMap<String, String> {
        HashMap::new()
    }
}
