//! The assembler itself (§4.1): `build(payload, event_type, severity) ->
//! envelope`.

use curve_ids::SnowflakeGenerator;
use curve_types::{EventEnvelope, EventMetadata, Severity};

use crate::clock::Clock;
use crate::context::ContextProvider;

/// Errors raised while assembling an envelope.
#[derive(Debug, thiserror::Error)]
pub enum AssemblerError {
    /// `event_type` was empty.
    #[error("event_type must be non-empty")]
    EmptyEventType,
    /// The Snowflake generator could not mint an id.
    #[error("id generation failed: {0}")]
    IdGeneration(#[from] curve_ids::SnowflakeError),
}

/// Builds [`EventEnvelope`]s from a payload, an explicit event type, and a
/// severity, consuming one id from the generator and reading the context
/// provider once per call.
pub struct EnvelopeAssembler<P, Cl, Ctx> {
    clock: Cl,
    ids: SnowflakeGenerator,
    context: Ctx,
    _payload: std::marker::PhantomData<fn() -> P>,
}

impl<P, Cl, Ctx> EnvelopeAssembler<P, Cl, Ctx>
where
    Cl: Clock,
    Ctx: ContextProvider<P>,
{
    /// Construct an assembler from its three collaborators.
    pub fn new(clock: Cl, ids: SnowflakeGenerator, context: Ctx) -> Self {
        Self { clock, ids, context, _payload: std::marker::PhantomData }
    }

    /// Assemble a new, immutable envelope.
    ///
    /// `published_at` is left unset; the dispatcher stamps it immediately
    /// before the broker write.
    pub fn build(
        &self,
        payload: P,
        event_type: impl Into<String>,
        severity: Severity,
    ) -> Result<EventEnvelope<P>, AssemblerError> {
        let event_type = event_type.into();
        if event_type.trim().is_empty() {
            return Err(AssemblerError::EmptyEventType);
        }

        let event_id = self.ids.next_id()?;
        let metadata: EventMetadata = self.context.current_metadata(&payload);
        let occurred_at = self.clock.now();

        tracing::debug!(event_id, event_type = %event_type, %severity, "assembled envelope");

        Ok(EventEnvelope {
            event_id,
            event_type,
            severity,
            occurred_at,
            published_at: None,
            metadata,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::context::{CompositeContextProvider, NoActor, NoSchemaOrTags, NoTrace, StaticSource};
    use curve_ids::ClockBackwardsPolicy;
    use serde::Serialize;

    #[derive(Debug, Clone, Serialize)]
    struct OrderCreated {
        order_id: String,
    }

    fn assembler() -> EnvelopeAssembler<
        OrderCreated,
        SystemClock,
        CompositeContextProvider<NoActor, NoTrace, StaticSource, NoSchemaOrTags, NoSchemaOrTags>,
    > {
        let ids = SnowflakeGenerator::with_clock(
            1,
            curve_ids::DEFAULT_EPOCH_MS,
            ClockBackwardsPolicy::WaitAndRetry,
            curve_ids::SystemClock,
        )
        .unwrap();
        let context = CompositeContextProvider::new(
            NoActor,
            NoTrace,
            StaticSource::default(),
            NoSchemaOrTags,
            NoSchemaOrTags,
        );
        EnvelopeAssembler::new(SystemClock, ids, context)
    }

    #[test]
    fn build_produces_envelope_with_requested_fields() {
        let assembler = assembler();
        let envelope = assembler
            .build(OrderCreated { order_id: "o-1".to_string() }, "ORDER_CREATED", Severity::Info)
            .unwrap();

        assert_eq!(envelope.event_type, "ORDER_CREATED");
        assert_eq!(envelope.severity, Severity::Info);
        assert!(envelope.published_at.is_none());
        assert!(envelope.is_dispatch_consistent());
    }

    #[test]
    fn build_rejects_empty_event_type() {
        let assembler = assembler();
        let result = assembler.build(OrderCreated { order_id: "o-1".to_string() }, "  ", Severity::Info);
        assert!(matches!(result, Err(AssemblerError::EmptyEventType)));
    }

    #[test]
    fn successive_builds_mint_strictly_increasing_ids() {
        let assembler = assembler();
        let first = assembler
            .build(OrderCreated { order_id: "o-1".to_string() }, "ORDER_CREATED", Severity::Info)
            .unwrap();
        let second = assembler
            .build(OrderCreated { order_id: "o-2".to_string() }, "ORDER_CREATED", Severity::Info)
            .unwrap();
        assert!(second.event_id > first.event_id);
    }
}
