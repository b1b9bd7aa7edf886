//! Glob-importable surface for the common case: load config, build,
//! record.

pub use crate::builder::CurveBuilder;
pub use crate::config::CurveConfig;
pub use crate::curve::Curve;
pub use crate::error::CurveError;
pub use crate::telemetry::init_tracing;

pub use curve_dispatch::BrokerClient;
pub use curve_outbox_core::OutboxStore;
pub use curve_types::{PiiSchema, PiiStrategy, PiiType, Severity};
