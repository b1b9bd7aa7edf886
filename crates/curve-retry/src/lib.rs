#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **curve-retry** – Backoff and circuit-breaker primitives shared by the
//! broker dispatcher (§4.6) and the outbox publisher loop (§4.5).

mod backoff;
mod circuit_breaker;

pub use backoff::{RetryPolicy, RetryPolicyError};
pub use circuit_breaker::{CircuitBreaker, CircuitState};
