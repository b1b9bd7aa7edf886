//! Default `tracing-subscriber` wiring for binary consumers. Library users
//! embedding curve into an existing service should install their own
//! subscriber instead and skip this module entirely.

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber reading its filter from `RUST_LOG`, falling
/// back to `info` when unset. Intended for demos and standalone binaries;
/// calling this more than once per process will panic (global subscriber
/// can only be set once), matching `tracing_subscriber`'s own contract.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
