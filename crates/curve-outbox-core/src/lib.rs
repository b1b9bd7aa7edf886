#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **curve-outbox-core** – The `OutboxStore` trait, its row model and
//! status lifecycle (§3, §4.4). Concrete drivers (`curve-outbox-memory`,
//! `curve-outbox-postgres`) depend on this crate; it makes no assumptions
//! about the backing storage technology.

mod cache;
mod error;
mod lifecycle;
mod record;
mod status;
mod store;

pub use cache::PendingCountCache;
pub use error::OutboxError;
pub use lifecycle::SchemaLifecycle;
pub use record::OutboxRecord;
pub use status::OutboxStatus;
pub use store::OutboxStore;
