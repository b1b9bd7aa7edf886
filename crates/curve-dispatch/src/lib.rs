#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **curve-dispatch** – Broker client seam plus the three-tier dispatch
//! chain: main topic, DLQ, local backup file (§4.6).

mod backup;
mod client;
mod dispatcher;
mod error;
mod stamp;

pub use client::BrokerClient;
pub use dispatcher::{DispatchConfig, Dispatcher};
pub use error::{BrokerSendError, DispatchError};
pub use stamp::{NoopStamper, PayloadStamper, StampError};
