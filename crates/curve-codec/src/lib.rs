#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **curve-codec** – Serialization codecs for the curve event delivery
//! pipeline (§4.7): JSON (default) and a binary schema-registry variant.
//! Both invoke the PII transform engine on declared payload fields before
//! any byte leaves the process.

mod binary;
mod error;
mod json;
mod path;

pub use binary::BinaryCodec;
pub use error::CodecError;
pub use json::JsonCodec;
