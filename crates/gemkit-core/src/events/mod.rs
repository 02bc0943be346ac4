//! # Events
//!
//! Event type identifiers and the payloads they carry.
//!
//! Every monitorable source is one [`EventType`]; when it fires, the
//! dispatcher turns the raw readiness into a [`Payload`] and hands it to the
//! subscribers registered for that type.

mod payload;
mod types;

pub use payload::*;
pub use types::*;
