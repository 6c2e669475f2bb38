//! Server-sent event status streams.
//!
//! Provides the per-job registry of requester connections and the HTTP
//! handler that turns a registry entry into a `text/event-stream` body.

mod handler;
pub mod registry;

pub use handler::status_handler;
pub use registry::{StreamReceiver, StreamRegistry};
