//! Transport trait - Dispatcher output interface
//!
//! Defines the abstract capability the dispatcher uses to deliver a payload.

use serde::{Deserialize, Serialize};

use crate::{Payload, TransportError};

/// Successful response returned by a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportResponse {
    /// Status code reported by the remote side (HTTP status for HTTP transports)
    pub status: u16,
    /// Raw response body
    pub body: String,
}

impl TransportResponse {
    /// Create a response with the given status and body
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Delivery transport trait
///
/// Shared by all workers of a dispatcher, so `send` takes `&self`.
/// The calling worker stays occupied until the returned future completes.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Transport name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one serialized document
    ///
    /// # Errors
    /// Returns a classified transport error; the dispatcher never retries on its own
    async fn send(&self, payload: &Payload) -> Result<TransportResponse, TransportError>;
}
