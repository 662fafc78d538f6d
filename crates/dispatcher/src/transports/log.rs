//! LogTransport - logs payload summary via tracing (dry run)

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{Payload, Transport, TransportError, TransportResponse};
use tracing::{info, instrument};

/// Transport that logs payloads instead of sending them
pub struct LogTransport {
    name: String,
    sent: AtomicU64,
}

impl LogTransport {
    /// Create a new LogTransport with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sent: AtomicU64::new(0),
        }
    }

    /// Payloads logged so far
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl Transport for LogTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_transport_send",
        skip(self, payload),
        fields(transport = %self.name)
    )]
    async fn send(&self, payload: &Payload) -> Result<TransportResponse, TransportError> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            transport = %self.name,
            n,
            bytes = payload.len(),
            content_type = payload.content_type(),
            "Payload received (dry run)"
        );
        Ok(TransportResponse::new(200, "dry run"))
    }
}
