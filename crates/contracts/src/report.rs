//! DeliveryReport - outcome of one delivery attempt

use std::time::Duration;

use crate::{DeliveryError, TransportResponse};

/// Outcome of a single delivery attempt
///
/// Emitted by dispatcher workers to an optional observer channel.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    /// Submission sequence number (monotonically increasing per dispatcher)
    pub seq: u64,

    /// Worker that performed the attempt
    pub worker_id: usize,

    /// 1 for the first attempt, incremented on every requeue
    pub attempt: u32,

    /// Time between enqueue and release to the worker
    pub queue_wait: Duration,

    /// Time spent inside the transport (zero on serialization failure)
    pub latency: Duration,

    /// Transport response or classified failure
    pub outcome: Result<TransportResponse, DeliveryError>,
}

impl DeliveryReport {
    /// Whether the attempt succeeded
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}
