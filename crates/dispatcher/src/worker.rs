//! Worker pool - delivers released documents through the transport
//!
//! Each worker owns one hand-off slot at a time. A failed or panicking
//! delivery only affects its own document.

use std::sync::Arc;

use async_channel::{Receiver, Sender, TrySendError as RetrySendError};
use contracts::{
    DeliveryError, DeliveryReport, FailurePolicy, Payload, Transport, TransportResponse,
};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::metrics::DispatchMetrics;

/// Document plus dispatcher bookkeeping
pub(crate) struct Envelope<D> {
    pub seq: u64,
    pub attempt: u32,
    pub enqueued_at: Instant,
    pub document: D,
}

impl<D> Envelope<D> {
    pub fn new(seq: u64, document: D) -> Self {
        Self {
            seq,
            attempt: 1,
            enqueued_at: Instant::now(),
            document,
        }
    }
}

/// Released document travelling from the scheduler to a worker
pub(crate) struct Assignment<D> {
    pub envelope: Envelope<D>,
    /// Worker slot, released once the transport call returns
    pub permit: OwnedSemaphorePermit,
    pub released_at: Instant,
}

/// State shared by all workers of one dispatcher
pub(crate) struct WorkerContext<D, T> {
    pub transport: Arc<T>,
    /// Retry lane read by the scheduler, sized to the worker count
    pub retries: Sender<Envelope<D>>,
    pub metrics: Arc<DispatchMetrics>,
    pub reports: Option<mpsc::Sender<DeliveryReport>>,
    pub failure_policy: FailurePolicy,
}

/// Worker task that consumes assignments and delivers them
#[instrument(
    name = "dispatch_worker_loop",
    skip(handoff, ctx),
    fields(worker_id = worker_id)
)]
pub(crate) async fn run_worker<D, T>(
    worker_id: usize,
    handoff: Receiver<Assignment<D>>,
    ctx: Arc<WorkerContext<D, T>>,
) where
    D: Serialize + Send + 'static,
    T: Transport + Send + Sync + 'static,
{
    debug!(worker_id, transport = %ctx.transport.name(), "Worker started");

    while let Ok(assignment) = handoff.recv().await {
        let Assignment {
            envelope,
            permit,
            released_at,
        } = assignment;
        let queue_wait = released_at.saturating_duration_since(envelope.enqueued_at);

        ctx.metrics.start_delivery();
        let started = Instant::now();
        let payload = Payload::json(&envelope.document);
        let outcome = match payload {
            Ok(payload) => deliver(&ctx.transport, payload).await,
            Err(e) => Err(DeliveryError::Serialization(e.to_string())),
        };
        let latency = started.elapsed();
        ctx.metrics.finish_delivery();

        // A retry is queued while the slot is still held
        ctx.settle(worker_id, envelope, queue_wait, latency, outcome);
        drop(permit);
    }

    debug!(worker_id, "Worker stopped");
}

/// Send one serialized document
///
/// The transport call runs in its own task so a panic is reported as an
/// interrupted delivery instead of killing the worker.
async fn deliver<T>(transport: &Arc<T>, payload: Payload) -> Result<TransportResponse, DeliveryError>
where
    T: Transport + Send + Sync + 'static,
{
    let transport = Arc::clone(transport);
    match tokio::spawn(async move { transport.send(&payload).await }).await {
        Ok(result) => result.map_err(DeliveryError::from),
        Err(e) if e.is_panic() => Err(DeliveryError::Interrupted("transport panicked".into())),
        Err(e) => Err(DeliveryError::Interrupted(e.to_string())),
    }
}

impl<D, T> WorkerContext<D, T>
where
    D: Send + 'static,
{
    /// Record, report and apply the failure policy to a finished attempt
    fn settle(
        &self,
        worker_id: usize,
        envelope: Envelope<D>,
        queue_wait: Duration,
        latency: Duration,
        outcome: Result<TransportResponse, DeliveryError>,
    ) {
        let failed = outcome.is_err();
        match &outcome {
            Ok(response) => {
                self.metrics.inc_delivered();
                debug!(
                    worker_id,
                    seq = envelope.seq,
                    attempt = envelope.attempt,
                    status = response.status,
                    latency_ms = latency.as_millis() as u64,
                    "Delivered"
                );
            }
            Err(e) => {
                self.metrics.inc_failed();
                error!(
                    worker_id,
                    seq = envelope.seq,
                    attempt = envelope.attempt,
                    kind = e.kind(),
                    error = %e,
                    "Delivery failed"
                );
            }
        }

        self.report(DeliveryReport {
            seq: envelope.seq,
            worker_id,
            attempt: envelope.attempt,
            queue_wait,
            latency,
            outcome,
        });

        if failed {
            self.retry(envelope);
        }
    }

    fn report(&self, report: DeliveryReport) {
        let Some(tx) = &self.reports else {
            return;
        };
        match tx.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(r)) => {
                warn!(seq = r.seq, "Report channel full, report dropped");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    fn retry(&self, envelope: Envelope<D>) {
        let FailurePolicy::Requeue { max_attempts } = self.failure_policy else {
            return;
        };
        let seq = envelope.seq;
        if envelope.attempt >= max_attempts {
            warn!(seq, attempts = envelope.attempt, "Giving up on document");
            return;
        }

        let retry = Envelope {
            attempt: envelope.attempt + 1,
            enqueued_at: Instant::now(),
            ..envelope
        };
        let attempt = retry.attempt;
        match self.retries.try_send(retry) {
            Ok(()) => {
                self.metrics.inc_requeued();
                info!(seq, attempt, "Document requeued after failure");
            }
            Err(RetrySendError::Closed(_)) => {
                self.metrics.add_discarded(1);
                warn!(seq, "Scheduler stopped, failed document dropped");
            }
            Err(RetrySendError::Full(_)) => {
                self.metrics.add_discarded(1);
                error!(seq, "Retry lane full, failed document dropped");
            }
        }
    }
}
