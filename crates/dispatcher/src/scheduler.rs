//! Scheduler - single cadence loop releasing queued documents to workers
//!
//! Per release: wait for the pacer slot, wait for a free worker slot,
//! take a pending retry or else the oldest queued document, hand it over.
//! Every release is therefore at least one spacing after the previous one
//! and at most N are in flight.
//!
//! Retries arrive on their own lane, pushed by a worker that still holds its
//! slot. Pending retries plus held slots never exceed N, so the lane (sized
//! N) never fills and no worker waits on the producer queue.

use std::sync::Arc;

use async_channel::{Receiver, Sender};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::metrics::DispatchMetrics;
use crate::pacer::Pacer;
use crate::queue::RequestQueue;
use crate::worker::{Assignment, Envelope};

/// Lifecycle state broadcast by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunState {
    Running,
    /// Queue closed; keep releasing at the cadence until it is empty
    Draining,
    /// Stop releasing; drop whatever is still queued
    Discarding,
}

/// Result of a finished scheduler loop
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SchedulerExit {
    pub released: u64,
    pub discarded: u64,
}

pub(crate) struct Scheduler<D> {
    pub queue: RequestQueue<Envelope<D>>,
    /// Failed documents waiting for another attempt
    pub retries: Receiver<Envelope<D>>,
    pub pacer: Pacer,
    pub slots: Arc<Semaphore>,
    pub workers: u32,
    pub handoff: Sender<Assignment<D>>,
    pub state: watch::Receiver<RunState>,
    pub metrics: Arc<DispatchMetrics>,
}

impl<D: Send + 'static> Scheduler<D> {
    #[instrument(
        name = "dispatch_scheduler_loop",
        skip(self),
        fields(spacing_ms = self.pacer.spacing().as_millis() as u64)
    )]
    pub async fn run(mut self) -> SchedulerExit {
        info!("Scheduler started");

        let mut released: u64 = 0;
        while let Some(assignment) = self.next_assignment().await {
            let seq = assignment.envelope.seq;
            if self.handoff.send(assignment).await.is_err() {
                error!(seq, "Worker pool closed unexpectedly, document lost");
                self.metrics.add_discarded(1);
                break;
            }
            released += 1;
            if released.is_multiple_of(100) {
                debug!(released, queued = self.queue.len(), "Scheduler progress");
            }
        }

        // Workers finish what they hold, then stop
        self.handoff.close();
        let discarded = self.discard_remaining();

        info!(released, discarded, "Scheduler stopped");
        SchedulerExit {
            released,
            discarded,
        }
    }

    /// Wait for the next release; None when the loop must stop
    async fn next_assignment(&mut self) -> Option<Assignment<D>> {
        tokio::select! {
            biased;
            _ = discard_signalled(&mut self.state) => return None,
            _ = self.pacer.ready() => {}
        }

        let permit = tokio::select! {
            biased;
            _ = discard_signalled(&mut self.state) => return None,
            permit = Arc::clone(&self.slots).acquire_owned() => permit.ok()?,
        };

        // Empty queue: the slot is skipped, the pacer does not bank it
        let next = tokio::select! {
            biased;
            _ = discard_signalled(&mut self.state) => return None,
            Ok(retry) = self.retries.recv() => Some(retry),
            envelope = self.queue.dequeue() => envelope,
        };
        let envelope = match next {
            Some(envelope) => envelope,
            // Queue closed and empty: only retries of in-flight documents remain
            None => self.last_retry().await?,
        };

        let released_at = self.pacer.mark_release();
        self.metrics.inc_released();
        trace!(seq = envelope.seq, attempt = envelope.attempt, "Released");

        Some(Assignment {
            envelope,
            permit,
            released_at,
        })
    }

    /// Wait for a retry while other deliveries are still running
    ///
    /// Called holding one slot. Once every other slot is free no delivery is
    /// left that could fail, so an empty retry lane is final.
    async fn last_retry(&mut self) -> Option<Envelope<D>> {
        let others = self.workers.saturating_sub(1);
        tokio::select! {
            biased;
            _ = discard_signalled(&mut self.state) => None,
            Ok(retry) = self.retries.recv() => Some(retry),
            idle = self.slots.acquire_many(others) => {
                drop(idle);
                self.retries.try_recv().ok()
            }
        }
    }

    /// Close the queue and the retry lane, drop everything still in them
    fn discard_remaining(&self) -> u64 {
        self.queue.close();
        self.retries.close();

        let mut discarded: u64 = 0;
        while let Some(envelope) = self.queue.try_dequeue() {
            debug!(seq = envelope.seq, "Discarding queued document");
            discarded += 1;
        }
        while let Ok(envelope) = self.retries.try_recv() {
            debug!(seq = envelope.seq, attempt = envelope.attempt, "Discarding pending retry");
            discarded += 1;
        }

        if discarded > 0 {
            self.metrics.add_discarded(discarded);
            warn!(discarded, "Queued documents discarded");
        }
        discarded
    }
}

/// Resolves once discarding is requested or the dispatcher is dropped
async fn discard_signalled(state: &mut watch::Receiver<RunState>) {
    // A dropped sender means the dispatcher went away without shutdown
    let _ = state.wait_for(|s| *s == RunState::Discarding).await;
}
