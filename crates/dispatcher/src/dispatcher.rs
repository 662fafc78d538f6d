//! Dispatcher - rate-limited delivery of queued documents
//!
//! Producers submit through a [`DispatcherHandle`]; a single scheduler
//! releases documents at most once per `interval / N` to a pool of N workers.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use contracts::{ContractError, DeliveryReport, DispatchConfig, ShutdownPolicy, Transport};
use serde::Serialize;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, instrument, trace, warn};

use crate::error::{DispatchError, TrySubmitError};
use crate::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::pacer::Pacer;
use crate::queue::{QueueError, RequestQueue};
use crate::scheduler::{RunState, Scheduler, SchedulerExit};
use crate::worker::{run_worker, Envelope, WorkerContext};

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder<D> {
    config: DispatchConfig,
    reports: Option<mpsc::Sender<DeliveryReport>>,
    _document: PhantomData<fn(D)>,
}

impl<D> DispatcherBuilder<D>
where
    D: Serialize + Send + 'static,
{
    /// Create a new DispatcherBuilder
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            reports: None,
            _document: PhantomData,
        }
    }

    /// Send a `DeliveryReport` for every attempt to this channel
    ///
    /// Reports are dropped (with a warning) when the channel is full;
    /// workers never wait on the observer.
    pub fn with_reports(mut self, tx: mpsc::Sender<DeliveryReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    /// Validate the configuration and start the scheduler and worker pool
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(
        name = "dispatcher_builder_start",
        skip(self, transport),
        fields(
            count = self.config.rate_limit.count,
            interval_ms = self.config.rate_limit.interval_ms
        )
    )]
    pub fn start<T>(self, transport: T) -> Result<Dispatcher<D>, DispatchError>
    where
        T: Transport + Send + Sync + 'static,
    {
        let config = self.config;
        config.ensure_valid()?;

        let worker_count = config.rate_limit.count as usize;
        let queue = RequestQueue::new(config.queue_capacity()).ok_or_else(|| {
            ContractError::config_validation("queue.capacity", "capacity must be >= 1")
        })?;
        let metrics = Arc::new(DispatchMetrics::new());
        let (state_tx, state_rx) = watch::channel(RunState::Running);
        let (handoff_tx, handoff_rx) = async_channel::bounded(worker_count);
        let (retry_tx, retry_rx) = async_channel::bounded(worker_count);

        let transport_name = transport.name().to_string();
        let ctx = Arc::new(WorkerContext {
            transport: Arc::new(transport),
            retries: retry_tx,
            metrics: Arc::clone(&metrics),
            reports: self.reports,
            failure_policy: config.failure_policy,
        });

        let workers = (0..worker_count)
            .map(|worker_id| {
                tokio::spawn(run_worker(worker_id, handoff_rx.clone(), Arc::clone(&ctx)))
            })
            .collect();

        let scheduler = Scheduler {
            queue: queue.clone(),
            retries: retry_rx,
            pacer: Pacer::new(config.rate_limit.spacing()),
            slots: Arc::new(Semaphore::new(worker_count)),
            workers: config.rate_limit.count,
            handoff: handoff_tx,
            state: state_rx,
            metrics: Arc::clone(&metrics),
        };
        let scheduler = tokio::spawn(scheduler.run());

        info!(
            workers = worker_count,
            queue_capacity = queue.capacity(),
            spacing_ms = config.rate_limit.spacing().as_millis() as u64,
            transport = %transport_name,
            shutdown_policy = ?config.shutdown_policy,
            failure_policy = ?config.failure_policy,
            "Dispatcher started"
        );

        Ok(Dispatcher {
            handle: DispatcherHandle {
                queue,
                metrics,
                seq: Arc::new(AtomicU64::new(0)),
            },
            config,
            state_tx,
            tasks: Mutex::new(Some(DispatcherTasks { scheduler, workers })),
        })
    }
}

/// Cheap, cloneable producer-side handle
pub struct DispatcherHandle<D> {
    queue: RequestQueue<Envelope<D>>,
    metrics: Arc<DispatchMetrics>,
    seq: Arc<AtomicU64>,
}

impl<D> Clone for DispatcherHandle<D> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            metrics: Arc::clone(&self.metrics),
            seq: Arc::clone(&self.seq),
        }
    }
}

impl<D> DispatcherHandle<D> {
    /// Queue a document, waiting while the queue is full
    ///
    /// Returns the submission sequence number. Dropping the returned future
    /// before it completes leaves the queue untouched.
    ///
    /// # Errors
    /// `DispatchError::Closed` once shutdown has begun
    pub async fn submit(&self, document: D) -> Result<u64, DispatchError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.queue
            .enqueue(Envelope::new(seq, document))
            .await
            .map_err(|_| DispatchError::Closed)?;
        self.metrics.inc_submitted();
        trace!(seq, "Document queued");
        Ok(seq)
    }

    /// Queue a document without waiting
    ///
    /// # Errors
    /// Hands the document back when the queue is full or closed
    pub fn try_submit(&self, document: D) -> Result<u64, TrySubmitError<D>> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        match self.queue.try_enqueue(Envelope::new(seq, document)) {
            Ok(()) => {
                self.metrics.inc_submitted();
                trace!(seq, "Document queued");
                Ok(seq)
            }
            Err(QueueError::Full(envelope)) => {
                self.metrics.inc_rejected();
                Err(TrySubmitError::Full(envelope.document))
            }
            Err(QueueError::Closed(envelope)) => Err(TrySubmitError::Closed(envelope.document)),
        }
    }

    /// Documents waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Queue capacity
    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Whether the dispatcher stopped accepting documents
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    /// Current metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.queue.len())
    }
}

struct DispatcherTasks {
    scheduler: JoinHandle<SchedulerExit>,
    workers: Vec<JoinHandle<()>>,
}

/// Summary returned by [`Dispatcher::shutdown`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Documents released to workers by the scheduler
    pub released: u64,
    /// Successful deliveries over the dispatcher's lifetime
    pub delivered: u64,
    /// Failed attempts over the dispatcher's lifetime
    pub failed: u64,
    /// Queued documents dropped by this shutdown
    pub discarded: u64,
    /// Whether the drain phase hit `drain_timeout_ms`
    pub drain_timed_out: bool,
}

/// The throttling dispatcher
///
/// Lives until [`Dispatcher::shutdown`]; dropping it without shutdown
/// discards queued documents.
pub struct Dispatcher<D> {
    handle: DispatcherHandle<D>,
    config: DispatchConfig,
    state_tx: watch::Sender<RunState>,
    tasks: Mutex<Option<DispatcherTasks>>,
}

impl<D> fmt::Debug for Dispatcher<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("rate_limit", &self.config.rate_limit)
            .field("queue_capacity", &self.handle.queue.capacity())
            .field("state", &*self.state_tx.borrow())
            .field("metrics", &self.metrics())
            .finish_non_exhaustive()
    }
}

impl<D> Dispatcher<D>
where
    D: Serialize + Send + 'static,
{
    /// Start a dispatcher without a report channel
    pub fn start<T>(config: DispatchConfig, transport: T) -> Result<Self, DispatchError>
    where
        T: Transport + Send + Sync + 'static,
    {
        DispatcherBuilder::new(config).start(transport)
    }
}

impl<D> Dispatcher<D> {
    /// Producer handle sharing this dispatcher's queue
    pub fn handle(&self) -> DispatcherHandle<D> {
        self.handle.clone()
    }

    /// Queue a document, waiting while the queue is full
    pub async fn submit(&self, document: D) -> Result<u64, DispatchError> {
        self.handle.submit(document).await
    }

    /// Queue a document without waiting
    pub fn try_submit(&self, document: D) -> Result<u64, TrySubmitError<D>> {
        self.handle.try_submit(document)
    }

    /// Immutable configuration this dispatcher was started with
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Current metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        self.handle.metrics()
    }

    /// Stop releasing and drop everything still queued
    ///
    /// Works on a running or draining dispatcher, e.g. to cut a drain short.
    /// In-flight deliveries finish; [`Dispatcher::shutdown`] still collects
    /// the report.
    pub fn force_discard(&self) {
        self.handle.queue.close();
        self.set_state(RunState::Discarding);
    }

    /// Move the lifecycle forward; Discarding is final
    fn set_state(&self, next: RunState) {
        self.state_tx.send_if_modified(|state| {
            if *state == RunState::Discarding || *state == next {
                return false;
            }
            *state = next;
            true
        });
    }

    /// Stop accepting documents and apply the configured shutdown policy
    ///
    /// Waits for in-flight deliveries. Calling it again returns an empty report.
    #[instrument(
        name = "dispatcher_shutdown",
        skip(self),
        fields(policy = ?self.config.shutdown_policy)
    )]
    pub async fn shutdown(&self) -> ShutdownReport {
        let tasks = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(DispatcherTasks {
            mut scheduler,
            workers,
        }) = tasks
        else {
            return ShutdownReport::default();
        };

        self.handle.queue.close();
        let policy = self.config.shutdown_policy;
        info!(
            queued = self.handle.queue.len(),
            "Dispatcher closed to new documents"
        );

        let mut drain_timed_out = false;
        let exit = match policy {
            ShutdownPolicy::Discard => {
                self.set_state(RunState::Discarding);
                scheduler.await
            }
            ShutdownPolicy::Drain => {
                self.set_state(RunState::Draining);
                match self.config.drain_timeout() {
                    Some(limit) => match timeout(limit, &mut scheduler).await {
                        Ok(exit) => exit,
                        Err(_) => {
                            warn!(
                                timeout_ms = limit.as_millis() as u64,
                                remaining = self.handle.queue.len(),
                                "Drain timed out, discarding the rest"
                            );
                            drain_timed_out = true;
                            self.set_state(RunState::Discarding);
                            scheduler.await
                        }
                    },
                    None => scheduler.await,
                }
            }
        };

        let exit = exit.unwrap_or_else(|e| {
            error!(error = ?e, "Scheduler task panicked");
            SchedulerExit::default()
        });

        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = ?e, "Worker task panicked");
            }
        }

        let metrics = self.handle.metrics.as_ref();
        let report = ShutdownReport {
            released: exit.released,
            delivered: metrics.delivered(),
            failed: metrics.failed(),
            // Includes failed documents whose retry came after the scheduler stopped
            discarded: metrics.discarded(),
            drain_timed_out,
        };
        info!(
            released = report.released,
            delivered = report.delivered,
            failed = report.failed,
            discarded = report.discarded,
            left_in_queue = exit.discarded,
            "Dispatcher shutdown complete"
        );
        report
    }
}
