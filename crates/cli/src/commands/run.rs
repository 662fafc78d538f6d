//! `run` command implementation.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{DeliveryReport, DispatchConfig, RegistrationDocument};
use dispatcher::{
    DispatchError, Dispatcher, DispatcherBuilder, DispatcherHandle, HttpTransport, LogTransport,
};
use observability::DeliveryStatsAggregator;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::harness::{DocumentGenerator, RunStats};

/// Execute the `run` command
pub async fn run_dispatch(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let config = load_config(args)?;
    for warning in config_loader::warnings(&config) {
        warn!(%warning, "Configuration warning");
    }

    info!(
        count = config.rate_limit.count,
        interval_ms = config.rate_limit.interval_ms,
        queue_capacity = config.queue_capacity(),
        endpoint = %config.endpoint.url,
        dry_run = args.dry_run,
        "Configuration loaded"
    );

    // Initialize Metrics (optional)
    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let (report_tx, report_rx) = mpsc::channel(config.report_capacity);
    let builder = DispatcherBuilder::new(config.clone()).with_reports(report_tx);
    let dispatcher: Dispatcher<RegistrationDocument> = if args.dry_run {
        builder.start(LogTransport::new("dry-run"))?
    } else {
        let transport = HttpTransport::new("crpt", &config.endpoint).map_err(|e| {
            CliError::transport_setup(config.endpoint.url.clone(), e.to_string())
        })?;
        builder.start(transport)?
    };

    let start_time = Instant::now();
    let collector = tokio::spawn(collect_reports(report_rx));
    let sampler = tokio::spawn(sample_queue_depth(dispatcher.handle()));

    let mut producers = spawn_producers(&dispatcher, args);
    let mut submitted = 0u64;
    let mut crashed = 0usize;

    info!(
        documents = args.documents,
        producers = args.producers,
        "Dispatching..."
    );

    // Setup graceful shutdown handler
    let interrupted = tokio::select! {
        _ = join_producers(&mut producers, &mut submitted, &mut crashed) => false,
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping producers...");
            true
        }
    };

    // A signal during the drain switches to discard
    let shutdown = {
        let drain = dispatcher.shutdown();
        tokio::pin!(drain);
        tokio::select! {
            report = &mut drain => report,
            _ = shutdown_signal() => {
                warn!(
                    queued = dispatcher.handle().queue_len(),
                    "Signal received while draining, discarding queued documents"
                );
                dispatcher.force_discard();
                drain.await
            }
        }
    };
    // Producers blocked on a full queue see it closed now
    join_producers(&mut producers, &mut submitted, &mut crashed).await;
    sampler.abort();
    observability::record_discarded(shutdown.discarded);

    let deliveries = collector.await.context("Report collector failed")?;
    let stats = RunStats {
        submitted,
        not_submitted: args.documents.saturating_sub(submitted),
        duration: start_time.elapsed(),
        interrupted,
        shutdown,
        deliveries,
    };

    info!(
        submitted = stats.submitted,
        delivered = stats.shutdown.delivered,
        failed = stats.shutdown.failed,
        discarded = stats.shutdown.discarded,
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        "Dispatch run completed"
    );
    stats.print_summary();

    if crashed > 0 {
        return Err(CliError::dispatch_aborted(format!("{crashed} producer task(s) panicked")).into());
    }

    info!("CRPT Dispatch finished");
    Ok(())
}

/// Load the config file and apply CLI overrides
fn load_config(args: &RunArgs) -> Result<DispatchConfig> {
    let mut config = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref url) = args.endpoint {
        info!(url = %url, "Overriding endpoint URL from CLI");
        config.endpoint.url = url.clone();
    }
    if args.token.is_some() {
        info!("Overriding bearer token from CLI");
        config.endpoint.token = args.token.clone();
    }

    ConfigLoader::validate(&config).context("Invalid configuration after CLI overrides")?;
    Ok(config)
}

/// Spread `args.documents` over `args.producers` tasks
fn spawn_producers(
    dispatcher: &Dispatcher<RegistrationDocument>,
    args: &RunArgs,
) -> JoinSet<u64> {
    let producers = u64::from(args.producers);
    let base_seed = args.seed.unwrap_or_else(rand::random);
    let mut set = JoinSet::new();

    for producer_id in 0..args.producers {
        let share = args.documents / producers
            + u64::from(u64::from(producer_id) < args.documents % producers);
        let generator = DocumentGenerator::new(producer_id, base_seed.wrapping_add(u64::from(producer_id)));
        set.spawn(produce(dispatcher.handle(), generator, producer_id, share));
    }
    set
}

async fn produce(
    handle: DispatcherHandle<RegistrationDocument>,
    generator: DocumentGenerator,
    producer_id: u16,
    documents: u64,
) -> u64 {
    let mut submitted = 0u64;
    for document in generator.take(documents as usize) {
        match handle.submit(document).await {
            Ok(seq) => {
                submitted += 1;
                observability::record_submission(true);
                debug!(producer_id, seq, "Submitted");
            }
            Err(DispatchError::Closed) => {
                observability::record_submission(false);
                warn!(producer_id, submitted, "Dispatcher closed, producer stopping");
                break;
            }
            Err(e) => {
                observability::record_submission(false);
                error!(producer_id, error = %e, "Submit failed");
                break;
            }
        }
    }
    submitted
}

/// Join finished producers; cancel-safe, progress is kept in the counters
async fn join_producers(set: &mut JoinSet<u64>, submitted: &mut u64, crashed: &mut usize) {
    while let Some(result) = set.join_next().await {
        match result {
            Ok(count) => *submitted += count,
            Err(e) => {
                error!(error = %e, "Producer task failed");
                *crashed += 1;
            }
        }
    }
}

async fn collect_reports(mut rx: mpsc::Receiver<DeliveryReport>) -> DeliveryStatsAggregator {
    let mut aggregator = DeliveryStatsAggregator::new();
    while let Some(report) = rx.recv().await {
        observability::record_delivery(&report);
        aggregator.update(&report);
    }
    aggregator
}

async fn sample_queue_depth(handle: DispatcherHandle<RegistrationDocument>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        observability::record_queue_depth(handle.queue_len());
    }
}

/// Wait for Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
