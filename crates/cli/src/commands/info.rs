//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{DispatchConfig, FailurePolicy, ShutdownPolicy};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    rate_limit: RateInfo,
    queue_capacity: usize,
    shutdown: ShutdownInfo,
    failure_policy: FailurePolicy,
    endpoint: EndpointInfo,
}

#[derive(Serialize)]
struct RateInfo {
    count: u32,
    interval_ms: u64,
    workers: u32,
    spacing_ms: f64,
    max_per_minute: f64,
}

#[derive(Serialize)]
struct ShutdownInfo {
    policy: ShutdownPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    drain_timeout_ms: Option<u64>,
}

#[derive(Serialize)]
struct EndpointInfo {
    url: String,
    timeout_ms: u64,
    connect_timeout_ms: u64,
    authenticated: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &DispatchConfig) -> ConfigInfo {
    let spacing = config.rate_limit.spacing();
    let max_per_minute = if spacing.is_zero() {
        0.0
    } else {
        60.0 / spacing.as_secs_f64()
    };

    ConfigInfo {
        rate_limit: RateInfo {
            count: config.rate_limit.count,
            interval_ms: config.rate_limit.interval_ms,
            workers: config.rate_limit.count,
            spacing_ms: spacing.as_secs_f64() * 1000.0,
            max_per_minute,
        },
        queue_capacity: config.queue_capacity(),
        shutdown: ShutdownInfo {
            policy: config.shutdown_policy,
            drain_timeout_ms: config.drain_timeout_ms,
        },
        failure_policy: config.failure_policy,
        endpoint: EndpointInfo {
            url: config.endpoint.url.clone(),
            timeout_ms: config.endpoint.timeout_ms,
            connect_timeout_ms: config.endpoint.connect_timeout_ms,
            authenticated: config.endpoint.token.is_some(),
        },
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("\n=== Dispatch Configuration ===\n");

    println!("Rate limit:");
    println!(
        "  {} requests per {}ms",
        info.rate_limit.count, info.rate_limit.interval_ms
    );
    println!("  Workers: {}", info.rate_limit.workers);
    println!("  Spacing: {:.3}ms", info.rate_limit.spacing_ms);
    println!("  Max throughput: {:.1}/min", info.rate_limit.max_per_minute);

    println!("\nQueue capacity: {}", info.queue_capacity);

    println!("\nShutdown:");
    println!("  Policy: {:?}", info.shutdown.policy);
    if let Some(timeout) = info.shutdown.drain_timeout_ms {
        println!("  Drain timeout: {}ms", timeout);
    }

    match info.failure_policy {
        FailurePolicy::Discard => println!("\nOn failure: discard"),
        FailurePolicy::Requeue { max_attempts } => {
            println!("\nOn failure: requeue (max {} attempts)", max_attempts)
        }
    }

    println!("\nEndpoint:");
    println!("  URL: {}", info.endpoint.url);
    println!(
        "  Timeouts: {}ms request, {}ms connect",
        info.endpoint.timeout_ms, info.endpoint.connect_timeout_ms
    );
    println!("  Bearer token: {}", if info.endpoint.authenticated { "set" } else { "none" });

    println!();
}
