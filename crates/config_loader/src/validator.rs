//! Configuration validation
//!
//! Rules:
//! - rate_limit.count >= 1, rate_limit.interval_ms >= 1
//! - queue.capacity >= 1 when set
//! - endpoint.url absolute and http(s)
//! - requeue max_attempts >= 2
//! - drain_timeout_ms > 0 when set

use contracts::{ContractError, DispatchConfig};

/// Validate a DispatchConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &DispatchConfig) -> Result<(), ContractError> {
    config.ensure_valid()?;
    validate_endpoint_scheme(config)?;
    Ok(())
}

/// Only plain HTTP(S) endpoints are supported by the HTTP transport
fn validate_endpoint_scheme(config: &DispatchConfig) -> Result<(), ContractError> {
    let url = config.endpoint.url.to_ascii_lowercase();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ContractError::config_validation(
            "endpoint.url",
            format!("unsupported scheme in '{}'", config.endpoint.url),
        ));
    }
    Ok(())
}

/// Non-fatal observations about a valid configuration
pub fn warnings(config: &DispatchConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.queue_capacity() < config.rate_limit.count as usize {
        warnings.push(format!(
            "queue.capacity ({}) is below rate_limit.count ({}); producers will block early",
            config.queue_capacity(),
            config.rate_limit.count
        ));
    }

    if config.endpoint.url.starts_with("http://") {
        warnings.push("endpoint.url is not using TLS".to_string());
    }

    if config.endpoint.timeout() > config.rate_limit.interval() {
        warnings.push(
            "endpoint.timeout_ms exceeds the rate limit interval; slow requests will hold worker slots"
                .to_string(),
        );
    }

    if config.drain_timeout_ms.is_none() && config.shutdown_policy == contracts::ShutdownPolicy::Drain
    {
        warnings.push("drain has no timeout; shutdown waits for the whole queue".to_string());
    }

    warnings
}
