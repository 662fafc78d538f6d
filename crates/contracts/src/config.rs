//! DispatchConfig - Config Loader output
//!
//! Describes the rate limit, queue, lifecycle policies and outbound endpoint.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationErrors};

use crate::ContractError;

/// Default CRPT document creation endpoint
pub const DEFAULT_ENDPOINT_URL: &str = "https://ismp.crpt.ru/api/v3/lk/documents/create";

/// Complete dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Quota imposed by the remote side
    pub rate_limit: RateLimitConfig,

    /// Request queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// What happens to queued documents on shutdown
    #[serde(default)]
    pub shutdown_policy: ShutdownPolicy,

    /// Upper bound for the drain phase (None = wait until empty)
    #[serde(default)]
    pub drain_timeout_ms: Option<u64>,

    /// What happens to a document whose delivery failed
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Capacity of the delivery report channel
    #[serde(default = "default_report_capacity")]
    pub report_capacity: usize,

    /// Outbound endpoint
    #[serde(default)]
    pub endpoint: EndpointConfig,
}

fn default_report_capacity() -> usize {
    1024
}

impl DispatchConfig {
    /// Create a configuration with default policies for `count` requests per `interval`
    pub fn new(count: u32, interval: Duration) -> Self {
        Self {
            rate_limit: RateLimitConfig {
                count,
                interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            },
            queue: QueueConfig::default(),
            shutdown_policy: ShutdownPolicy::default(),
            drain_timeout_ms: None,
            failure_policy: FailurePolicy::default(),
            report_capacity: default_report_capacity(),
            endpoint: EndpointConfig::default(),
        }
    }

    /// Effective queue capacity (defaults to the rate limit count)
    pub fn queue_capacity(&self) -> usize {
        self.queue
            .capacity
            .unwrap_or(self.rate_limit.count as usize)
    }

    /// Drain phase bound, if any
    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout_ms.map(Duration::from_millis)
    }

    /// Check the invariants the dispatcher relies on
    ///
    /// # Errors
    /// Returns the first violated rule as `ContractError::ConfigValidation`
    pub fn ensure_valid(&self) -> Result<(), ContractError> {
        self.rate_limit
            .validate()
            .map_err(|e| first_violation("rate_limit", &e))?;
        self.endpoint
            .validate()
            .map_err(|e| first_violation("endpoint", &e))?;

        if self.queue.capacity == Some(0) {
            return Err(ContractError::config_validation(
                "queue.capacity",
                "capacity must be >= 1",
            ));
        }
        if self.drain_timeout_ms == Some(0) {
            return Err(ContractError::config_validation(
                "drain_timeout_ms",
                "drain_timeout_ms must be > 0 when set",
            ));
        }
        if let FailurePolicy::Requeue { max_attempts } = self.failure_policy {
            if max_attempts < 2 {
                return Err(ContractError::config_validation(
                    "failure_policy.max_attempts",
                    format!("max_attempts must be >= 2 for requeue, got {max_attempts}"),
                ));
            }
        }
        if self.report_capacity == 0 {
            return Err(ContractError::config_validation(
                "report_capacity",
                "report_capacity must be >= 1",
            ));
        }
        Ok(())
    }
}

/// Convert validator output into the first contract violation (sorted by field)
fn first_violation(prefix: &str, errors: &ValidationErrors) -> ContractError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let Some((field, violations)) = fields.into_iter().next() else {
        return ContractError::config_validation(prefix, errors.to_string());
    };
    let message = violations
        .first()
        .map(|v| match &v.message {
            Some(message) => message.to_string(),
            None => format!("invalid value ({})", v.code),
        })
        .unwrap_or_else(|| "invalid value".to_string());

    ContractError::config_validation(format!("{prefix}.{field}"), message)
}

/// N requests per interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RateLimitConfig {
    /// Maximum deliveries per interval (N), must be >= 1
    #[validate(range(min = 1, message = "count must be >= 1"))]
    pub count: u32,

    /// Interval length in milliseconds, must be >= 1
    #[validate(range(min = 1, message = "interval_ms must be >= 1"))]
    pub interval_ms: u64,
}

impl RateLimitConfig {
    /// Interval as a `Duration`
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Minimum gap between two delivery starts: `ceil(interval / count)`
    ///
    /// Rounded up to the nanosecond so `count` gaps never add up to less than
    /// one interval. A zero count yields the whole interval.
    pub fn spacing(&self) -> Duration {
        let interval_ns = self.interval().as_nanos();
        let count = u128::from(self.count.max(1));
        let spacing_ns = interval_ns.div_ceil(count);
        Duration::from_nanos(u64::try_from(spacing_ns).unwrap_or(u64::MAX))
    }
}

/// Request queue configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Fixed capacity (None = rate limit count)
    #[serde(default)]
    pub capacity: Option<usize>,
}

/// Shutdown policy for documents still queued
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPolicy {
    /// Keep delivering at the regular cadence until the queue is empty
    #[default]
    Drain,
    /// Drop everything still queued; in-flight deliveries complete
    Discard,
}

/// Policy for documents whose delivery failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Terminal failure, no retry
    #[default]
    Discard,
    /// Put the document back at the tail of the queue
    Requeue {
        /// Total attempts including the first one
        max_attempts: u32,
    },
}

/// Outbound HTTP endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EndpointConfig {
    /// Target URL
    #[validate(url(message = "url must be an absolute URL"))]
    #[serde(default = "default_endpoint_url")]
    pub url: String,

    /// Whole-request timeout in milliseconds
    #[validate(range(min = 1, message = "timeout_ms must be >= 1"))]
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Connect timeout in milliseconds
    #[validate(range(min = 1, message = "connect_timeout_ms must be >= 1"))]
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Optional bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_endpoint_url() -> String {
    DEFAULT_ENDPOINT_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_endpoint_url(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            token: None,
        }
    }
}

impl EndpointConfig {
    /// Whole-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
