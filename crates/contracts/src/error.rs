//! Layered error definitions
//!
//! Categorized by source: config / transport / delivery

use thiserror::Error;

/// Unified contract error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Transport Setup Errors =====
    /// Transport could not be constructed
    #[error("transport '{name}' setup error: {message}")]
    TransportSetup { name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create transport setup error
    pub fn transport_setup(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportSetup {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Failure of a single `Transport::send` call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Remote endpoint unreachable
    #[error("connection error: {message}")]
    Connection { message: String },

    /// Request did not complete in time
    #[error("request timed out: {message}")]
    Timeout { message: String },

    /// Remote endpoint answered with a non-success status
    #[error("rejected by remote with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Anything else reported by the transport
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Create connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Short label used for logs and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Timeout { .. } => "timeout",
            Self::Rejected { .. } => "rejected",
            Self::Other(_) => "other",
        }
    }
}

/// Failure of one delivery attempt, as seen by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Document could not be encoded into a payload
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Transport reported a failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The delivery task was cancelled or panicked before completing
    #[error("delivery interrupted: {0}")]
    Interrupted(String),
}

impl DeliveryError {
    /// Short label used for logs and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Serialization(_) => "serialization",
            Self::Transport(e) => e.kind(),
            Self::Interrupted(_) => "interrupted",
        }
    }
}
