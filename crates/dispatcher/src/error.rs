//! Dispatcher error types

use std::fmt;
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Invalid configuration (fatal at construction)
    #[error("invalid dispatcher configuration: {0}")]
    Config(#[from] contracts::ContractError),

    /// Dispatcher is shutting down or gone
    #[error("dispatcher is closed")]
    Closed,

    /// A shared dispatcher already exists with a different configuration
    #[error("dispatcher already started with a different configuration: {existing}")]
    ConfigConflict { existing: String },
}

/// Rejected non-blocking submission; hands the document back to the caller
pub enum TrySubmitError<D> {
    /// Queue at capacity
    Full(D),
    /// Dispatcher closed
    Closed(D),
}

impl<D> TrySubmitError<D> {
    /// Recover the rejected document
    pub fn into_document(self) -> D {
        match self {
            Self::Full(doc) | Self::Closed(doc) => doc,
        }
    }

    /// Whether the rejection was caused by backpressure
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }
}

impl<D> fmt::Debug for TrySubmitError<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("Full(..)"),
            Self::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<D> fmt::Display for TrySubmitError<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("queue full, document rejected"),
            Self::Closed(_) => f.write_str("dispatcher is closed, document rejected"),
        }
    }
}

impl<D> std::error::Error for TrySubmitError<D> {}

impl DispatchError {
    /// Create a configuration conflict error
    pub fn config_conflict(existing: impl fmt::Debug) -> Self {
        Self::ConfigConflict {
            existing: format!("{existing:?}"),
        }
    }
}
