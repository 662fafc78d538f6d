//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Transport could not be built
    #[error("Failed to set up transport for {url}: {message}")]
    TransportSetup { url: String, message: String },

    /// Producers stopped before submitting every document
    #[error("Dispatch run aborted: {message}")]
    DispatchAborted { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn transport_setup(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportSetup {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn dispatch_aborted(message: impl Into<String>) -> Self {
        Self::DispatchAborted {
            message: message.into(),
        }
    }
}
