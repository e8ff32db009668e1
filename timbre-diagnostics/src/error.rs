//! Diagnostics error types

use thiserror::Error;

/// Errors raised while setting up diagnostics
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticsError {
    /// Log filter directive could not be parsed
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// Offending directive
        filter: String,
        /// Parser message
        reason: String,
    },

    /// Monitor needs a running tokio runtime
    #[error("Render monitor unavailable: {reason}")]
    NoRuntime {
        /// Why the monitor task could not start
        reason: String,
    },
}
