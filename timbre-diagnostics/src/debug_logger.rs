//! Structured debug logging system

use crate::error::DiagnosticsError;
use tracing_subscriber::EnvFilter;

/// Installs the process-wide `tracing` subscriber
#[derive(Debug, Default)]
pub struct DebugLogger;

impl DebugLogger {
    /// Create new debug logger
    pub fn new() -> Self {
        Self
    }

    /// Initialize logging at `level` (e.g. `"info"`, `"timbre_media=debug"`).
    ///
    /// `RUST_LOG` takes precedence when set. Returns `Ok(false)` when a global
    /// subscriber was already installed, so repeated calls are harmless.
    pub fn init_logging(level: &str) -> Result<bool, DiagnosticsError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => Self::filter(level)?,
        };

        let installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(true)
            .try_init()
            .is_ok();

        if installed {
            tracing::debug!("Logging initialized at {}", level);
        }
        Ok(installed)
    }

    /// Parse a filter directive without installing anything
    pub fn filter(level: &str) -> Result<EnvFilter, DiagnosticsError> {
        EnvFilter::try_new(level).map_err(|e| DiagnosticsError::InvalidFilter {
            filter: level.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_parsing() {
        assert!(DebugLogger::filter("debug").is_ok());
        assert!(DebugLogger::filter("timbre_media=trace,warn").is_ok());

        let err = DebugLogger::filter("timbre_media=loud").unwrap_err();
        assert!(matches!(err, DiagnosticsError::InvalidFilter { .. }));
    }

    #[test]
    fn test_init_is_idempotent() {
        DebugLogger::init_logging("info").unwrap();
        assert!(!DebugLogger::init_logging("debug").unwrap());
    }
}
