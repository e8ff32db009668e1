//! Top-level error type

use thiserror::Error;
use timbre_media::MediaError;

/// Errors returned by the Timbre entry point
#[derive(Error, Debug)]
pub enum TimbreError {
    /// Engine could not start
    #[error("Initialization failed: {reason}")]
    Initialization {
        /// Reason for the failure
        reason: String,
    },

    /// Configuration is malformed or out of range
    #[error("Invalid configuration: {reason}")]
    Configuration {
        /// Reason for the failure
        reason: String,
    },

    /// Composition or rendering error
    #[error(transparent)]
    Media(#[from] MediaError),
}

impl From<timbre_media::RenderError> for TimbreError {
    fn from(err: timbre_media::RenderError) -> Self {
        TimbreError::Media(err.into())
    }
}

#[cfg(feature = "diagnostics")]
impl From<timbre_diagnostics::DiagnosticsError> for TimbreError {
    fn from(err: timbre_diagnostics::DiagnosticsError) -> Self {
        TimbreError::Initialization {
            reason: err.to_string(),
        }
    }
}
