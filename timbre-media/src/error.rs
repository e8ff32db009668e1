//! Media error types and handling
//!
//! This module defines the error taxonomy shared by the composition model and the
//! audio renderer. Renderer-session failures live in [`RenderError`] and are wrapped
//! here so callers that drive both sides only need to match on one type.

use crate::render::RenderError;
use crate::tracks::TrackId;
use std::convert::Infallible;
use thiserror::Error;

/// Main error type for media operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    /// Malformed input to a constructive operation
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Track handle does not refer to a live track of this asset
    #[error("Track not found: {track_id}")]
    TrackNotFound {
        /// Stale or foreign track identifier
        track_id: TrackId,
    },

    /// Asset already holds the configured maximum number of tracks
    #[error("Track limit exceeded: {limit}")]
    TrackLimitExceeded {
        /// Maximum number of tracks allowed
        limit: usize,
    },

    /// Audio renderer session error
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Shorthand for an [`MediaError::InvalidArgument`] with the given message
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        MediaError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::InvalidArgument { .. } => false,
            MediaError::TrackNotFound { .. } => false,
            MediaError::TrackLimitExceeded { .. } => true,
            MediaError::Render(err) => err.is_recoverable(),
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::InvalidArgument { .. } => ErrorCategory::Argument,
            MediaError::TrackNotFound { .. } => ErrorCategory::Composition,
            MediaError::TrackLimitExceeded { .. } => ErrorCategory::Composition,
            MediaError::Render(err) => match err {
                RenderError::DeviceUnavailable { .. } | RenderError::Stream { .. } => {
                    ErrorCategory::Device
                }
                RenderError::FormatMismatch { .. } | RenderError::InvalidBuffer { .. } => {
                    ErrorCategory::Format
                }
                RenderError::NotNegotiated
                | RenderError::AlreadyNegotiated
                | RenderError::TornDown => ErrorCategory::State,
                RenderError::Backpressure { .. } => ErrorCategory::Flow,
            },
        }
    }
}

// `add_track` accepts anything convertible into a media type; converting a
// `MediaType` into itself cannot fail.
impl From<Infallible> for MediaError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed caller input
    Argument,
    /// Asset/track composition errors
    Composition,
    /// Output device and stream errors
    Device,
    /// Sample format and buffer shape errors
    Format,
    /// Renderer lifecycle errors
    State,
    /// Buffer flow control
    Flow,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{AudioDescriptor, SampleFormat};

    #[test]
    fn test_error_categories() {
        let err = MediaError::invalid_argument("unknown media type 'midi'");
        assert_eq!(err.category(), ErrorCategory::Argument);
        assert!(!err.is_recoverable());

        let err = MediaError::from(RenderError::Backpressure {
            pending: 8,
            capacity: 8,
        });
        assert_eq!(err.category(), ErrorCategory::Flow);
        assert!(err.is_recoverable());

        let err = MediaError::from(RenderError::DeviceUnavailable {
            reason: "no route".to_string(),
        });
        assert_eq!(err.category(), ErrorCategory::Device);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let error = MediaError::TrackLimitExceeded { limit: 4 };
        assert_eq!(error.to_string(), "Track limit exceeded: 4");

        let expected = AudioDescriptor::new(48_000, 2, SampleFormat::F32).unwrap();
        let actual = AudioDescriptor::new(44_100, 2, SampleFormat::F32).unwrap();
        let error = MediaError::from(RenderError::FormatMismatch { expected, actual });
        assert_eq!(
            error.to_string(),
            "Render error: Format mismatch: expected 48000Hz 2ch f32, got 44100Hz 2ch f32"
        );
    }
}
