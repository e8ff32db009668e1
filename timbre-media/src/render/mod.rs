//! Audio rendering
//!
//! This module defines the renderer contract and its two outputs: a cpal-backed
//! device renderer and a device-less virtual renderer that is clocked by the
//! caller or by a tokio interval.
//!
//! Every renderer follows the same session lifecycle:
//!
//! 1. [`AudioRenderer::supported_descriptor`] reports the single format the output
//!    accepts, or [`RenderError::DeviceUnavailable`] when there is no audio route.
//! 2. [`AudioRenderer::negotiate`] fixes that format for the rest of the session and
//!    starts output. There is no in-place renegotiation; build a new renderer for a
//!    new format.
//! 3. [`AudioRenderer::submit`] queues decoded buffers. The queue is bounded and
//!    [`BackpressurePolicy`] decides what happens when it is full.
//! 4. [`AudioRenderer::teardown`] stops output, discards pending buffers and makes the
//!    renderer terminal.
//!
//! Volume lives in a [`VolumeControl`] cell that the render path reads once per
//! output period, so gain changes never wait on the buffer queue.

mod cpal_output;
mod feeder;
mod session;
mod virtual_output;
mod volume;

pub use cpal_output::CpalAudioRenderer;
pub use feeder::{spawn_feeder, FeederSummary};
pub use virtual_output::VirtualAudioRenderer;
pub use volume::VolumeControl;

use crate::descriptor::AudioDescriptor;
use crate::frames::AudioBuffer;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during rendering
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// No output device or audio route is available
    #[error("Audio device unavailable: {reason}")]
    DeviceUnavailable {
        /// Why no output is possible
        reason: String,
    },

    /// Descriptor does not exactly match the negotiated or supported one
    #[error("Format mismatch: expected {expected}, got {actual}")]
    FormatMismatch {
        /// Descriptor the renderer accepts
        expected: AudioDescriptor,
        /// Descriptor that was offered
        actual: AudioDescriptor,
    },

    /// Buffer submitted before a descriptor was negotiated
    #[error("No audio descriptor has been negotiated")]
    NotNegotiated,

    /// Negotiation attempted on a renderer that already has a descriptor
    #[error("Audio descriptor already negotiated for this session")]
    AlreadyNegotiated,

    /// Renderer has been torn down
    #[error("Renderer has been torn down")]
    TornDown,

    /// Pending-buffer queue is full
    #[error("Render queue full: {pending}/{capacity} buffers pending")]
    Backpressure {
        /// Buffers currently queued
        pending: usize,
        /// Queue capacity
        capacity: usize,
    },

    /// Output stream could not be built, started or stopped
    #[error("Render stream error: {reason}")]
    Stream {
        /// Reason for the stream error
        reason: String,
    },

    /// Buffer is structurally unusable
    #[error("Invalid buffer: {reason}")]
    InvalidBuffer {
        /// Why the buffer was refused
        reason: String,
    },
}

impl RenderError {
    /// Check if the caller may retry the same operation later
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RenderError::Backpressure { .. })
    }
}

/// What `submit` does when the pending-buffer queue is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum BackpressurePolicy {
    /// Refuse the new buffer with [`RenderError::Backpressure`]
    #[default]
    Reject,
    /// Discard the oldest pending buffer to make room
    DropOldest,
    /// Wait for the render side to drain, up to `timeout_ms`
    Block {
        /// Maximum wait in milliseconds
        timeout_ms: u64,
    },
}

impl BackpressurePolicy {
    /// Wait bound for [`BackpressurePolicy::Block`]
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            BackpressurePolicy::Block { timeout_ms } => Some(Duration::from_millis(*timeout_ms)),
            _ => None,
        }
    }
}

/// Audio rendering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioRenderConfig {
    /// Device name (None for default device)
    pub device_name: Option<String>,

    /// Maximum number of buffers waiting to be rendered
    pub max_pending_buffers: usize,

    /// Queue-full behaviour
    pub backpressure: BackpressurePolicy,

    /// Volume at session start (clamped to 0.0..=1.0)
    pub initial_volume: f64,

    /// Frames per output callback (None for the device default)
    pub buffer_size: Option<u32>,
}

impl Default for AudioRenderConfig {
    fn default() -> Self {
        Self {
            device_name: None,
            max_pending_buffers: 8,
            backpressure: BackpressurePolicy::Reject,
            initial_volume: 1.0,
            buffer_size: None,
        }
    }
}

impl AudioRenderConfig {
    /// Reject configurations no renderer can run with
    pub fn validate(&self) -> crate::MediaResult<()> {
        if self.max_pending_buffers == 0 {
            return Err(crate::MediaError::invalid_argument(
                "max_pending_buffers must be at least 1",
            ));
        }
        if self.buffer_size == Some(0) {
            return Err(crate::MediaError::invalid_argument(
                "buffer_size must be at least 1 frame",
            ));
        }
        Ok(())
    }
}

/// Audio output device information
#[derive(Debug, Clone)]
pub struct AudioOutputDevice {
    /// Human-readable device name
    pub name: String,

    /// Whether this is the default device
    pub is_default: bool,

    /// Descriptor the device would negotiate, if its default format is supported
    pub descriptor: Option<AudioDescriptor>,
}

/// Audio rendering statistics
#[derive(Debug, Clone, PartialEq)]
pub struct AudioRenderStats {
    /// Negotiated descriptor, if any
    pub descriptor: Option<AudioDescriptor>,

    /// Buffers accepted by `submit`
    pub buffers_submitted: u64,

    /// Buffers discarded by the drop-oldest policy or by teardown
    pub buffers_dropped: u64,

    /// Submissions refused with backpressure
    pub buffers_rejected: u64,

    /// Frames written to the output
    pub frames_rendered: u64,

    /// Output periods that had to be padded with silence
    pub underruns: u64,

    /// Output stream errors reported by the device
    pub stream_errors: u64,

    /// Buffers currently queued
    pub pending_buffers: usize,

    /// Queue capacity
    pub capacity: usize,

    /// Playback time currently queued
    pub queued_duration: Duration,

    /// Current volume
    pub volume: f64,

    /// Whether audio is currently being rendered
    pub is_rendering: bool,
}

impl AudioRenderStats {
    /// Queue fill level (0.0 to 1.0)
    pub fn buffer_level(&self) -> f32 {
        if self.capacity == 0 {
            0.0
        } else {
            self.pending_buffers as f32 / self.capacity as f32
        }
    }
}

/// Trait for audio rendering implementations.
///
/// All methods take `&self` so one renderer can be shared between the decode
/// side, the control surface and diagnostics behind an `Arc`.
pub trait AudioRenderer: Send + Sync {
    /// The single descriptor this renderer accepts for its current output
    fn supported_descriptor(&self) -> Result<AudioDescriptor, RenderError>;

    /// Fix the session descriptor and start output.
    ///
    /// `descriptor` must equal [`AudioRenderer::supported_descriptor`] exactly.
    fn negotiate(&self, descriptor: &AudioDescriptor) -> Result<(), RenderError>;

    /// Negotiated descriptor, if any
    fn descriptor(&self) -> Option<AudioDescriptor>;

    /// Queue a decoded buffer for playback
    fn submit(&self, buffer: AudioBuffer) -> Result<(), RenderError>;

    /// Whether `submit` would currently find room in the queue
    fn has_capacity(&self) -> bool;

    /// What `submit` does when the queue is full
    fn backpressure(&self) -> BackpressurePolicy;

    /// Last volume set
    fn volume(&self) -> f64;

    /// Set volume; out-of-range values are clamped to 0.0..=1.0
    fn set_volume(&self, volume: f64);

    /// Shareable handle to the volume cell
    fn volume_control(&self) -> VolumeControl;

    /// Get current rendering statistics
    fn stats(&self) -> AudioRenderStats;

    /// Check if currently rendering
    fn is_rendering(&self) -> bool;

    /// Stop output, discard pending buffers and end the session
    fn teardown(&self) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_config_default() {
        let config = AudioRenderConfig::default();

        assert_eq!(config.max_pending_buffers, 8);
        assert_eq!(config.backpressure, BackpressurePolicy::Reject);
        assert_eq!(config.initial_volume, 1.0);
        assert!(config.device_name.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_render_config_validation() {
        let config = AudioRenderConfig {
            max_pending_buffers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_timeout() {
        assert_eq!(BackpressurePolicy::Reject.timeout(), None);
        assert_eq!(
            BackpressurePolicy::Block { timeout_ms: 25 }.timeout(),
            Some(Duration::from_millis(25))
        );
    }

    #[test]
    fn test_policy_json() {
        let policy: BackpressurePolicy =
            serde_json::from_str(r#"{ "policy": "drop_oldest" }"#).unwrap();
        assert_eq!(policy, BackpressurePolicy::DropOldest);

        let json = serde_json::to_string(&BackpressurePolicy::Block { timeout_ms: 10 }).unwrap();
        assert_eq!(json, r#"{"policy":"block","timeout_ms":10}"#);
    }

    #[test]
    fn test_buffer_level() {
        let stats = AudioRenderStats {
            descriptor: None,
            buffers_submitted: 0,
            buffers_dropped: 0,
            buffers_rejected: 0,
            frames_rendered: 0,
            underruns: 0,
            stream_errors: 0,
            pending_buffers: 2,
            capacity: 8,
            queued_duration: Duration::ZERO,
            volume: 1.0,
            is_rendering: false,
        };
        assert_eq!(stats.buffer_level(), 0.25);
    }
}
