//! Configuration types and defaults

use crate::error::TimbreError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use timbre_media::{AudioDescriptor, AudioRenderConfig};

/// Where rendered audio goes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "backend")]
pub enum OutputBackend {
    /// System output device through cpal
    #[default]
    Cpal,
    /// Software-clocked output with a fixed route (`None` = no audio route)
    Virtual {
        /// Descriptor the virtual route accepts
        descriptor: Option<AudioDescriptor>,
    },
}

/// Global Timbre configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimbreConfig {
    /// Enable debug logging
    pub debug_logging: bool,
    /// Maximum number of tracks per asset (None for unlimited)
    pub max_tracks_per_asset: Option<usize>,
    /// Output backend for new renderers
    pub output: OutputBackend,
    /// Renderer settings
    pub audio: AudioRenderConfig,
    /// Render monitor sampling interval in milliseconds
    pub monitor_interval_ms: u64,
    /// Feeder retry delay while the render queue is full, in milliseconds
    pub feeder_retry_ms: u64,
}

impl Default for TimbreConfig {
    fn default() -> Self {
        Self {
            debug_logging: false,
            max_tracks_per_asset: None,
            output: OutputBackend::Cpal,
            audio: AudioRenderConfig::default(),
            monitor_interval_ms: 1_000,
            feeder_retry_ms: 5,
        }
    }
}

impl TimbreConfig {
    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, TimbreError> {
        let config: Self = serde_json::from_str(json).map_err(|e| TimbreError::Configuration {
            reason: format!("Invalid configuration JSON: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, TimbreError> {
        serde_json::to_string_pretty(self).map_err(|e| TimbreError::Configuration {
            reason: format!("Failed to serialize configuration: {}", e),
        })
    }

    /// Check values no component can run with
    pub fn validate(&self) -> Result<(), TimbreError> {
        self.audio
            .validate()
            .map_err(|e| TimbreError::Configuration {
                reason: e.to_string(),
            })?;
        if self.max_tracks_per_asset == Some(0) {
            return Err(TimbreError::Configuration {
                reason: "max_tracks_per_asset must be at least 1".to_string(),
            });
        }
        if self.monitor_interval_ms == 0 {
            return Err(TimbreError::Configuration {
                reason: "monitor_interval_ms must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Render monitor sampling interval
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    /// Feeder retry delay
    pub fn feeder_retry(&self) -> Duration {
        Duration::from_millis(self.feeder_retry_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timbre_media::{BackpressurePolicy, SampleFormat};

    #[test]
    fn test_defaults_from_empty_json() {
        let config = TimbreConfig::from_json("{}").unwrap();
        assert_eq!(config, TimbreConfig::default());
    }

    #[test]
    fn test_virtual_backend_json() {
        let config = TimbreConfig::from_json(
            r#"{
                "max_tracks_per_asset": 16,
                "output": {
                    "backend": "virtual",
                    "descriptor": { "sample_rate": 44100, "channels": 2, "format": "i16" }
                },
                "audio": {
                    "max_pending_buffers": 4,
                    "backpressure": { "policy": "block", "timeout_ms": 50 }
                }
            }"#,
        )
        .unwrap();

        let expected = AudioDescriptor::new(44_100, 2, SampleFormat::I16).unwrap();
        assert_eq!(
            config.output,
            OutputBackend::Virtual {
                descriptor: Some(expected)
            }
        );
        assert_eq!(config.max_tracks_per_asset, Some(16));
        assert_eq!(config.audio.max_pending_buffers, 4);
        assert_eq!(
            config.audio.backpressure,
            BackpressurePolicy::Block { timeout_ms: 50 }
        );
        assert_eq!(config.audio.initial_volume, 1.0);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = TimbreConfig::from_json(r#"{ "audio": { "max_pending_buffers": 0 } }"#)
            .unwrap_err();
        assert!(matches!(err, TimbreError::Configuration { .. }));

        let err = TimbreConfig::from_json(
            r#"{ "output": { "backend": "virtual", "descriptor": { "sample_rate": 0, "channels": 2, "format": "f32" } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, TimbreError::Configuration { .. }));

        assert!(TimbreConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = TimbreConfig {
            debug_logging: true,
            output: OutputBackend::Virtual { descriptor: None },
            ..Default::default()
        };
        let parsed = TimbreConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
