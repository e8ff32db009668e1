//! # Timbre Media
//!
//! Track composition and audio output for Timbre.
//! This crate holds the mutable multi-track asset model, audio format
//! descriptors and the audio renderers with their negotiation, volume and
//! backpressure rules.

#![warn(clippy::all)]

pub mod asset;
pub mod descriptor;
pub mod error;
pub mod frames;
pub mod render;
pub mod tracks;

// Re-export main types
pub use asset::{MutableAsset, TrackSnapshot};
pub use descriptor::{AudioDescriptor, ChannelLayout, SampleFormat};
pub use error::{ErrorCategory, MediaError, MediaResult};
pub use frames::{AudioBuffer, RenderSample, SampleData};
pub use render::{
    spawn_feeder, AudioOutputDevice, AudioRenderConfig, AudioRenderStats, AudioRenderer,
    BackpressurePolicy, CpalAudioRenderer, FeederSummary, RenderError, VirtualAudioRenderer,
    VolumeControl,
};
pub use tracks::{MediaType, Segment, TimeRange, Track, TrackId};
