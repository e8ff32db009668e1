//! Audio format descriptors used on both sides of output negotiation

use crate::error::{MediaError, MediaResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Sample representation: bit depth plus signed/unsigned/float encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// 8-bit unsigned integer, equilibrium at 128
    U8,
    /// 16-bit signed integer
    I16,
    /// 32-bit signed integer
    I32,
    /// 32-bit IEEE float in [-1.0, 1.0]
    F32,
    /// 64-bit IEEE float in [-1.0, 1.0]
    F64,
}

impl SampleFormat {
    /// Bits per sample
    pub fn bit_depth(&self) -> u16 {
        match self {
            SampleFormat::U8 => 8,
            SampleFormat::I16 => 16,
            SampleFormat::I32 | SampleFormat::F32 => 32,
            SampleFormat::F64 => 64,
        }
    }

    /// Bytes per sample
    pub fn bytes_per_sample(&self) -> usize {
        self.bit_depth() as usize / 8
    }

    /// Whether samples are floating point
    pub fn is_float(&self) -> bool {
        matches!(self, SampleFormat::F32 | SampleFormat::F64)
    }

    /// Whether samples are signed (floats are signed)
    pub fn is_signed(&self) -> bool {
        !matches!(self, SampleFormat::U8)
    }

    /// Map a cpal sample format onto ours, if representable
    pub fn from_cpal(format: cpal::SampleFormat) -> Option<Self> {
        match format {
            cpal::SampleFormat::U8 => Some(SampleFormat::U8),
            cpal::SampleFormat::I16 => Some(SampleFormat::I16),
            cpal::SampleFormat::I32 => Some(SampleFormat::I32),
            cpal::SampleFormat::F32 => Some(SampleFormat::F32),
            cpal::SampleFormat::F64 => Some(SampleFormat::F64),
            _ => None,
        }
    }

    /// The equivalent cpal sample format
    pub fn to_cpal(&self) -> cpal::SampleFormat {
        match self {
            SampleFormat::U8 => cpal::SampleFormat::U8,
            SampleFormat::I16 => cpal::SampleFormat::I16,
            SampleFormat::I32 => cpal::SampleFormat::I32,
            SampleFormat::F32 => cpal::SampleFormat::F32,
            SampleFormat::F64 => cpal::SampleFormat::F64,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleFormat::U8 => write!(f, "u8"),
            SampleFormat::I16 => write!(f, "i16"),
            SampleFormat::I32 => write!(f, "i32"),
            SampleFormat::F32 => write!(f, "f32"),
            SampleFormat::F64 => write!(f, "f64"),
        }
    }
}

/// Speaker layout derived from a channel count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    /// 1 channel
    Mono,
    /// 2 channels
    Stereo,
    /// 6 channels (5.1)
    Surround51,
    /// 8 channels (7.1)
    Surround71,
    /// Any other channel count, no speaker assignment
    Discrete(u16),
}

impl ChannelLayout {
    /// Layout for a given channel count
    pub fn from_channels(channels: u16) -> Self {
        match channels {
            1 => ChannelLayout::Mono,
            2 => ChannelLayout::Stereo,
            6 => ChannelLayout::Surround51,
            8 => ChannelLayout::Surround71,
            n => ChannelLayout::Discrete(n),
        }
    }

    /// Number of channels in this layout
    pub fn channel_count(&self) -> u16 {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
            ChannelLayout::Surround51 => 6,
            ChannelLayout::Surround71 => 8,
            ChannelLayout::Discrete(n) => *n,
        }
    }
}

/// Immutable description of an interleaved PCM audio format.
///
/// Two descriptors are compatible only when every attribute matches; there is no
/// partial matching. Construct with [`AudioDescriptor::new`] so the rate and channel
/// count are validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDescriptor", into = "RawDescriptor")]
pub struct AudioDescriptor {
    sample_rate: u32,
    channels: u16,
    format: SampleFormat,
}

impl AudioDescriptor {
    /// Create a descriptor, rejecting a zero sample rate or channel count
    pub fn new(sample_rate: u32, channels: u16, format: SampleFormat) -> MediaResult<Self> {
        if sample_rate == 0 {
            return Err(MediaError::invalid_argument(
                "sample rate must be a positive number of Hz",
            ));
        }
        if channels == 0 {
            return Err(MediaError::invalid_argument(
                "channel count must be at least 1",
            ));
        }
        Ok(Self {
            sample_rate,
            channels,
            format,
        })
    }

    /// Build a descriptor from a cpal stream configuration
    pub fn from_cpal(config: &cpal::SupportedStreamConfig) -> MediaResult<Self> {
        let format = SampleFormat::from_cpal(config.sample_format()).ok_or_else(|| {
            MediaError::invalid_argument(format!(
                "unsupported device sample format: {:?}",
                config.sample_format()
            ))
        })?;
        Self::new(config.sample_rate().0, config.channels(), format)
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Speaker layout implied by the channel count
    pub fn layout(&self) -> ChannelLayout {
        ChannelLayout::from_channels(self.channels)
    }

    /// Sample representation
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Bytes for one sample of one channel
    pub fn bytes_per_sample(&self) -> usize {
        self.format.bytes_per_sample()
    }

    /// Bytes for one frame (one sample of every channel)
    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    /// Exact compatibility check
    pub fn is_compatible(&self, other: &AudioDescriptor) -> bool {
        self == other
    }

    /// Playback duration of `frames` frames
    pub fn frames_to_duration(&self, frames: usize) -> Duration {
        let nanos = frames as u128 * 1_000_000_000 / self.sample_rate as u128;
        Duration::from_nanos(nanos as u64)
    }

    /// Number of whole frames that fit in `duration`
    pub fn duration_to_frames(&self, duration: Duration) -> usize {
        (duration.as_nanos() * self.sample_rate as u128 / 1_000_000_000) as usize
    }

    /// cpal stream configuration for this descriptor
    pub fn stream_config(&self, buffer_size: Option<u32>) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels: self.channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: match buffer_size {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        }
    }
}

impl fmt::Display for AudioDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz {}ch {}", self.sample_rate, self.channels, self.format)
    }
}

#[derive(Serialize, Deserialize)]
struct RawDescriptor {
    sample_rate: u32,
    channels: u16,
    format: SampleFormat,
}

impl TryFrom<RawDescriptor> for AudioDescriptor {
    type Error = MediaError;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        AudioDescriptor::new(raw.sample_rate, raw.channels, raw.format)
    }
}

impl From<AudioDescriptor> for RawDescriptor {
    fn from(descriptor: AudioDescriptor) -> Self {
        RawDescriptor {
            sample_rate: descriptor.sample_rate,
            channels: descriptor.channels,
            format: descriptor.format,
        }
    }
}
