//! Decoded audio buffers handed to a renderer

use crate::descriptor::{AudioDescriptor, SampleFormat};
use crate::error::{MediaError, MediaResult};
use std::sync::Arc;
use std::time::Duration;

/// Interleaved samples in one of the supported representations
#[derive(Debug, Clone, PartialEq)]
pub enum SampleData {
    /// 8-bit unsigned samples
    U8(Vec<u8>),
    /// 16-bit signed samples
    I16(Vec<i16>),
    /// 32-bit signed samples
    I32(Vec<i32>),
    /// 32-bit float samples
    F32(Vec<f32>),
    /// 64-bit float samples
    F64(Vec<f64>),
}

impl SampleData {
    /// Representation of the contained samples
    pub fn format(&self) -> SampleFormat {
        match self {
            SampleData::U8(_) => SampleFormat::U8,
            SampleData::I16(_) => SampleFormat::I16,
            SampleData::I32(_) => SampleFormat::I32,
            SampleData::F32(_) => SampleFormat::F32,
            SampleData::F64(_) => SampleFormat::F64,
        }
    }

    /// Number of samples across all channels
    pub fn len(&self) -> usize {
        match self {
            SampleData::U8(s) => s.len(),
            SampleData::I16(s) => s.len(),
            SampleData::I32(s) => s.len(),
            SampleData::F32(s) => s.len(),
            SampleData::F64(s) => s.len(),
        }
    }

    /// Whether there are no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A block of decoded audio in presentation order.
///
/// The samples are shared, so cloning a buffer does not copy audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    descriptor: AudioDescriptor,
    data: Arc<SampleData>,
    pts: Duration,
}

impl AudioBuffer {
    /// Wrap decoded samples.
    ///
    /// The sample representation must match `descriptor.format()` and the sample
    /// count must be a whole number of frames.
    pub fn new(descriptor: AudioDescriptor, data: SampleData, pts: Duration) -> MediaResult<Self> {
        if data.format() != descriptor.format() {
            return Err(MediaError::invalid_argument(format!(
                "buffer holds {} samples but descriptor declares {}",
                data.format(),
                descriptor.format()
            )));
        }
        if data.len() % descriptor.channels() as usize != 0 {
            return Err(MediaError::invalid_argument(format!(
                "{} samples is not a whole number of {}-channel frames",
                data.len(),
                descriptor.channels()
            )));
        }
        Ok(Self {
            descriptor,
            data: Arc::new(data),
            pts,
        })
    }

    /// Format of this buffer
    pub fn descriptor(&self) -> &AudioDescriptor {
        &self.descriptor
    }

    /// Sample payload
    pub fn data(&self) -> &SampleData {
        &self.data
    }

    /// Presentation timestamp of the first frame
    pub fn pts(&self) -> Duration {
        self.pts
    }

    /// Number of frames
    pub fn frames(&self) -> usize {
        self.data.len() / self.descriptor.channels() as usize
    }

    /// Playback length
    pub fn duration(&self) -> Duration {
        self.descriptor.frames_to_duration(self.frames())
    }
}

/// Sample types a renderer can write to an output.
///
/// Implemented for every [`SampleFormat`]; gain is applied around the type's
/// equilibrium so unsigned samples stay centred.
pub trait RenderSample: cpal::SizedSample + Send + 'static {
    /// Silence value
    const SILENCE: Self;

    /// Borrow the samples of `data` if they are of this type
    fn samples(data: &SampleData) -> Option<&[Self]>;

    /// Scale by `gain` in [0.0, 1.0]
    fn apply_gain(self, gain: f64) -> Self;
}

macro_rules! impl_render_sample_signed {
    ($ty:ty, $variant:ident) => {
        impl RenderSample for $ty {
            const SILENCE: Self = 0;

            fn samples(data: &SampleData) -> Option<&[Self]> {
                match data {
                    SampleData::$variant(samples) => Some(samples),
                    _ => None,
                }
            }

            fn apply_gain(self, gain: f64) -> Self {
                (self as f64 * gain).round() as $ty
            }
        }
    };
}

macro_rules! impl_render_sample_float {
    ($ty:ty, $variant:ident) => {
        impl RenderSample for $ty {
            const SILENCE: Self = 0.0;

            fn samples(data: &SampleData) -> Option<&[Self]> {
                match data {
                    SampleData::$variant(samples) => Some(samples),
                    _ => None,
                }
            }

            fn apply_gain(self, gain: f64) -> Self {
                self * gain as $ty
            }
        }
    };
}

impl_render_sample_signed!(i16, I16);
impl_render_sample_signed!(i32, I32);
impl_render_sample_float!(f32, F32);
impl_render_sample_float!(f64, F64);

impl RenderSample for u8 {
    const SILENCE: Self = 128;

    fn samples(data: &SampleData) -> Option<&[Self]> {
        match data {
            SampleData::U8(samples) => Some(samples),
            _ => None,
        }
    }

    fn apply_gain(self, gain: f64) -> Self {
        let centred = self as f64 - 128.0;
        (centred * gain + 128.0).round().clamp(0.0, 255.0) as u8
    }
}
