//! # Timbre - Composition and Audio Output for Media Playback
//!
//! Timbre is the composition and audio-output core of a media playback engine.
//! It keeps an editable multi-track asset that schedulers read through
//! immutable snapshots, and renders decoded audio to a system device or a
//! software-clocked virtual output.
//!
//! ## Key Features
//!
//! - **Snapshot Reads**: Track lists are published as immutable copies, so readers never lock
//! - **Single-Format Negotiation**: A renderer accepts exactly one descriptor per session
//! - **Lock-Free Volume**: Gain changes are a single atomic store
//! - **Explicit Backpressure**: Reject, drop-oldest or bounded blocking when the queue is full
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use timbre::{MediaType, Timbre};
//!
//! fn main() -> Result<(), timbre::TimbreError> {
//!     let timbre = Timbre::init()?;
//!
//!     let asset = timbre.new_asset();
//!     asset.add_track(MediaType::Audio)?;
//!     asset.add_track("video")?;
//!
//!     let renderer = timbre.open_renderer()?;
//!     let descriptor = renderer.supported_descriptor()?;
//!     renderer.negotiate(&descriptor)?;
//!
//!     let (tx, rx) = tokio::sync::mpsc::channel(8);
//!     let feeder = timbre.spawn_feeder(renderer.clone(), rx);
//!     // hand `tx` to the decoder, then:
//!     drop(tx);
//!     let summary = timbre.block_on(feeder);
//!     println!("{:?}", summary);
//!
//!     renderer.set_volume(0.8);
//!     renderer.teardown()?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export media types for easy access
pub use timbre_media::{
    AudioBuffer, AudioDescriptor, AudioOutputDevice, AudioRenderConfig, AudioRenderStats,
    AudioRenderer, BackpressurePolicy, ChannelLayout, CpalAudioRenderer, ErrorCategory,
    FeederSummary, MediaError, MediaResult, MediaType, MutableAsset, RenderError, SampleData,
    SampleFormat, Segment, TimeRange, Track, TrackId, TrackSnapshot, VirtualAudioRenderer,
    VolumeControl,
};

#[cfg(feature = "diagnostics")]
pub use timbre_diagnostics::{DebugLogger, DiagnosticsError, RenderHealth, RenderMonitor};

// Public API modules
pub mod config;
pub mod error;

pub use config::{OutputBackend, TimbreConfig};
pub use error::TimbreError;

use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main entry point for Timbre
#[derive(Debug, Clone)]
pub struct Timbre {
    inner: Arc<TimbreInner>,
}

#[derive(Debug)]
struct TimbreInner {
    runtime: tokio::runtime::Runtime,
    config: TimbreConfig,
}

impl Timbre {
    /// Initialize Timbre with default settings
    ///
    /// # Example
    /// ```rust,no_run
    /// use timbre::Timbre;
    ///
    /// let timbre = Timbre::init()?;
    /// # Ok::<(), timbre::TimbreError>(())
    /// ```
    pub fn init() -> Result<Self, TimbreError> {
        Self::init_with(TimbreConfig::default())
    }

    /// Initialize with custom configuration
    pub fn init_with(config: TimbreConfig) -> Result<Self, TimbreError> {
        config.validate()?;
        if config.debug_logging {
            init_debug_logging()?;
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("timbre-runtime")
            .enable_all()
            .build()
            .map_err(|e| TimbreError::Initialization {
                reason: format!("Failed to create async runtime: {}", e),
            })?;

        info!("🚀 Timbre initialized (output: {:?})", config.output);
        Ok(Self {
            inner: Arc::new(TimbreInner { runtime, config }),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &TimbreConfig {
        &self.inner.config
    }

    /// Handle to the engine runtime
    pub fn handle(&self) -> tokio::runtime::Handle {
        self.inner.runtime.handle().clone()
    }

    /// Run a future to completion on the engine runtime.
    ///
    /// Must not be called from inside an async context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.inner.runtime.block_on(future)
    }

    /// Create an empty asset using the configured track limit
    pub fn new_asset(&self) -> MutableAsset {
        MutableAsset::with_track_limit(self.inner.config.max_tracks_per_asset)
    }

    /// Create a renderer for the configured output backend
    pub fn open_renderer(&self) -> Result<Arc<dyn AudioRenderer>, TimbreError> {
        let audio = self.inner.config.audio.clone();
        Ok(match &self.inner.config.output {
            OutputBackend::Cpal => Arc::new(CpalAudioRenderer::new(audio)),
            OutputBackend::Virtual { descriptor } => {
                Arc::new(VirtualAudioRenderer::with_route(*descriptor, audio))
            }
        })
    }

    /// Create a virtual renderer on `route`, regardless of the configured backend.
    ///
    /// `None` gives a renderer with no audio route. Only the audio settings come
    /// from the configuration.
    pub fn open_virtual_renderer(
        &self,
        route: Option<AudioDescriptor>,
    ) -> Arc<VirtualAudioRenderer> {
        Arc::new(VirtualAudioRenderer::with_route(
            route,
            self.inner.config.audio.clone(),
        ))
    }

    /// Drain `buffers` into `renderer` on the engine runtime
    pub fn spawn_feeder(
        &self,
        renderer: Arc<dyn AudioRenderer>,
        buffers: mpsc::Receiver<AudioBuffer>,
    ) -> JoinHandle<Result<FeederSummary, RenderError>> {
        let _guard = self.inner.runtime.enter();
        timbre_media::spawn_feeder(renderer, buffers, self.inner.config.feeder_retry())
    }

    /// Start a render monitor on the engine runtime
    #[cfg(feature = "diagnostics")]
    pub fn spawn_monitor(
        &self,
        renderer: Arc<dyn AudioRenderer>,
    ) -> Result<JoinHandle<RenderHealth>, TimbreError> {
        let _guard = self.inner.runtime.enter();
        let monitor = RenderMonitor::new(renderer, self.inner.config.monitor_interval());
        monitor.spawn().map_err(TimbreError::from)
    }
}

#[cfg(feature = "diagnostics")]
fn init_debug_logging() -> Result<(), TimbreError> {
    DebugLogger::init_logging("debug")?;
    Ok(())
}

#[cfg(not(feature = "diagnostics"))]
fn init_debug_logging() -> Result<(), TimbreError> {
    Ok(())
}
