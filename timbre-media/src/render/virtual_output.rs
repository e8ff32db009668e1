//! Device-less renderer
//!
//! [`VirtualAudioRenderer`] behaves like a device renderer but its "device" is an
//! audio route the caller controls, and its output periods are pulled either by
//! the caller through [`VirtualAudioRenderer::render_into`] or by a tokio interval
//! started with [`VirtualAudioRenderer::spawn_clock`]. It backs headless hosts and
//! tests.

use super::session::{RenderCursor, RenderSession};
use super::{
    AudioRenderConfig, AudioRenderStats, AudioRenderer, BackpressurePolicy, RenderError,
    VolumeControl,
};
use crate::descriptor::{AudioDescriptor, SampleFormat};
use crate::frames::{AudioBuffer, RenderSample};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Renderer whose output is pulled in software
pub struct VirtualAudioRenderer {
    route: Mutex<Option<AudioDescriptor>>,
    session: RenderSession,
    cursor: Mutex<RenderCursor>,
    clock: Mutex<Option<JoinHandle<()>>>,
}

impl VirtualAudioRenderer {
    /// Create a renderer whose output route accepts `route`
    pub fn new(route: AudioDescriptor, config: AudioRenderConfig) -> Self {
        Self::with_route(Some(route), config)
    }

    /// Create a renderer with an optional route; `None` means no audio route
    pub fn with_route(route: Option<AudioDescriptor>, config: AudioRenderConfig) -> Self {
        match route {
            Some(descriptor) => info!("🎧 Creating virtual audio renderer ({})", descriptor),
            None => info!("🎧 Creating virtual audio renderer without a route"),
        }
        Self {
            route: Mutex::new(route),
            session: RenderSession::new(&config),
            cursor: Mutex::new(RenderCursor::default()),
            clock: Mutex::new(None),
        }
    }

    /// Replace the output route, as when the system default device changes.
    ///
    /// A session that is already negotiated keeps its descriptor.
    pub fn set_route(&self, route: Option<AudioDescriptor>) {
        *self.route.lock() = route;
    }

    /// Render one output period into `out`.
    ///
    /// `T` must be the negotiated sample type for audio to come through; anything
    /// not covered by queued buffers is silence. Returns the number of samples
    /// taken from submitted buffers.
    pub fn render_into<T: RenderSample>(&self, out: &mut [T]) -> usize {
        let mut cursor = self.cursor.lock();
        self.session.fill(&mut cursor, out)
    }

    /// Drive output from a tokio interval, one period every `period`.
    ///
    /// Requires a negotiated session and a running tokio runtime. The clock stops
    /// on teardown.
    pub fn spawn_clock(self: &Arc<Self>, period: Duration) -> Result<(), RenderError> {
        let descriptor = self.session.descriptor().ok_or(RenderError::NotNegotiated)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| RenderError::Stream {
            reason: format!("No tokio runtime for the render clock: {}", e),
        })?;

        let frames = descriptor.duration_to_frames(period).max(1);
        let samples = frames * descriptor.channels() as usize;
        let renderer = Arc::downgrade(self);

        let task = runtime.spawn(async move {
            match descriptor.format() {
                SampleFormat::U8 => run_clock::<u8>(renderer, period, samples).await,
                SampleFormat::I16 => run_clock::<i16>(renderer, period, samples).await,
                SampleFormat::I32 => run_clock::<i32>(renderer, period, samples).await,
                SampleFormat::F32 => run_clock::<f32>(renderer, period, samples).await,
                SampleFormat::F64 => run_clock::<f64>(renderer, period, samples).await,
            }
        });

        if let Some(previous) = self.clock.lock().replace(task) {
            previous.abort();
        }
        debug!("⏱️ Virtual render clock started ({:?} per period)", period);
        Ok(())
    }
}

/// Pull one period per tick until the renderer is torn down or dropped
async fn run_clock<T: RenderSample>(
    renderer: Weak<VirtualAudioRenderer>,
    period: Duration,
    samples: usize,
) {
    let mut scratch = vec![T::SILENCE; samples];
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(renderer) = renderer.upgrade() else {
            break;
        };
        if renderer.session.is_torn_down() {
            break;
        }
        renderer.render_into(&mut scratch);
    }
}

impl AudioRenderer for VirtualAudioRenderer {
    fn supported_descriptor(&self) -> Result<AudioDescriptor, RenderError> {
        if self.session.is_torn_down() {
            return Err(RenderError::TornDown);
        }
        (*self.route.lock()).ok_or_else(|| RenderError::DeviceUnavailable {
            reason: "No audio route".to_string(),
        })
    }

    fn negotiate(&self, descriptor: &AudioDescriptor) -> Result<(), RenderError> {
        self.session.check_idle()?;
        let supported = self.supported_descriptor()?;
        self.session.check_negotiable(&supported, descriptor)?;
        self.session.commit(*descriptor)?;

        info!("✅ Negotiated virtual audio output {}", descriptor);
        Ok(())
    }

    fn descriptor(&self) -> Option<AudioDescriptor> {
        self.session.descriptor()
    }

    fn submit(&self, buffer: AudioBuffer) -> Result<(), RenderError> {
        self.session.submit(buffer)
    }

    fn has_capacity(&self) -> bool {
        self.session.has_capacity()
    }

    fn backpressure(&self) -> BackpressurePolicy {
        self.session.policy()
    }

    fn volume(&self) -> f64 {
        self.session.volume().get()
    }

    fn set_volume(&self, volume: f64) {
        self.session.volume().set(volume);
    }

    fn volume_control(&self) -> VolumeControl {
        self.session.volume().clone()
    }

    fn stats(&self) -> AudioRenderStats {
        self.session.stats()
    }

    fn is_rendering(&self) -> bool {
        self.session.is_rendering()
    }

    fn teardown(&self) -> Result<(), RenderError> {
        if self.session.is_torn_down() {
            return Err(RenderError::TornDown);
        }
        if let Some(clock) = self.clock.lock().take() {
            clock.abort();
        }
        let discarded = self.session.close();

        info!("🛑 Virtual renderer torn down ({} pending buffers discarded)", discarded);
        Ok(())
    }
}

impl Drop for VirtualAudioRenderer {
    fn drop(&mut self) {
        if let Some(clock) = self.clock.get_mut().take() {
            clock.abort();
        }
    }
}
