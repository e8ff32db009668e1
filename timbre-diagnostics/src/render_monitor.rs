//! Periodic render health reporting

use crate::error::DiagnosticsError;
use std::sync::Arc;
use std::time::Duration;
use timbre_media::{AudioRenderStats, AudioRenderer};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Change in renderer state between two observations
#[derive(Debug, Clone, PartialEq)]
pub struct RenderHealth {
    /// Stats at the time of observation
    pub stats: AudioRenderStats,
    /// Underruns since the previous observation
    pub new_underruns: u64,
    /// Stream errors since the previous observation
    pub new_stream_errors: u64,
    /// Buffers dropped since the previous observation
    pub new_drops: u64,
    /// Frames rendered since the previous observation
    pub frames_rendered: u64,
}

impl RenderHealth {
    /// No underruns, stream errors or drops since the previous observation
    pub fn is_healthy(&self) -> bool {
        self.new_underruns == 0 && self.new_stream_errors == 0 && self.new_drops == 0
    }
}

/// Samples a renderer's stats and logs what changed
pub struct RenderMonitor {
    renderer: Arc<dyn AudioRenderer>,
    interval: Duration,
    last: Option<AudioRenderStats>,
}

impl RenderMonitor {
    /// Create a monitor sampling `renderer` every `interval`
    pub fn new(renderer: Arc<dyn AudioRenderer>, interval: Duration) -> Self {
        Self {
            renderer,
            interval,
            last: None,
        }
    }

    /// Sampling interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Take one sample and log it
    pub fn observe(&mut self) -> RenderHealth {
        let stats = self.renderer.stats();
        let health = match &self.last {
            Some(last) => RenderHealth {
                new_underruns: stats.underruns.saturating_sub(last.underruns),
                new_stream_errors: stats.stream_errors.saturating_sub(last.stream_errors),
                new_drops: stats.buffers_dropped.saturating_sub(last.buffers_dropped),
                frames_rendered: stats.frames_rendered.saturating_sub(last.frames_rendered),
                stats: stats.clone(),
            },
            None => RenderHealth {
                new_underruns: stats.underruns,
                new_stream_errors: stats.stream_errors,
                new_drops: stats.buffers_dropped,
                frames_rendered: stats.frames_rendered,
                stats: stats.clone(),
            },
        };
        self.last = Some(stats);

        debug!(
            "📊 Render stats: {} frames (+{}), queue {}/{}, volume {:.2}",
            health.stats.frames_rendered,
            health.frames_rendered,
            health.stats.pending_buffers,
            health.stats.capacity,
            health.stats.volume
        );
        if health.new_underruns > 0 {
            warn!(
                "Audio underruns: {} new ({} total), queue level {:.0}%",
                health.new_underruns,
                health.stats.underruns,
                health.stats.buffer_level() * 100.0
            );
        }
        if health.new_stream_errors > 0 {
            warn!("Audio stream errors: {} new", health.new_stream_errors);
        }
        if health.new_drops > 0 {
            warn!("Audio buffers dropped: {} new", health.new_drops);
        }

        health
    }

    /// Run the monitor on the current tokio runtime.
    ///
    /// The task ends once a renderer that was rendering stops, returning the
    /// last observation.
    pub fn spawn(mut self) -> Result<JoinHandle<RenderHealth>, DiagnosticsError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| DiagnosticsError::NoRuntime {
                reason: e.to_string(),
            })?;

        info!("🩺 Starting render monitor ({:?} interval)", self.interval);
        Ok(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            let mut was_rendering = false;
            loop {
                ticker.tick().await;
                let health = self.observe();
                if was_rendering && !health.stats.is_rendering {
                    info!("🩺 Render monitor stopping: renderer no longer active");
                    return health;
                }
                was_rendering |= health.stats.is_rendering;
            }
        }))
    }
}
