//! Async bridge from a decode pipeline to a renderer

use super::{AudioRenderer, BackpressurePolicy, RenderError};
use crate::frames::AudioBuffer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// What a feeder task delivered before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeederSummary {
    /// Buffers accepted by the renderer
    pub submitted: u64,
    /// Submissions refused with backpressure and tried again
    pub retries: u64,
}

/// Spawn a task draining `buffers` into `renderer`.
///
/// Every buffer is delivered: a submission refused with backpressure is retried
/// after sleeping for `retry`, for as long as the renderer stays full. Under the
/// `Block` policy submissions run on the blocking pool so the wait never parks a
/// runtime worker. The task stops when the channel closes, returning what it
/// delivered, or on the first non-recoverable render error. Must be called
/// inside a tokio runtime.
pub fn spawn_feeder(
    renderer: Arc<dyn AudioRenderer>,
    mut buffers: mpsc::Receiver<AudioBuffer>,
    retry: Duration,
) -> JoinHandle<Result<FeederSummary, RenderError>> {
    tokio::spawn(async move {
        let mut summary = FeederSummary::default();

        while let Some(buffer) = buffers.recv().await {
            loop {
                match submit(&renderer, buffer.clone()).await {
                    Ok(()) => {
                        summary.submitted += 1;
                        break;
                    }
                    Err(e) if e.is_recoverable() => {
                        summary.retries += 1;
                        tokio::time::sleep(retry).await;
                    }
                    Err(e) => {
                        debug!("Feeder stopping: {}", e);
                        return Err(e);
                    }
                }
            }
        }

        debug!(
            "Feeder finished ({} submitted, {} retries)",
            summary.submitted, summary.retries
        );
        Ok(summary)
    })
}

async fn submit(renderer: &Arc<dyn AudioRenderer>, buffer: AudioBuffer) -> Result<(), RenderError> {
    match renderer.backpressure() {
        BackpressurePolicy::Block { .. } => {
            let renderer = Arc::clone(renderer);
            tokio::task::spawn_blocking(move || renderer.submit(buffer))
                .await
                .map_err(|e| RenderError::Stream {
                    reason: format!("Blocking submission failed: {}", e),
                })?
        }
        BackpressurePolicy::Reject | BackpressurePolicy::DropOldest => renderer.submit(buffer),
    }
}
