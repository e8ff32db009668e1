//! Device renderer backed by cpal

use super::session::{RenderCursor, RenderSession};
use super::{
    AudioOutputDevice, AudioRenderConfig, AudioRenderStats, AudioRenderer, BackpressurePolicy,
    RenderError, VolumeControl,
};
use crate::descriptor::{AudioDescriptor, SampleFormat};
use crate::frames::{AudioBuffer, RenderSample};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Renders audio to a system output device through cpal.
///
/// The cpal stream is owned by a dedicated output thread for its whole life, so
/// the renderer itself stays `Send + Sync` regardless of platform stream rules.
pub struct CpalAudioRenderer {
    config: AudioRenderConfig,
    session: Arc<RenderSession>,
    output: Mutex<Option<OutputThread>>,
}

impl CpalAudioRenderer {
    /// Create a renderer for the configured (or default) output device
    pub fn new(config: AudioRenderConfig) -> Self {
        info!(
            "🔊 Creating cpal audio renderer (device: {})",
            config.device_name.as_deref().unwrap_or("default")
        );
        Self {
            session: Arc::new(RenderSession::new(&config)),
            config,
            output: Mutex::new(None),
        }
    }

    /// Renderer configuration
    pub fn config(&self) -> &AudioRenderConfig {
        &self.config
    }

    /// Enumerate output devices on the default host.
    ///
    /// Devices that cannot report a name are skipped. `descriptor` is what
    /// [`AudioRenderer::supported_descriptor`] would return for the device.
    pub fn list_devices() -> Result<Vec<AudioOutputDevice>, RenderError> {
        let host = cpal::default_host();
        let default_name = host.default_output_device().and_then(|d| d.name().ok());

        let devices = host
            .output_devices()
            .map_err(|e| RenderError::DeviceUnavailable {
                reason: format!("Failed to enumerate output devices: {}", e),
            })?
            .filter_map(|device| {
                let name = device.name().ok()?;
                let descriptor = device
                    .default_output_config()
                    .ok()
                    .and_then(|config| AudioDescriptor::from_cpal(&config).ok());
                Some(AudioOutputDevice {
                    is_default: default_name.as_deref() == Some(name.as_str()),
                    name,
                    descriptor,
                })
            })
            .collect();
        Ok(devices)
    }
}

impl AudioRenderer for CpalAudioRenderer {
    fn supported_descriptor(&self) -> Result<AudioDescriptor, RenderError> {
        if self.session.is_torn_down() {
            return Err(RenderError::TornDown);
        }
        let device = find_device(self.config.device_name.as_deref())?;
        let config = device
            .default_output_config()
            .map_err(|e| RenderError::DeviceUnavailable {
                reason: format!("No usable output configuration: {}", e),
            })?;
        AudioDescriptor::from_cpal(&config).map_err(|e| RenderError::DeviceUnavailable {
            reason: e.to_string(),
        })
    }

    fn negotiate(&self, descriptor: &AudioDescriptor) -> Result<(), RenderError> {
        let mut output = self.output.lock();
        self.session.check_idle()?;

        let supported = self.supported_descriptor()?;
        self.session.check_negotiable(&supported, descriptor)?;

        let thread = OutputThread::spawn(
            self.config.device_name.clone(),
            *descriptor,
            self.config.buffer_size,
            Arc::clone(&self.session),
        )?;
        if let Err(e) = self.session.commit(*descriptor) {
            thread.shutdown()?;
            return Err(e);
        }
        *output = Some(thread);

        info!("✅ Negotiated audio output {}", descriptor);
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
        let mut output = self.output.lock();
        if self.session.is_torn_down() {
            return Err(RenderError::TornDown);
        }

        let stopped = match output.take() {
            Some(thread) => thread.shutdown(),
            None => Ok(()),
        };
        let discarded = self.session.close();

        info!("🛑 Audio renderer torn down ({} pending buffers discarded)", discarded);
        stopped
    }
}

impl Default for CpalAudioRenderer {
    fn default() -> Self {
        Self::new(AudioRenderConfig::default())
    }
}

impl Drop for CpalAudioRenderer {
    fn drop(&mut self) {
        if let Some(thread) = self.output.get_mut().take() {
            if let Err(e) = thread.shutdown() {
                warn!("Audio output thread did not stop cleanly: {}", e);
            }
        }
        self.session.close();
    }
}

fn find_device(name: Option<&str>) -> Result<cpal::Device, RenderError> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .output_devices()
            .map_err(|e| RenderError::DeviceUnavailable {
                reason: format!("Failed to enumerate output devices: {}", e),
            })?
            .find(|device| device.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| RenderError::DeviceUnavailable {
                reason: format!("Output device '{}' not found", name),
            }),
        None => host
            .default_output_device()
            .ok_or_else(|| RenderError::DeviceUnavailable {
                reason: "No default output device".to_string(),
            }),
    }
}

/// Thread that owns the playing cpal stream until shutdown
struct OutputThread {
    shutdown: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl OutputThread {
    fn spawn(
        device_name: Option<String>,
        descriptor: AudioDescriptor,
        buffer_size: Option<u32>,
        session: Arc<RenderSession>,
    ) -> Result<Self, RenderError> {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), RenderError>>(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name("timbre-audio-output".to_string())
            .spawn(move || {
                let stream = match open_stream(device_name.as_deref(), descriptor, buffer_size, session)
                {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Parked until the renderer asks to stop or goes away
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("Audio output stream closed");
            })
            .map_err(|e| RenderError::Stream {
                reason: format!("Failed to spawn output thread: {}", e),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                shutdown: shutdown_tx,
                handle,
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(RenderError::Stream {
                    reason: "Output thread exited before starting the stream".to_string(),
                })
            }
        }
    }

    fn shutdown(self) -> Result<(), RenderError> {
        let _ = self.shutdown.send(());
        self.handle.join().map_err(|_| RenderError::Stream {
            reason: "Output thread panicked".to_string(),
        })
    }
}

fn open_stream(
    device_name: Option<&str>,
    descriptor: AudioDescriptor,
    buffer_size: Option<u32>,
    session: Arc<RenderSession>,
) -> Result<cpal::Stream, RenderError> {
    let device = find_device(device_name)?;
    let stream_config = descriptor.stream_config(buffer_size);

    let stream = match descriptor.format() {
        SampleFormat::U8 => build_typed::<u8>(&device, &stream_config, session)?,
        SampleFormat::I16 => build_typed::<i16>(&device, &stream_config, session)?,
        SampleFormat::I32 => build_typed::<i32>(&device, &stream_config, session)?,
        SampleFormat::F32 => build_typed::<f32>(&device, &stream_config, session)?,
        SampleFormat::F64 => build_typed::<f64>(&device, &stream_config, session)?,
    };

    stream.play().map_err(|e| RenderError::Stream {
        reason: format!("Failed to start output stream: {}", e),
    })?;
    Ok(stream)
}

fn build_typed<T: RenderSample>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    session: Arc<RenderSession>,
) -> Result<cpal::Stream, RenderError> {
    let error_session = Arc::clone(&session);
    let mut cursor = RenderCursor::default();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                session.fill(&mut cursor, data);
            },
            move |err| error_session.note_stream_error(&err),
            None,
        )
        .map_err(|e| RenderError::Stream {
            reason: format!("Failed to build output stream: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_renderer_is_idle() {
        let renderer = CpalAudioRenderer::default();

        assert!(!renderer.is_rendering());
        assert!(renderer.descriptor().is_none());
        assert_eq!(renderer.volume(), 1.0);
        assert_eq!(renderer.stats().capacity, 8);
    }

    #[test]
    fn test_submit_before_negotiate() {
        let renderer = CpalAudioRenderer::default();
        let descriptor = AudioDescriptor::new(48_000, 2, SampleFormat::F32).unwrap();
        let buffer = AudioBuffer::new(
            descriptor,
            crate::frames::SampleData::F32(vec![0.0; 4]),
            std::time::Duration::ZERO,
        )
        .unwrap();

        assert_eq!(renderer.submit(buffer), Err(RenderError::NotNegotiated));
    }

    #[test]
    fn test_list_devices_matches_default_route() {
        let devices = match CpalAudioRenderer::list_devices() {
            Ok(devices) => devices,
            Err(e) => {
                assert!(matches!(e, RenderError::DeviceUnavailable { .. }));
                return;
            }
        };

        assert!(devices.iter().filter(|device| device.is_default).count() <= 1);
        let renderer = CpalAudioRenderer::default();
        if let Some(default) = devices.iter().find(|device| device.is_default) {
            if let (Some(listed), Ok(supported)) =
                (default.descriptor, renderer.supported_descriptor())
            {
                assert_eq!(listed, supported);
            }
        }
    }

    #[test]
    fn test_teardown_without_device_is_terminal() {
        let renderer = CpalAudioRenderer::default();

        assert!(renderer.teardown().is_ok());
        assert_eq!(renderer.teardown(), Err(RenderError::TornDown));

        let descriptor = AudioDescriptor::new(48_000, 2, SampleFormat::F32).unwrap();
        assert_eq!(renderer.negotiate(&descriptor), Err(RenderError::TornDown));
        assert_eq!(renderer.supported_descriptor(), Err(RenderError::TornDown));
    }
}
