//! End-to-end tests through the Timbre entry point
//!
//! These tests wire an asset, a virtual renderer, the feeder and the render
//! monitor together the way a playback host would.

use std::time::Duration;
use timbre::*;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

fn stereo_f32() -> AudioDescriptor {
    AudioDescriptor::new(48_000, 2, SampleFormat::F32).unwrap()
}

fn virtual_config(descriptor: Option<AudioDescriptor>) -> TimbreConfig {
    TimbreConfig {
        output: OutputBackend::Virtual { descriptor },
        monitor_interval_ms: 5,
        feeder_retry_ms: 1,
        ..Default::default()
    }
}

// ============================================================================
// INITIALIZATION TESTS
// ============================================================================

#[test]
fn test_init_with_invalid_config() {
    let config = TimbreConfig {
        max_tracks_per_asset: Some(0),
        ..Default::default()
    };
    let err = assert_err!(Timbre::init_with(config));
    assert!(matches!(err, TimbreError::Configuration { .. }));
}

#[test]
fn test_assets_use_configured_limit() {
    let timbre = assert_ok!(Timbre::init_with(TimbreConfig {
        max_tracks_per_asset: Some(1),
        ..virtual_config(None)
    }));

    let asset = timbre.new_asset();
    assert_eq!(asset.max_tracks(), Some(1));
    assert_ok!(asset.add_track(MediaType::Audio));

    let err: TimbreError = assert_err!(asset.add_track(MediaType::Video)).into();
    assert!(matches!(
        err,
        TimbreError::Media(MediaError::TrackLimitExceeded { limit: 1 })
    ));
}

// ============================================================================
// RENDERER TESTS
// ============================================================================

#[test]
fn test_virtual_backend_without_route() {
    let timbre = Timbre::init_with(virtual_config(None)).unwrap();
    let renderer = assert_ok!(timbre.open_renderer());

    let err = assert_err!(renderer.supported_descriptor());
    assert!(matches!(err, RenderError::DeviceUnavailable { .. }));

    let err = TimbreError::from(err);
    assert!(err.to_string().contains("unavailable"));
}

#[test]
fn test_virtual_renderer_uses_given_route() {
    let timbre = Timbre::init_with(virtual_config(Some(stereo_f32()))).unwrap();

    let unrouted = timbre.open_virtual_renderer(None);
    let err = assert_err!(unrouted.supported_descriptor());
    assert!(matches!(err, RenderError::DeviceUnavailable { .. }));

    let mono = AudioDescriptor::new(16_000, 1, SampleFormat::I16).unwrap();
    let routed = timbre.open_virtual_renderer(Some(mono));
    assert_eq!(assert_ok!(routed.supported_descriptor()), mono);
}

#[test]
fn test_playback_pipeline() {
    let timbre = Timbre::init_with(virtual_config(Some(stereo_f32()))).unwrap();

    let asset = timbre.new_asset();
    let audio = asset.add_track("audio").unwrap();
    asset
        .append_segment(audio, Segment::padding(Duration::from_millis(50)))
        .unwrap();
    let snapshot = asset.tracks();
    assert_eq!(snapshot.media_types(), vec![MediaType::Audio]);

    let renderer = timbre.open_virtual_renderer(Some(stereo_f32()));
    let descriptor = renderer.supported_descriptor().unwrap();
    assert_eq!(descriptor, stereo_f32());
    renderer.negotiate(&descriptor).unwrap();
    renderer.set_volume(0.5);

    let (tx, rx) = mpsc::channel(4);
    let feeder = timbre.spawn_feeder(renderer.clone(), rx);

    let summary = timbre.block_on(async move {
        for i in 0..4u32 {
            let pts = Duration::from_millis(10 * i as u64);
            let buffer =
                AudioBuffer::new(descriptor, SampleData::F32(vec![0.5; 960]), pts).unwrap();
            tx.send(buffer).await.unwrap();
        }
        drop(tx);
        feeder.await.unwrap()
    });
    let summary = assert_ok!(summary);
    assert_eq!(summary.submitted, 4);

    let stats = renderer.stats();
    assert_eq!(stats.pending_buffers, 4);
    assert_eq!(stats.queued_duration, Duration::from_millis(40));

    let mut out = vec![0.0f32; 1920];
    assert_eq!(renderer.render_into(out.as_mut_slice()), 1920);
    assert!(out.iter().all(|&sample| sample == 0.25));

    assert_ok!(renderer.teardown());
    assert_eq!(renderer.stats().pending_buffers, 0);
}

#[cfg(feature = "diagnostics")]
#[test]
fn test_monitor_follows_renderer() {
    let timbre = Timbre::init_with(virtual_config(Some(stereo_f32()))).unwrap();
    let renderer = timbre.open_renderer().unwrap();
    renderer.negotiate(&stereo_f32()).unwrap();

    let monitor = assert_ok!(timbre.spawn_monitor(renderer.clone()));
    std::thread::sleep(Duration::from_millis(30));
    renderer.teardown().unwrap();

    let last = timbre
        .block_on(async { tokio::time::timeout(Duration::from_secs(2), monitor).await })
        .expect("monitor did not stop")
        .unwrap();
    assert!(!last.stats.is_rendering);
}
