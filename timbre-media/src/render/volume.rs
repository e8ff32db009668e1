//! Lock-free volume cell shared between control surfaces and the render path

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared output gain in 0.0..=1.0.
///
/// Cloning yields another handle to the same cell. Writes are a single atomic
/// store: they never block, never allocate and never fail.
#[derive(Debug, Clone)]
pub struct VolumeControl {
    bits: Arc<AtomicU64>,
}

impl VolumeControl {
    /// Create a cell holding `volume` (clamped; NaN becomes 1.0)
    pub fn new(volume: f64) -> Self {
        let initial = if volume.is_nan() { 1.0 } else { clamp(volume) };
        Self {
            bits: Arc::new(AtomicU64::new(initial.to_bits())),
        }
    }

    /// Last value set
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Store a new volume. Out-of-range values clamp to the nearest bound; NaN
    /// is ignored.
    pub fn set(&self, volume: f64) {
        if volume.is_nan() {
            return;
        }
        self.bits.store(clamp(volume).to_bits(), Ordering::Relaxed);
    }

    /// Whether output is silenced
    pub fn is_muted(&self) -> bool {
        self.get() == 0.0
    }
}

impl Default for VolumeControl {
    fn default() -> Self {
        Self::new(1.0)
    }
}

fn clamp(volume: f64) -> f64 {
    volume.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_out_of_range() {
        let volume = VolumeControl::default();

        volume.set(1.5);
        assert_eq!(volume.get(), 1.0);

        volume.set(-0.2);
        assert_eq!(volume.get(), 0.0);
        assert!(volume.is_muted());

        volume.set(f64::INFINITY);
        assert_eq!(volume.get(), 1.0);
    }

    #[test]
    fn test_nan_is_ignored() {
        let volume = VolumeControl::new(0.3);
        volume.set(f64::NAN);
        assert_eq!(volume.get(), 0.3);

        assert_eq!(VolumeControl::new(f64::NAN).get(), 1.0);
    }

    #[test]
    fn test_clones_share_state() {
        let volume = VolumeControl::new(0.5);
        let remote = volume.clone();

        remote.set(0.25);
        assert_eq!(volume.get(), 0.25);
    }

    #[test]
    fn test_last_write_wins() {
        let volume = VolumeControl::default();
        volume.set(0.7);
        volume.set(0.0);
        volume.set(1.2);
        assert_eq!(volume.get(), 1.0);
    }
}
