//! State shared by the submitting side and the render callback of one renderer

use super::{AudioRenderConfig, AudioRenderStats, BackpressurePolicy, RenderError, VolumeControl};
use crate::descriptor::AudioDescriptor;
use crate::frames::{AudioBuffer, RenderSample};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Negotiated(AudioDescriptor),
    TornDown,
}

/// Pending buffers plus the session phase, guarded together so a submission,
/// a render pop and teardown are ordered with respect to each other.
///
/// Every critical section is O(1) and does no I/O; evicted buffers are dropped
/// and logged after the guard is released.
#[derive(Debug)]
struct PendingQueue {
    phase: Phase,
    buffers: VecDeque<AudioBuffer>,
    queued_frames: usize,
    capacity: usize,
}

impl PendingQueue {
    fn push(&mut self, buffer: AudioBuffer) {
        self.queued_frames += buffer.frames();
        self.buffers.push_back(buffer);
    }

    fn pop(&mut self) -> Option<AudioBuffer> {
        let buffer = self.buffers.pop_front()?;
        self.queued_frames -= buffer.frames();
        Some(buffer)
    }

    fn is_full(&self) -> bool {
        self.buffers.len() >= self.capacity
    }

    fn backpressure(&self) -> RenderError {
        RenderError::Backpressure {
            pending: self.buffers.len(),
            capacity: self.capacity,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    frames_rendered: AtomicU64,
    underruns: AtomicU64,
    stream_errors: AtomicU64,
}

/// Render-side read position inside the buffer currently being played
#[derive(Debug, Default)]
pub(crate) struct RenderCursor {
    current: Option<AudioBuffer>,
    offset: usize,
}

impl RenderCursor {
    fn reset(&mut self) {
        self.current = None;
        self.offset = 0;
    }
}

#[derive(Debug)]
pub(crate) struct RenderSession {
    policy: BackpressurePolicy,
    volume: VolumeControl,
    queue: Mutex<PendingQueue>,
    drained: Condvar,
    closed: AtomicBool,
    counters: Counters,
}

impl RenderSession {
    pub(crate) fn new(config: &AudioRenderConfig) -> Self {
        let capacity = config.max_pending_buffers.max(1);
        Self {
            policy: config.backpressure,
            volume: VolumeControl::new(config.initial_volume),
            queue: Mutex::new(PendingQueue {
                phase: Phase::Idle,
                buffers: VecDeque::with_capacity(capacity),
                queued_frames: 0,
                capacity,
            }),
            drained: Condvar::new(),
            closed: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    pub(crate) fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    pub(crate) fn volume(&self) -> &VolumeControl {
        &self.volume
    }

    pub(crate) fn descriptor(&self) -> Option<AudioDescriptor> {
        match self.queue.lock().phase {
            Phase::Negotiated(descriptor) => Some(descriptor),
            _ => None,
        }
    }

    pub(crate) fn is_rendering(&self) -> bool {
        matches!(self.queue.lock().phase, Phase::Negotiated(_))
    }

    /// Fail unless the session is still waiting for a descriptor
    pub(crate) fn check_idle(&self) -> Result<(), RenderError> {
        match self.queue.lock().phase {
            Phase::Idle => Ok(()),
            Phase::Negotiated(_) => Err(RenderError::AlreadyNegotiated),
            Phase::TornDown => Err(RenderError::TornDown),
        }
    }

    /// Check that `requested` may be negotiated against `supported`
    pub(crate) fn check_negotiable(
        &self,
        supported: &AudioDescriptor,
        requested: &AudioDescriptor,
    ) -> Result<(), RenderError> {
        self.check_idle()?;
        if !supported.is_compatible(requested) {
            return Err(RenderError::FormatMismatch {
                expected: *supported,
                actual: *requested,
            });
        }
        Ok(())
    }

    pub(crate) fn is_torn_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Fix the session descriptor if no other negotiation got there first
    pub(crate) fn commit(&self, descriptor: AudioDescriptor) -> Result<(), RenderError> {
        let mut queue = self.queue.lock();
        match queue.phase {
            Phase::Idle => {
                queue.phase = Phase::Negotiated(descriptor);
                Ok(())
            }
            Phase::Negotiated(_) => Err(RenderError::AlreadyNegotiated),
            Phase::TornDown => Err(RenderError::TornDown),
        }
    }

    /// End the session: discard pending buffers and wake blocked submitters
    pub(crate) fn close(&self) -> usize {
        let pending = {
            let mut queue = self.queue.lock();
            queue.phase = Phase::TornDown;
            self.closed.store(true, Ordering::Release);
            queue.queued_frames = 0;
            std::mem::take(&mut queue.buffers)
        };
        let discarded = pending.len();
        self.counters
            .dropped
            .fetch_add(discarded as u64, Ordering::Relaxed);
        self.drained.notify_all();
        discarded
    }

    pub(crate) fn has_capacity(&self) -> bool {
        !self.queue.lock().is_full()
    }

    pub(crate) fn submit(&self, buffer: AudioBuffer) -> Result<(), RenderError> {
        if buffer.data().is_empty() {
            return Err(RenderError::InvalidBuffer {
                reason: "buffer holds no frames".to_string(),
            });
        }

        let evicted = {
            let mut queue = self.queue.lock();
            Self::check_accepts(&queue, &buffer)?;

            let mut evicted = None;
            if queue.is_full() {
                match self.policy {
                    BackpressurePolicy::Reject => {
                        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                        return Err(queue.backpressure());
                    }
                    BackpressurePolicy::DropOldest => {
                        evicted = queue.pop();
                    }
                    BackpressurePolicy::Block { timeout_ms } => {
                        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
                        while queue.is_full() {
                            if self.drained.wait_until(&mut queue, deadline).timed_out()
                                && queue.is_full()
                            {
                                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                                return Err(queue.backpressure());
                            }
                            Self::check_accepts(&queue, &buffer)?;
                        }
                    }
                }
            }

            queue.push(buffer);
            evicted
        };
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        if let Some(oldest) = evicted {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("Dropped pending audio buffer at {:?} to make room", oldest.pts());
        }
        Ok(())
    }

    fn check_accepts(queue: &PendingQueue, buffer: &AudioBuffer) -> Result<(), RenderError> {
        match queue.phase {
            Phase::Idle => Err(RenderError::NotNegotiated),
            Phase::TornDown => Err(RenderError::TornDown),
            Phase::Negotiated(expected) if expected != *buffer.descriptor() => {
                Err(RenderError::FormatMismatch {
                    expected,
                    actual: *buffer.descriptor(),
                })
            }
            Phase::Negotiated(_) => Ok(()),
        }
    }

    /// Fill one output period. Runs on the render actor.
    ///
    /// The queue lock is only taken to pop the next buffer; gain comes from the
    /// volume cell and is sampled once per period. Any shortfall is padded with
    /// silence and counted as an underrun. Returns the number of samples taken
    /// from submitted buffers.
    pub(crate) fn fill<T: RenderSample>(&self, cursor: &mut RenderCursor, out: &mut [T]) -> usize {
        if self.closed.load(Ordering::Acquire) {
            cursor.reset();
            out.fill(T::SILENCE);
            return 0;
        }

        let gain = self.volume.get();
        let mut written = 0;
        let mut channels = 1;

        while written < out.len() {
            if cursor.current.is_none() {
                let next = {
                    let mut queue = self.queue.lock();
                    match queue.phase {
                        Phase::Negotiated(_) => queue.pop(),
                        _ => None,
                    }
                };
                match next {
                    Some(buffer) => {
                        cursor.current = Some(buffer);
                        cursor.offset = 0;
                        self.drained.notify_one();
                    }
                    None => break,
                }
            }

            let Some(buffer) = cursor.current.as_ref() else {
                break;
            };
            channels = buffer.descriptor().channels() as usize;
            let Some(samples) = T::samples(buffer.data()) else {
                // Negotiation pins the sample type, so this only drops a buffer
                // built for another output.
                cursor.reset();
                continue;
            };

            let remaining = &samples[cursor.offset..];
            let count = remaining.len().min(out.len() - written);
            for (dst, &src) in out[written..written + count].iter_mut().zip(remaining) {
                *dst = src.apply_gain(gain);
            }
            written += count;
            cursor.offset += count;

            if cursor.offset >= samples.len() {
                cursor.reset();
            }
        }

        if written < out.len() {
            out[written..].fill(T::SILENCE);
            if self.is_rendering() {
                self.counters.underruns.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.counters
            .frames_rendered
            .fetch_add((written / channels) as u64, Ordering::Relaxed);
        written
    }

    pub(crate) fn note_stream_error(&self, error: &dyn std::fmt::Display) {
        self.counters.stream_errors.fetch_add(1, Ordering::Relaxed);
        warn!("Audio render stream error: {}", error);
    }

    pub(crate) fn stats(&self) -> AudioRenderStats {
        let (descriptor, pending_buffers, queued_frames, capacity) = {
            let queue = self.queue.lock();
            let descriptor = match queue.phase {
                Phase::Negotiated(descriptor) => Some(descriptor),
                _ => None,
            };
            (descriptor, queue.buffers.len(), queue.queued_frames, queue.capacity)
        };
        AudioRenderStats {
            descriptor,
            buffers_submitted: self.counters.submitted.load(Ordering::Relaxed),
            buffers_dropped: self.counters.dropped.load(Ordering::Relaxed),
            buffers_rejected: self.counters.rejected.load(Ordering::Relaxed),
            frames_rendered: self.counters.frames_rendered.load(Ordering::Relaxed),
            underruns: self.counters.underruns.load(Ordering::Relaxed),
            stream_errors: self.counters.stream_errors.load(Ordering::Relaxed),
            pending_buffers,
            capacity,
            queued_duration: descriptor
                .map(|d| d.frames_to_duration(queued_frames))
                .unwrap_or_default(),
            volume: self.volume.get(),
            is_rendering: descriptor.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::SampleFormat;
    use crate::frames::SampleData;

    fn mono_i16() -> AudioDescriptor {
        AudioDescriptor::new(8_000, 1, SampleFormat::I16).unwrap()
    }

    fn buffer(samples: Vec<i16>) -> AudioBuffer {
        AudioBuffer::new(mono_i16(), SampleData::I16(samples), Duration::ZERO).unwrap()
    }

    fn negotiated(config: AudioRenderConfig) -> RenderSession {
        let session = RenderSession::new(&config);
        session.commit(mono_i16()).unwrap();
        session
    }

    #[test]
    fn test_fill_spans_buffers_and_pads_silence() {
        let session = negotiated(AudioRenderConfig::default());
        session.submit(buffer(vec![1, 2, 3])).unwrap();
        session.submit(buffer(vec![4, 5])).unwrap();

        let mut cursor = RenderCursor::default();
        let mut out = [9i16; 4];
        assert_eq!(session.fill(&mut cursor, &mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);

        let mut out = [9i16; 3];
        assert_eq!(session.fill(&mut cursor, &mut out), 1);
        assert_eq!(out, [5, 0, 0]);

        let stats = session.stats();
        assert_eq!(stats.frames_rendered, 5);
        assert_eq!(stats.underruns, 1);
    }

    #[test]
    fn test_fill_applies_current_volume() {
        let session = negotiated(AudioRenderConfig::default());
        session.submit(buffer(vec![100, -100, 100, -100])).unwrap();

        let mut cursor = RenderCursor::default();
        let mut out = [0i16; 2];
        session.volume().set(0.5);
        session.fill(&mut cursor, &mut out);
        assert_eq!(out, [50, -50]);

        session.volume().set(0.0);
        session.fill(&mut cursor, &mut out);
        assert_eq!(out, [0, 0]);
    }

    #[test]
    fn test_close_silences_inflight_buffer() {
        let session = negotiated(AudioRenderConfig::default());
        session.submit(buffer(vec![7; 8])).unwrap();
        session.submit(buffer(vec![7; 8])).unwrap();

        let mut cursor = RenderCursor::default();
        let mut out = [0i16; 4];
        session.fill(&mut cursor, &mut out);
        assert_eq!(out, [7; 4]);

        assert_eq!(session.close(), 1);
        session.fill(&mut cursor, &mut out);
        assert_eq!(out, [0; 4]);
        assert_eq!(session.stats().buffers_dropped, 1);
    }

    #[test]
    fn test_queued_duration_follows_pops() {
        let session = negotiated(AudioRenderConfig {
            max_pending_buffers: 2,
            backpressure: BackpressurePolicy::DropOldest,
            ..Default::default()
        });
        session.submit(buffer(vec![1; 80])).unwrap();
        session.submit(buffer(vec![2; 160])).unwrap();
        assert_eq!(session.stats().queued_duration, Duration::from_millis(30));

        // Evicts the 10 ms buffer
        session.submit(buffer(vec![3; 40])).unwrap();
        let stats = session.stats();
        assert_eq!(stats.queued_duration, Duration::from_millis(25));
        assert_eq!(stats.buffers_dropped, 1);

        let mut cursor = RenderCursor::default();
        let mut out = [0i16; 160];
        session.fill(&mut cursor, &mut out);
        assert_eq!(session.stats().queued_duration, Duration::from_millis(5));

        assert_eq!(session.close(), 1);
        assert_eq!(session.stats().queued_duration, Duration::ZERO);
    }

    #[test]
    fn test_block_policy_times_out() {
        let session = negotiated(AudioRenderConfig {
            max_pending_buffers: 1,
            backpressure: BackpressurePolicy::Block { timeout_ms: 10 },
            ..Default::default()
        });
        session.submit(buffer(vec![1])).unwrap();

        let started = Instant::now();
        let err = session.submit(buffer(vec![2])).unwrap_err();
        assert!(matches!(err, RenderError::Backpressure { pending: 1, capacity: 1 }));
        assert!(started.elapsed() >= Duration::from_millis(10));
        assert_eq!(session.stats().buffers_rejected, 1);
    }
}
