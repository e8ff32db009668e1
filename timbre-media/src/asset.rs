//! Mutable multi-track asset
//!
//! The asset owns its tracks in a slot arena guarded by a writer lock. Every
//! successful mutation republishes an immutable copy of the ordered track list;
//! readers load that copy without locking, so a scheduler iterating a snapshot
//! never observes a half-applied edit.

use crate::error::{MediaError, MediaResult};
use crate::tracks::{MediaType, Segment, Track, TrackId};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Point-in-time, read-only copy of an asset's track list
#[derive(Debug, Clone)]
pub struct TrackSnapshot {
    inner: Arc<SnapshotInner>,
}

#[derive(Debug)]
struct SnapshotInner {
    asset: Uuid,
    revision: u64,
    tracks: Vec<Arc<Track>>,
}

impl TrackSnapshot {
    /// Asset revision this snapshot was taken at
    pub fn revision(&self) -> u64 {
        self.inner.revision
    }

    /// Asset this snapshot was taken from
    pub fn asset_id(&self) -> Uuid {
        self.inner.asset
    }

    /// Tracks in presentation order
    pub fn as_slice(&self) -> &[Arc<Track>] {
        &self.inner.tracks
    }

    /// Track at `index` in presentation order
    pub fn get(&self, index: usize) -> Option<&Track> {
        self.inner.tracks.get(index).map(Arc::as_ref)
    }

    /// Look up a track by handle
    pub fn find(&self, id: TrackId) -> Option<&Track> {
        self.iter().find(|track| track.id() == id)
    }

    /// Tracks in presentation order
    pub fn iter(&self) -> impl Iterator<Item = &Track> + '_ {
        self.inner.tracks.iter().map(Arc::as_ref)
    }

    /// Tracks of one media type, in presentation order
    pub fn of_type(&self, media_type: MediaType) -> impl Iterator<Item = &Track> + '_ {
        self.iter().filter(move |track| track.media_type() == media_type)
    }

    /// Media types in presentation order
    pub fn media_types(&self) -> Vec<MediaType> {
        self.iter().map(Track::media_type).collect()
    }
}

impl Deref for TrackSnapshot {
    type Target = [Arc<Track>];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<'a> IntoIterator for &'a TrackSnapshot {
    type Item = &'a Track;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, Arc<Track>>, fn(&Arc<Track>) -> &Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.tracks.iter().map(Arc::as_ref)
    }
}

/// Tracks are shared with published snapshots, so an edit copies only the
/// track it touches.
#[derive(Debug)]
struct Slot {
    generation: u32,
    track: Option<Arc<Track>>,
}

#[derive(Debug, Default)]
struct SlotArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    order: Vec<u32>,
    revision: u64,
}

impl SlotArena {
    fn live(&self) -> usize {
        self.order.len()
    }

    fn allocate(&mut self, asset: Uuid, media_type: MediaType) -> TrackId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    track: None,
                });
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        let id = TrackId {
            asset,
            index,
            generation: slot.generation,
        };
        slot.track = Some(Arc::new(Track::new(id, media_type)));
        self.order.push(index);
        id
    }

    fn contains(&self, id: TrackId) -> bool {
        self.slots
            .get(id.index as usize)
            .is_some_and(|slot| slot.generation == id.generation && slot.track.is_some())
    }

    fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.track.as_mut())
            .map(Arc::make_mut)
    }

    fn release(&mut self, id: TrackId) -> Option<Arc<Track>> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let track = slot.track.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.order.retain(|&index| index != id.index);
        Some(track)
    }

    fn position(&self, id: TrackId) -> Option<usize> {
        self.order.iter().position(|&index| index == id.index)
    }

    fn snapshot(&mut self, asset: Uuid) -> SnapshotInner {
        self.revision += 1;
        let tracks = self
            .order
            .iter()
            .filter_map(|&index| self.slots[index as usize].track.clone())
            .collect();
        SnapshotInner {
            asset,
            revision: self.revision,
            tracks,
        }
    }
}

/// Editable, ordered collection of tracks.
///
/// Mutators take `&self` and are serialised internally; share the asset behind an
/// `Arc` between the editing and scheduling sides.
#[derive(Debug)]
pub struct MutableAsset {
    id: Uuid,
    max_tracks: Option<usize>,
    arena: Mutex<SlotArena>,
    published: ArcSwap<SnapshotInner>,
}

impl MutableAsset {
    /// Create an empty asset with no track limit
    pub fn new() -> Self {
        Self::with_track_limit(None)
    }

    /// Create an empty asset that holds at most `max_tracks` tracks
    pub fn with_track_limit(max_tracks: Option<usize>) -> Self {
        let id = Uuid::new_v4();
        info!("🎬 Creating mutable asset {} (track limit: {:?})", id, max_tracks);
        Self {
            id,
            max_tracks,
            arena: Mutex::new(SlotArena::default()),
            published: ArcSwap::from_pointee(SnapshotInner {
                asset: id,
                revision: 0,
                tracks: Vec::new(),
            }),
        }
    }

    /// Asset identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Configured track limit
    pub fn max_tracks(&self) -> Option<usize> {
        self.max_tracks
    }

    /// Create a track of the given media type and append it.
    ///
    /// Accepts a [`MediaType`], a media type name (`"audio"`, `"video"`, `"text"`)
    /// or a numeric code. Unrecognised input fails with
    /// [`MediaError::InvalidArgument`] and leaves the asset unchanged.
    pub fn add_track<T>(&self, media_type: T) -> MediaResult<TrackId>
    where
        T: TryInto<MediaType>,
        MediaError: From<T::Error>,
    {
        let media_type = media_type.try_into()?;

        let mut arena = self.arena.lock();
        if let Some(limit) = self.max_tracks {
            if arena.live() >= limit {
                return Err(MediaError::TrackLimitExceeded { limit });
            }
        }

        let id = arena.allocate(self.id, media_type);
        self.publish(&mut arena);
        debug!("➕ Added {} track {} to asset {}", media_type, id, self.id);
        Ok(id)
    }

    /// Remove a track. Its handle becomes stale.
    pub fn remove_track(&self, id: TrackId) -> MediaResult<Track> {
        let mut arena = self.arena.lock();
        self.check(&arena, id)?;
        let track = arena
            .release(id)
            .ok_or(MediaError::TrackNotFound { track_id: id })?;
        self.publish(&mut arena);
        debug!("➖ Removed {} track {} from asset {}", track.media_type(), id, self.id);
        Ok(Arc::unwrap_or_clone(track))
    }

    /// Move a track to `index` in presentation order
    pub fn move_track(&self, id: TrackId, index: usize) -> MediaResult<()> {
        let mut arena = self.arena.lock();
        self.check(&arena, id)?;
        let from = arena
            .position(id)
            .ok_or(MediaError::TrackNotFound { track_id: id })?;

        if index >= arena.live() {
            return Err(MediaError::invalid_argument(format!(
                "track position {} out of range for {} tracks",
                index,
                arena.live()
            )));
        }

        let slot = arena.order.remove(from);
        arena.order.insert(index, slot);
        self.publish(&mut arena);
        debug!("🔀 Moved track {} from position {} to {}", id, from, index);
        Ok(())
    }

    /// Append content to a track
    pub fn append_segment(&self, id: TrackId, segment: Segment) -> MediaResult<()> {
        segment.validate()?;

        let mut arena = self.arena.lock();
        let duration = segment.duration();
        self.resolve(&mut arena, id)?.push_segment(segment);
        self.publish(&mut arena);
        debug!("📎 Appended {:?} segment to track {}", duration, id);
        Ok(())
    }

    /// Drop all content of a track
    pub fn clear_segments(&self, id: TrackId) -> MediaResult<()> {
        let mut arena = self.arena.lock();
        self.resolve(&mut arena, id)?.clear_segments();
        self.publish(&mut arena);
        debug!("🧹 Cleared segments of track {}", id);
        Ok(())
    }

    /// Snapshot of the current track list.
    ///
    /// Later edits never change a snapshot that has already been returned.
    pub fn tracks(&self) -> TrackSnapshot {
        TrackSnapshot {
            inner: self.published.load_full(),
        }
    }

    /// Copy of a single live track
    pub fn track(&self, id: TrackId) -> Option<Track> {
        self.published
            .load()
            .tracks
            .iter()
            .find(|track| track.id() == id)
            .map(|track| Track::clone(track))
    }

    /// Whether `snapshot` was taken from this asset and still reflects its latest state
    pub fn is_current(&self, snapshot: &TrackSnapshot) -> bool {
        let published = self.published.load();
        published.asset == snapshot.asset_id() && published.revision == snapshot.revision()
    }

    /// Revision counter, bumped by every successful mutation
    pub fn revision(&self) -> u64 {
        self.published.load().revision
    }

    /// Number of live tracks
    pub fn track_count(&self) -> usize {
        self.published.load().tracks.len()
    }

    /// Whether the asset has no tracks
    pub fn is_empty(&self) -> bool {
        self.track_count() == 0
    }

    /// Length of the longest track
    pub fn duration(&self) -> Duration {
        self.published
            .load()
            .tracks
            .iter()
            .map(|track| track.duration())
            .max()
            .unwrap_or_default()
    }

    fn check(&self, arena: &SlotArena, id: TrackId) -> MediaResult<()> {
        if id.asset != self.id || !arena.contains(id) {
            return Err(MediaError::TrackNotFound { track_id: id });
        }
        Ok(())
    }

    fn resolve<'a>(&self, arena: &'a mut SlotArena, id: TrackId) -> MediaResult<&'a mut Track> {
        if id.asset != self.id {
            return Err(MediaError::TrackNotFound { track_id: id });
        }
        arena
            .get_mut(id)
            .ok_or(MediaError::TrackNotFound { track_id: id })
    }

    fn publish(&self, arena: &mut SlotArena) {
        self.published.store(Arc::new(arena.snapshot(self.id)));
    }
}

impl Default for MutableAsset {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_reuse_bumps_generation() {
        let asset = MutableAsset::new();
        let first = asset.add_track(MediaType::Audio).unwrap();
        asset.remove_track(first).unwrap();

        let second = asset.add_track(MediaType::Video).unwrap();
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(asset.track(first).is_none());
        assert_eq!(asset.track(second).unwrap().media_type(), MediaType::Video);
    }

    #[test]
    fn test_edit_copies_only_the_touched_track() {
        let asset = MutableAsset::new();
        let audio = asset.add_track(MediaType::Audio).unwrap();
        let video = asset.add_track(MediaType::Video).unwrap();
        let before = asset.tracks();

        asset
            .append_segment(audio, Segment::padding(Duration::from_millis(10)))
            .unwrap();
        let after = asset.tracks();

        assert!(Arc::ptr_eq(&before[1], &after[1]));
        assert!(!Arc::ptr_eq(&before[0], &after[0]));
        assert_eq!(before[0].segments().len(), 0);
        assert_eq!(after[0].segments().len(), 1);
        assert_eq!(after.find(video).unwrap().id(), video);
    }

    #[test]
    fn test_snapshot_from_other_asset_is_not_current() {
        let first = MutableAsset::new();
        let second = MutableAsset::new();
        first.add_track(MediaType::Audio).unwrap();
        second.add_track(MediaType::Audio).unwrap();

        assert_eq!(first.revision(), second.revision());
        assert!(first.is_current(&first.tracks()));
        assert!(!first.is_current(&second.tracks()));
        assert_eq!(second.tracks().asset_id(), second.id());
    }

    #[test]
    fn test_revision_only_moves_on_success() {
        let asset = MutableAsset::new();
        assert_eq!(asset.revision(), 0);

        asset.add_track(MediaType::Audio).unwrap();
        assert_eq!(asset.revision(), 1);

        assert!(asset.add_track("sprite").is_err());
        assert_eq!(asset.revision(), 1);
    }
}
