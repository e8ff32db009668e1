//! Track abstractions and timeline segments

use crate::error::{MediaError, MediaResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Audio track
    Audio,
    /// Video track
    Video,
    /// Text/subtitle track
    Text,
}

impl MediaType {
    /// Numeric code used by foreign callers (1 = audio, 2 = video, 3 = text)
    pub fn code(&self) -> u32 {
        match self {
            MediaType::Audio => 1,
            MediaType::Video => 2,
            MediaType::Text => 3,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Audio => write!(f, "audio"),
            MediaType::Video => write!(f, "video"),
            MediaType::Text => write!(f, "text"),
        }
    }
}

impl FromStr for MediaType {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" => Ok(MediaType::Audio),
            "video" => Ok(MediaType::Video),
            "text" | "subtitle" => Ok(MediaType::Text),
            other => Err(MediaError::invalid_argument(format!(
                "unrecognized media type '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<&str> for MediaType {
    type Error = MediaError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<u32> for MediaType {
    type Error = MediaError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(MediaType::Audio),
            2 => Ok(MediaType::Video),
            3 => Ok(MediaType::Text),
            other => Err(MediaError::invalid_argument(format!(
                "unrecognized media type code {}",
                other
            ))),
        }
    }
}

/// Handle to a track slot inside one asset.
///
/// The generation changes every time a slot is reused, so a handle to a removed
/// track never resolves to the track that later takes its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId {
    pub(crate) asset: Uuid,
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl TrackId {
    /// Slot index inside the owning asset
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Identifier of the owning asset
    pub fn asset_id(&self) -> Uuid {
        self.asset
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.index, self.generation, self.asset)
    }
}

/// Half-open time range in a source's timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start offset
    pub start: Duration,
    /// Length of the range
    pub duration: Duration,
}

impl TimeRange {
    /// Create a new time range
    pub fn new(start: Duration, duration: Duration) -> Self {
        Self { start, duration }
    }

    /// End offset (exclusive)
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }
}

/// A piece of track content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    /// A time range of one stream inside an external source
    Source {
        /// Source locator, resolved by the loading layer
        uri: String,
        /// Stream index inside the source
        stream_index: usize,
        /// Portion of the stream to present
        range: TimeRange,
    },
    /// A gap rendered as silence or blank frames
    Padding {
        /// Gap length
        duration: Duration,
    },
}

impl Segment {
    /// Create a source segment
    pub fn source(uri: impl Into<String>, stream_index: usize, range: TimeRange) -> Self {
        Segment::Source {
            uri: uri.into(),
            stream_index,
            range,
        }
    }

    /// Create a padding segment
    pub fn padding(duration: Duration) -> Self {
        Segment::Padding { duration }
    }

    /// Presentation length of this segment
    pub fn duration(&self) -> Duration {
        match self {
            Segment::Source { range, .. } => range.duration,
            Segment::Padding { duration } => *duration,
        }
    }

    pub(crate) fn validate(&self) -> MediaResult<()> {
        if let Segment::Source { uri, .. } = self {
            if uri.trim().is_empty() {
                return Err(MediaError::invalid_argument("segment source uri is empty"));
            }
        }
        if self.duration().is_zero() {
            return Err(MediaError::invalid_argument("segment duration is zero"));
        }
        Ok(())
    }
}

/// One single-media-type stream within an asset.
///
/// Tracks are only created by [`MutableAsset::add_track`](crate::MutableAsset::add_track);
/// values handed out by the asset are copies.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    id: TrackId,
    media_type: MediaType,
    segments: Vec<Segment>,
}

impl Track {
    pub(crate) fn new(id: TrackId, media_type: MediaType) -> Self {
        Self {
            id,
            media_type,
            segments: Vec::new(),
        }
    }

    /// Get track ID
    pub fn id(&self) -> TrackId {
        self.id
    }

    /// Get media type
    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Track content in presentation order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Total presentation length
    pub fn duration(&self) -> Duration {
        self.segments.iter().map(Segment::duration).sum()
    }

    /// Whether the track has no content yet
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub(crate) fn push_segment(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub(crate) fn clear_segments(&mut self) {
        self.segments.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_parsing() {
        assert_eq!("audio".parse::<MediaType>().unwrap(), MediaType::Audio);
        assert_eq!(" Video ".parse::<MediaType>().unwrap(), MediaType::Video);
        assert_eq!(MediaType::try_from("subtitle").unwrap(), MediaType::Text);
        assert!(matches!(
            "midi".parse::<MediaType>(),
            Err(MediaError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_media_type_codes() {
        for media_type in [MediaType::Audio, MediaType::Video, MediaType::Text] {
            assert_eq!(MediaType::try_from(media_type.code()).unwrap(), media_type);
        }
        assert!(MediaType::try_from(0u32).is_err());
        assert!(MediaType::try_from(7u32).is_err());
    }

    #[test]
    fn test_segment_validation() {
        let ok = Segment::source(
            "file:///music/a.flac",
            0,
            TimeRange::new(Duration::ZERO, Duration::from_secs(3)),
        );
        assert!(ok.validate().is_ok());

        let empty_uri = Segment::source(
            "  ",
            0,
            TimeRange::new(Duration::ZERO, Duration::from_secs(1)),
        );
        assert!(empty_uri.validate().is_err());

        assert!(Segment::padding(Duration::ZERO).validate().is_err());
    }

    #[test]
    fn test_track_duration_sums_segments() {
        let id = TrackId {
            asset: Uuid::nil(),
            index: 0,
            generation: 0,
        };
        let mut track = Track::new(id, MediaType::Audio);
        assert!(track.is_empty());

        track.push_segment(Segment::padding(Duration::from_millis(500)));
        track.push_segment(Segment::source(
            "file:///a.wav",
            1,
            TimeRange::new(Duration::from_secs(10), Duration::from_secs(2)),
        ));

        assert_eq!(track.duration(), Duration::from_millis(2500));
        assert_eq!(track.segments().len(), 2);
    }
}
