//! Core types for playback coordination

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Where an entry's audio comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceRef {
    /// Track in the remote catalog, resolved to a stream URL on demand
    Remote { track_id: String },

    /// File already on disk
    LocalFile(PathBuf),
}

/// One item of the play queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackEntry {
    /// Unique entry identifier
    pub id: String,

    pub source: SourceRef,

    pub title: String,

    pub artist: String,

    /// Artwork URL or path (optional)
    pub artwork: Option<String>,
}

impl PlaybackEntry {
    pub fn remote(
        id: impl Into<String>,
        track_id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: SourceRef::Remote {
                track_id: track_id.into(),
            },
            title: title.into(),
            artist: artist.into(),
            artwork: None,
        }
    }

    pub fn local(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        title: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: SourceRef::LocalFile(path.into()),
            title: title.into(),
            artist: artist.into(),
            artwork: None,
        }
    }

    pub fn with_artwork(mut self, artwork: impl Into<String>) -> Self {
        self.artwork = Some(artwork.into());
        self
    }

    pub fn now_playing(&self) -> NowPlayingMeta {
        NowPlayingMeta {
            entry_id: self.id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            artwork: self.artwork.clone(),
        }
    }
}

/// Display metadata for the current entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlayingMeta {
    pub entry_id: String,
    pub title: String,
    pub artist: String,
    pub artwork: Option<String>,
}

/// Repeat mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop when queue ends
    #[default]
    Off,

    /// Loop current track only
    One,

    /// Loop entire queue
    All,
}

/// Transport state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    /// Queue is empty
    #[default]
    Idle,

    /// Entry selected, not playing yet
    Loaded,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,

    /// Reached the end of the queue with repeat off
    Finished,
}

impl TransportState {
    pub fn is_playing(self) -> bool {
        self == Self::Playing
    }

    /// States in which a seek is accepted
    pub fn accepts_seek(self) -> bool {
        matches!(self, Self::Loaded | Self::Playing | Self::Paused)
    }
}

/// Which of the two playback engines renders audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// OS streaming player, no DSP
    DirectStream,

    /// Local decode with the equalizer stage in the render graph
    Engine,
}

impl BackendKind {
    /// The engine hosts the equalizer, so it is used exactly when the equalizer is on
    pub fn for_equalizer(is_on: bool) -> Self {
        if is_on {
            Self::Engine
        } else {
            Self::DirectStream
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectStream => f.write_str("direct-stream"),
            Self::Engine => f.write_str("engine"),
        }
    }
}

/// Periodic position report for the UI layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub current_time: Duration,
    pub duration: Duration,
    pub buffered_time: Duration,
    pub is_playing: bool,
    pub state: TransportState,
    pub now_playing: Option<NowPlayingMeta>,
    /// Index of the current entry in the queue
    pub queue_index: Option<usize>,
    pub backend: Option<BackendKind>,
    pub repeat: RepeatMode,
    pub shuffle: bool,
}
