//! Error types for playback coordination

use crate::types::BackendKind;
use offline_audio::AudioError;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Download and in-memory fallback both failed; the entry is skipped
    #[error("Source unavailable for entry {entry_id}: {reason}")]
    SourceUnavailable { entry_id: String, reason: String },

    /// The previous backend stays authoritative
    #[error("Migration to {target} backend failed: {reason}")]
    BackendMigrationFailed { target: BackendKind, reason: String },

    /// Transport stays paused
    #[error("Engine failed to start: {0}")]
    EngineStartFailed(String),

    /// Queue is empty
    #[error("Queue is empty")]
    QueueEmpty,

    /// No track is currently loaded
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Index out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Catalog could not resolve a track reference
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// HTTP fetch failed
    #[error("Download error: {0}")]
    Download(String),

    /// Streaming player rejected a request
    #[error("Stream player error: {0}")]
    Player(String),

    /// Superseded by a newer request
    #[error("Operation cancelled")]
    Cancelled,

    /// Coordinator task has shut down
    #[error("Playback coordinator is closed")]
    CoordinatorClosed,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Equalizer or decoding error
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for PlaybackError {
    fn from(err: reqwest::Error) -> Self {
        Self::Download(err.to_string())
    }
}

impl From<config::ConfigError> for PlaybackError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
