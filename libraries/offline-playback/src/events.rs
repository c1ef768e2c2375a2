//! Playback Events
//!
//! Broadcast to every subscriber of the coordinator. Emitted on:
//! - Transport state changes
//! - Current entry changes
//! - Backend switches (after migration completes)
//! - Equalizer updates
//! - Skipped entries and non-fatal errors

use crate::error::PlaybackError;
use crate::types::{BackendKind, TransportState};
use offline_audio::effects::EqualizerSettings;
use std::sync::Arc;

/// Events emitted by the playback coordinator
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// Transport state changed
    StateChanged {
        /// The new state
        state: TransportState,
    },

    /// A different queue entry became current
    TrackChanged {
        /// ID of the new (current) entry
        entry_id: String,
        /// ID of the previous entry (if any)
        previous_entry_id: Option<String>,
    },

    /// Audio is now rendered by another backend
    BackendChanged { backend: BackendKind },

    /// Equalizer settings were replaced
    EqualizerChanged {
        settings: EqualizerSettings,
        revision: u64,
    },

    /// An entry could not be played and was skipped
    EntrySkipped { entry_id: String },

    /// Non-fatal error for the UI layer to surface
    Error { error: Arc<PlaybackError> },
}

impl PlaybackEvent {
    pub fn error(error: PlaybackError) -> Self {
        Self::Error {
            error: Arc::new(error),
        }
    }
}
