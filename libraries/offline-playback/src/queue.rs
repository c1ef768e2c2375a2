//! Play queue
//!
//! Ordered entries with a current index, shuffle flag and repeat mode.
//! The queue only decides *where* to move; the coordinator turns a
//! [`QueueStep::AtBoundary`] into "finished" or "restart".

use crate::error::{PlaybackError, Result};
use crate::types::{PlaybackEntry, RepeatMode};
use rand::Rng;

/// Outcome of a next/previous request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStep {
    /// Current index changed (or was re-picked by shuffle)
    Moved(usize),

    /// Hit the first/last entry with nowhere to wrap to
    AtBoundary,

    /// Nothing to move through
    Empty,
}

/// Queue of entries for playback
///
/// Invariant: `current` indexes into `entries` whenever `entries` is non-empty.
#[derive(Debug, Clone, Default)]
pub struct PlaybackQueue {
    entries: Vec<PlaybackEntry>,
    current: usize,
    shuffle_on: bool,
    repeat_mode: RepeatMode,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_modes(shuffle_on: bool, repeat_mode: RepeatMode) -> Self {
        Self {
            shuffle_on,
            repeat_mode,
            ..Self::default()
        }
    }

    /// Replace every entry and select `start_at`
    ///
    /// An empty list clears the queue. Nothing changes on error.
    pub fn set_entries(&mut self, entries: Vec<PlaybackEntry>, start_at: usize) -> Result<()> {
        if !entries.is_empty() && start_at >= entries.len() {
            return Err(PlaybackError::IndexOutOfBounds(start_at));
        }
        self.entries = entries;
        self.current = if self.entries.is_empty() { 0 } else { start_at };
        Ok(())
    }

    /// Queue containing only `entry`
    pub fn replace_with_single(&mut self, entry: PlaybackEntry) {
        self.entries = vec![entry];
        self.current = 0;
    }

    /// Append to the end, keeping the current index
    pub fn push(&mut self, entry: PlaybackEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current = 0;
    }

    pub fn entries(&self) -> &[PlaybackEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.current)
    }

    pub fn current(&self) -> Option<&PlaybackEntry> {
        self.entries.get(self.current)
    }

    pub fn set_current(&mut self, index: usize) -> Result<()> {
        if index >= self.entries.len() {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }
        self.current = index;
        Ok(())
    }

    pub fn shuffle_on(&self) -> bool {
        self.shuffle_on
    }

    pub fn set_shuffle(&mut self, on: bool) {
        self.shuffle_on = on;
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
    }

    /// Advance for `next()`
    ///
    /// Shuffle picks uniformly over every index, the current one included.
    /// Otherwise moves to `current + 1`, wrapping to 0 only with
    /// [`RepeatMode::All`].
    pub fn step_forward<R: Rng + ?Sized>(&mut self, rng: &mut R) -> QueueStep {
        let len = self.entries.len();
        if len == 0 {
            return QueueStep::Empty;
        }
        let target = if self.shuffle_on {
            Some(rng.gen_range(0..len))
        } else if self.current + 1 < len {
            Some(self.current + 1)
        } else if self.repeat_mode == RepeatMode::All {
            Some(0)
        } else {
            None
        };
        self.move_to(target)
    }

    /// Mirror of [`Self::step_forward`] for `prev()`
    pub fn step_back<R: Rng + ?Sized>(&mut self, rng: &mut R) -> QueueStep {
        let len = self.entries.len();
        if len == 0 {
            return QueueStep::Empty;
        }
        let target = if self.shuffle_on {
            Some(rng.gen_range(0..len))
        } else if self.current > 0 {
            Some(self.current - 1)
        } else if self.repeat_mode == RepeatMode::All {
            Some(len - 1)
        } else {
            None
        };
        self.move_to(target)
    }

    fn move_to(&mut self, target: Option<usize>) -> QueueStep {
        match target {
            Some(index) => {
                self.current = index;
                QueueStep::Moved(index)
            }
            None => QueueStep::AtBoundary,
        }
    }
}
