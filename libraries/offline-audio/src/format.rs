//! Stream format reported by the host or the decoder

use crate::error::{AudioError, Result};
use serde::{Deserialize, Serialize};

/// Sample rate and channel layout of an interleaved `f32` stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamFormat {
    /// Frames per second
    pub sample_rate: u32,
    /// Interleaved channels per frame (1 = mono, 2 = stereo, ...)
    pub channels: u16,
}

impl StreamFormat {
    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// A format the filter stage can run with
    pub fn is_usable(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0
    }

    /// Reject formats with a zero sample rate or channel count
    pub fn validate(self) -> Result<Self> {
        if self.is_usable() {
            Ok(self)
        } else {
            Err(AudioError::FormatUnavailable {
                sample_rate: self.sample_rate,
                channels: self.channels,
            })
        }
    }
}
