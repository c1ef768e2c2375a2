//! Filter snapshots and their handoff to the render thread
//!
//! The control domain builds an immutable [`FilterSnapshot`] per
//! equalizer revision and swaps it into an `ArcSwapOption`. The render
//! thread copies the latest one out at the start of each buffer, so it
//! never blocks and never sees half of one publication mixed with another.

use super::coefficients::{synthesize, BiquadCoefficients};
use super::equalizer::{EqualizerSettings, BAND_COUNT};
use crate::error::Result;
use crate::format::StreamFormat;
use arc_swap::ArcSwapOption;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Retired snapshots kept alive by the publisher so the last reference
/// to a snapshot is released on the control thread.
const RETAINED_SNAPSHOTS: usize = 4;

/// Coefficients for all six bands at one format
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSnapshot {
    pub revision: u64,
    pub is_on: bool,
    pub format: StreamFormat,
    pub coefficients: [BiquadCoefficients; BAND_COUNT],
}

impl FilterSnapshot {
    /// Synthesize every band for `format`.
    ///
    /// A band whose frequency sits at or above Nyquist for `format` cannot be
    /// represented and is left as an identity section.
    pub fn build(
        revision: u64,
        settings: &EqualizerSettings,
        format: StreamFormat,
    ) -> Result<Self> {
        let format = format.validate()?;
        let sample_rate = f64::from(format.sample_rate);
        let nyquist = sample_rate / 2.0;

        let mut coefficients = [BiquadCoefficients::IDENTITY; BAND_COUNT];
        for (slot, band) in settings.bands.iter().enumerate() {
            if band.frequency_hz >= nyquist {
                debug!(
                    slot,
                    frequency = band.frequency_hz,
                    sample_rate = format.sample_rate,
                    "Band above Nyquist, leaving it flat"
                );
                continue;
            }
            coefficients[slot] =
                synthesize(band.kind(), band.frequency_hz, band.gain_db, band.q, sample_rate)?;
        }

        Ok(Self {
            revision,
            is_on: settings.is_on,
            format,
            coefficients,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.format.channels
    }
}

/// Create a connected publisher/reader pair
pub fn snapshot_channel() -> (SnapshotPublisher, SnapshotReader) {
    let slot = Arc::new(ArcSwapOption::new(None));
    (
        SnapshotPublisher {
            slot: Arc::clone(&slot),
            retired: VecDeque::with_capacity(RETAINED_SNAPSHOTS + 1),
        },
        SnapshotReader { slot },
    )
}

/// Writing side, owned by the control domain
pub struct SnapshotPublisher {
    slot: Arc<ArcSwapOption<FilterSnapshot>>,
    retired: VecDeque<Arc<FilterSnapshot>>,
}

impl SnapshotPublisher {
    pub fn publish(&mut self, snapshot: FilterSnapshot) {
        if let Some(old) = self.slot.swap(Some(Arc::new(snapshot))) {
            self.retired.push_back(old);
            while self.retired.len() > RETAINED_SNAPSHOTS {
                self.retired.pop_front();
            }
        }
    }
}

/// Reading side, safe to poll from the render thread
#[derive(Clone)]
pub struct SnapshotReader {
    slot: Arc<ArcSwapOption<FilterSnapshot>>,
}

impl SnapshotReader {
    /// Copy of the most recently published snapshot
    #[inline]
    pub fn latest(&self) -> Option<FilterSnapshot> {
        self.slot.load().as_deref().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::equalizer::flat_bands;

    #[test]
    fn empty_until_first_publish() {
        let (mut publisher, reader) = snapshot_channel();
        assert!(reader.latest().is_none());

        let snapshot =
            FilterSnapshot::build(1, &EqualizerSettings::default(), StreamFormat::new(44100, 2))
                .unwrap();
        publisher.publish(snapshot);
        assert_eq!(reader.latest(), Some(snapshot));
    }

    #[test]
    fn high_shelf_above_nyquist_stays_flat() {
        let mut bands = flat_bands();
        bands[5].gain_db = 6.0;
        bands[0].gain_db = 6.0;
        let settings = EqualizerSettings { is_on: true, bands };

        let snapshot = FilterSnapshot::build(1, &settings, StreamFormat::new(22050, 1)).unwrap();
        assert_eq!(snapshot.coefficients[5], BiquadCoefficients::IDENTITY);
        assert_ne!(snapshot.coefficients[0], BiquadCoefficients::IDENTITY);
    }

    #[test]
    fn build_rejects_unusable_format() {
        let result = FilterSnapshot::build(1, &EqualizerSettings::default(), StreamFormat::new(0, 0));
        assert!(result.is_err());
    }
}
