/// Real-time filter stage
///
/// Sits inside the host render callback. Holds one [`ChannelFilterChain`]
/// per channel and pulls the latest [`FilterSnapshot`] at the start of
/// every buffer.
///
/// # Real-Time Constraints
/// `process` takes no locks, never allocates and never performs I/O.
/// Chains are sized in [`RealtimeFilterStage::prepare`] or
/// [`RealtimeFilterStage::adopt`], which run off the render thread. A
/// snapshot published for a different format is not applied by `process`;
/// it raises [`StageStatus::REBUILD_PENDING`] for the control domain.
use super::chain::ChannelFilterChain;
use super::coefficients::BiquadCoefficients;
use super::equalizer::BAND_COUNT;
use super::snapshot::{FilterSnapshot, SnapshotReader};
use crate::error::Result;
use crate::format::StreamFormat;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Condition flags raised by the render thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StageStatus(u8);

impl StageStatus {
    /// Host format had a zero sample rate or channel count
    pub const FORMAT_UNAVAILABLE: Self = Self(0b01);
    /// A snapshot for another format is waiting for an off-thread rebuild
    pub const REBUILD_PENDING: Self = Self(0b10);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Flags set in `self` but not in `previous`
    pub const fn raised_since(self, previous: Self) -> Self {
        Self(self.0 & !previous.0)
    }
}

impl std::ops::BitOr for StageStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Default)]
struct StageShared {
    status: AtomicU8,
    reset_requested: AtomicBool,
    adopted_revision: AtomicU64,
}

/// Control-domain view of a stage running on another thread
#[derive(Debug, Clone, Default)]
pub struct StageHandle {
    shared: Arc<StageShared>,
}

impl StageHandle {
    pub fn status(&self) -> StageStatus {
        StageStatus(self.shared.status.load(Ordering::Acquire))
    }

    /// Zero every delay register at the next buffer boundary
    ///
    /// Used on seek and track change.
    pub fn request_reset(&self) {
        self.shared.reset_requested.store(true, Ordering::Release);
    }

    /// Revision of the snapshot the stage is currently running
    pub fn adopted_revision(&self) -> u64 {
        self.shared.adopted_revision.load(Ordering::Acquire)
    }

    fn raise(&self, flag: StageStatus) {
        self.shared.status.fetch_or(flag.0, Ordering::AcqRel);
    }

    fn clear(&self, flag: StageStatus) {
        self.shared.status.fetch_and(!flag.0, Ordering::AcqRel);
    }
}

/// Equalizer processing unit for the render callback
pub struct RealtimeFilterStage {
    reader: SnapshotReader,
    handle: StageHandle,
    format: Option<StreamFormat>,
    chains: Vec<ChannelFilterChain>,
    active: Option<FilterSnapshot>,
}

impl RealtimeFilterStage {
    pub fn new(reader: SnapshotReader) -> Self {
        Self {
            reader,
            handle: StageHandle::default(),
            format: None,
            chains: Vec::new(),
            active: None,
        }
    }

    pub fn handle(&self) -> StageHandle {
        self.handle.clone()
    }

    pub fn format(&self) -> Option<StreamFormat> {
        self.format
    }

    pub fn active_snapshot(&self) -> Option<&FilterSnapshot> {
        self.active.as_ref()
    }

    /// Size the chains for the host format. Off the render thread only.
    ///
    /// On an unusable format the stage drops its chains, raises
    /// `FORMAT_UNAVAILABLE` and passes audio through until prepared again.
    pub fn prepare(&mut self, format: StreamFormat) -> Result<()> {
        let format = match format.validate() {
            Ok(format) => format,
            Err(err) => {
                warn!(
                    sample_rate = format.sample_rate,
                    channels = format.channels,
                    "Render format unavailable, equalizer bypassed"
                );
                self.format = None;
                self.chains.clear();
                self.active = None;
                self.handle.raise(StageStatus::FORMAT_UNAVAILABLE);
                return Err(err);
            }
        };
        self.handle.clear(StageStatus::FORMAT_UNAVAILABLE);

        if self.format != Some(format) {
            self.rebuild(format, &[BiquadCoefficients::IDENTITY; BAND_COUNT]);
            self.active = None;
        }

        if let Some(latest) = self.reader.latest() {
            if latest.format == format {
                self.adopt(&latest);
            }
        }
        Ok(())
    }

    /// Make `snapshot` the active one. Off the render thread only.
    ///
    /// A format change rebuilds every chain and zeroes its state; otherwise
    /// coefficients are swapped in place and delay state is kept.
    pub fn adopt(&mut self, snapshot: &FilterSnapshot) {
        if self.format == Some(snapshot.format) {
            self.adopt_in_place(snapshot);
            return;
        }
        debug!(
            revision = snapshot.revision,
            sample_rate = snapshot.sample_rate(),
            channels = snapshot.channel_count(),
            "Rebuilding filter chains"
        );
        self.rebuild(snapshot.format, &snapshot.coefficients);
        self.active = Some(*snapshot);
        self.handle
            .clear(StageStatus::REBUILD_PENDING | StageStatus::FORMAT_UNAVAILABLE);
        self.handle
            .shared
            .adopted_revision
            .store(snapshot.revision, Ordering::Release);
    }

    /// Filter `frame_count` interleaved frames of `buffer` in place
    pub fn process(&mut self, buffer: &mut [f32], frame_count: usize) {
        if self.handle.shared.reset_requested.swap(false, Ordering::AcqRel) {
            for chain in &mut self.chains {
                chain.reset();
            }
        }

        if let Some(latest) = self.reader.latest() {
            let newer = match self.active {
                Some(active) => latest.revision > active.revision,
                None => true,
            };
            if newer {
                if self.format == Some(latest.format) {
                    self.adopt_in_place(&latest);
                } else {
                    self.handle.raise(StageStatus::REBUILD_PENDING);
                }
            }
        }

        let Some(active) = self.active else {
            return;
        };
        if !active.is_on || self.chains.is_empty() {
            return;
        }

        let channels = self.chains.len();
        for frame in buffer.chunks_exact_mut(channels).take(frame_count) {
            for (sample, chain) in frame.iter_mut().zip(self.chains.iter_mut()) {
                *sample = chain.process(f64::from(*sample)) as f32;
            }
        }
    }

    /// Zero every delay register now
    pub fn reset(&mut self) {
        for chain in &mut self.chains {
            chain.reset();
        }
    }

    fn adopt_in_place(&mut self, snapshot: &FilterSnapshot) {
        for chain in &mut self.chains {
            chain.set_coefficients(&snapshot.coefficients);
        }
        self.active = Some(*snapshot);
        self.handle.clear(StageStatus::REBUILD_PENDING);
        self.handle
            .shared
            .adopted_revision
            .store(snapshot.revision, Ordering::Release);
    }

    fn rebuild(&mut self, format: StreamFormat, coefficients: &[BiquadCoefficients; BAND_COUNT]) {
        self.chains = vec![ChannelFilterChain::new(coefficients); usize::from(format.channels)];
        self.format = Some(format);
    }
}
