//! Equalizer DSP
//!
//! Coefficient synthesis, biquad sections, per-channel cascades, the
//! control-side [`EqualizerState`] and the render-side
//! [`RealtimeFilterStage`] that consumes its snapshots.
//!
//! All processing runs on interleaved `f32` buffers with `f64` filter state.

mod biquad;
mod chain;
mod coefficients;
mod equalizer;
mod snapshot;
mod stage;

pub use biquad::{BiquadFilter, ChannelState};
pub use chain::ChannelFilterChain;
pub use coefficients::{synthesize, BiquadCoefficients, FilterKind};
pub use equalizer::{
    default_q, flat_bands, slot_kind, BandSetting, EqPreset, EqualizerSettings, EqualizerState,
    BAND_COUNT, MAX_GAIN_DB, MIN_GAIN_DB, SLOT_FREQUENCIES,
};
pub use snapshot::{snapshot_channel, FilterSnapshot, SnapshotPublisher, SnapshotReader};
pub use stage::{RealtimeFilterStage, StageHandle, StageStatus};
