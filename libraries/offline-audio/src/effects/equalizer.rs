/// Six-band equalizer state
///
/// Control-domain source of truth for the equalizer. Every mutation bumps
/// the revision and republishes a [`FilterSnapshot`] for the render thread
/// once a render format is known.
use super::coefficients::FilterKind;
use super::snapshot::{snapshot_channel, FilterSnapshot, SnapshotPublisher, SnapshotReader};
use crate::error::{AudioError, Result};
use crate::format::StreamFormat;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of band slots
pub const BAND_COUNT: usize = 6;

/// Center (or corner) frequency of each slot in Hz
pub const SLOT_FREQUENCIES: [f64; BAND_COUNT] = [60.0, 150.0, 400.0, 1000.0, 2400.0, 15000.0];

/// Lowest accepted gain in dB
pub const MIN_GAIN_DB: f64 = -12.0;
/// Highest accepted gain in dB
pub const MAX_GAIN_DB: f64 = 12.0;

/// Filter kind for a slot: first is a low shelf, last is a high shelf
pub fn slot_kind(slot: usize) -> FilterKind {
    match slot {
        0 => FilterKind::LowShelf,
        s if s == BAND_COUNT - 1 => FilterKind::HighShelf,
        _ => FilterKind::Peaking,
    }
}

/// Q a slot gets when a preset is applied
pub fn default_q(slot: usize) -> f64 {
    match slot {
        0 => 0.9,
        s if s == BAND_COUNT - 1 => 0.8,
        _ => 1.0,
    }
}

/// One band slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandSetting {
    pub slot: usize,
    pub frequency_hz: f64,
    pub gain_db: f64,
    pub q: f64,
}

impl BandSetting {
    /// Flat band with the slot's default Q; `slot` must be below `BAND_COUNT`
    pub(crate) fn flat(slot: usize) -> Self {
        Self {
            slot,
            frequency_hz: SLOT_FREQUENCIES[slot],
            gain_db: 0.0,
            q: default_q(slot),
        }
    }

    pub fn with_gain(mut self, gain_db: f64) -> Self {
        self.gain_db = gain_db;
        self
    }

    pub fn with_q(mut self, q: f64) -> Self {
        self.q = q;
        self
    }

    pub fn kind(&self) -> FilterKind {
        slot_kind(self.slot)
    }

    fn validate(&self, position: usize) -> Result<()> {
        if self.slot != position {
            return Err(AudioError::invalid(
                "slot",
                self.slot as f64,
                "must match band position",
            ));
        }
        if self.frequency_hz != SLOT_FREQUENCIES[position] {
            return Err(AudioError::invalid(
                "frequency",
                self.frequency_hz,
                "slot frequencies are fixed",
            ));
        }
        validate_gain(self.gain_db)?;
        if !self.q.is_finite() || self.q <= 0.0 {
            return Err(AudioError::invalid("q", self.q, "must be positive"));
        }
        Ok(())
    }
}

fn validate_gain(gain_db: f64) -> Result<()> {
    if !(MIN_GAIN_DB..=MAX_GAIN_DB).contains(&gain_db) {
        return Err(AudioError::invalid(
            "gain_db",
            gain_db,
            "must be within -12..=12 dB",
        ));
    }
    Ok(())
}

/// All six slots at 0 dB
pub fn flat_bands() -> [BandSetting; BAND_COUNT] {
    std::array::from_fn(BandSetting::flat)
}

/// Named gain curve over the six slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqPreset {
    pub name: String,
    pub gains_db: [f64; BAND_COUNT],
}

impl EqPreset {
    pub fn new(name: impl Into<String>, gains_db: [f64; BAND_COUNT]) -> Self {
        Self {
            name: name.into(),
            gains_db,
        }
    }

    /// Presets shipped with the player
    pub fn built_in() -> Vec<EqPreset> {
        vec![
            Self::new("Default", [0.0; BAND_COUNT]),
            Self::new("Rock", [3.0, 2.0, -2.0, -1.0, 2.0, 3.0]),
            Self::new("Pop", [2.0, 1.0, -1.0, 0.0, 2.0, 3.0]),
            Self::new("Jazz", [0.0, 1.0, 2.0, 1.0, 0.0, 1.0]),
            Self::new("Acoustic", [1.0, 2.0, 0.0, 0.0, 1.0, 2.0]),
            Self::new("Bass Boost", [4.0, 2.0, 0.0, 0.0, 0.0, 0.0]),
            Self::new("Treble Boost", [0.0, 0.0, 0.0, 1.0, 3.0, 4.0]),
            Self::new("Vocal", [-2.0, 0.0, 1.0, 3.0, 3.0, 2.0]),
        ]
    }

    /// Look up a built-in preset by name (case-insensitive)
    pub fn find(name: &str) -> Option<EqPreset> {
        Self::built_in()
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// Plain copy of the user-facing settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqualizerSettings {
    pub is_on: bool,
    pub bands: [BandSetting; BAND_COUNT],
}

impl Default for EqualizerSettings {
    fn default() -> Self {
        Self {
            is_on: false,
            bands: flat_bands(),
        }
    }
}

/// Equalizer owned by the control domain
///
/// Created flat and off. Readers obtained from [`EqualizerState::reader`]
/// see every snapshot this state publishes.
pub struct EqualizerState {
    settings: EqualizerSettings,
    revision: u64,
    render_format: Option<StreamFormat>,
    publisher: SnapshotPublisher,
    reader: SnapshotReader,
}

impl EqualizerState {
    pub fn new() -> Self {
        let (publisher, reader) = snapshot_channel();
        Self {
            settings: EqualizerSettings::default(),
            revision: 0,
            render_format: None,
            publisher,
            reader,
        }
    }

    pub fn is_on(&self) -> bool {
        self.settings.is_on
    }

    pub fn bands(&self) -> &[BandSetting; BAND_COUNT] {
        &self.settings.bands
    }

    pub fn settings(&self) -> EqualizerSettings {
        self.settings
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn render_format(&self) -> Option<StreamFormat> {
        self.render_format
    }

    /// A consumer handle for the render thread
    pub fn reader(&self) -> SnapshotReader {
        self.reader.clone()
    }

    pub fn set_on(&mut self, is_on: bool) -> Result<()> {
        self.settings.is_on = is_on;
        self.commit()
    }

    /// Replace all six bands. Nothing changes if any band is invalid.
    pub fn set_bands(&mut self, bands: [BandSetting; BAND_COUNT]) -> Result<()> {
        for (position, band) in bands.iter().enumerate() {
            band.validate(position)?;
        }
        self.settings.bands = bands;
        self.commit()
    }

    /// Set both the on flag and the bands as one revision
    pub fn set_equalizer(&mut self, is_on: bool, bands: [BandSetting; BAND_COUNT]) -> Result<()> {
        for (position, band) in bands.iter().enumerate() {
            band.validate(position)?;
        }
        self.settings = EqualizerSettings { is_on, bands };
        self.commit()
    }

    pub fn set_band_gain(&mut self, slot: usize, gain_db: f64) -> Result<()> {
        if slot >= BAND_COUNT {
            return Err(AudioError::invalid("slot", slot as f64, "out of range"));
        }
        validate_gain(gain_db)?;
        self.settings.bands[slot].gain_db = gain_db;
        self.commit()
    }

    /// Apply preset gains and restore every slot's default Q
    pub fn apply_preset(&mut self, preset: &EqPreset) -> Result<()> {
        for gain in preset.gains_db {
            validate_gain(gain)?;
        }
        for (slot, band) in self.settings.bands.iter_mut().enumerate() {
            band.gain_db = preset.gains_db[slot];
            band.q = default_q(slot);
        }
        debug!(preset = %preset.name, "Applied equalizer preset");
        self.commit()
    }

    /// Record the format the render graph runs at and republish for it
    pub fn set_render_format(&mut self, format: StreamFormat) -> Result<()> {
        let format = format.validate()?;
        self.render_format = Some(format);
        self.commit()
    }

    /// Snapshot of the current settings at the render format, if one is set
    pub fn snapshot(&self) -> Option<Result<FilterSnapshot>> {
        self.render_format
            .map(|format| FilterSnapshot::build(self.revision, &self.settings, format))
    }

    fn commit(&mut self) -> Result<()> {
        self.revision += 1;
        if let Some(snapshot) = self.snapshot() {
            let snapshot = snapshot?;
            self.publisher.publish(snapshot);
            debug!(
                revision = self.revision,
                is_on = self.settings.is_on,
                "Published filter snapshot"
            );
        }
        Ok(())
    }
}

impl Default for EqualizerState {
    fn default() -> Self {
        Self::new()
    }
}
