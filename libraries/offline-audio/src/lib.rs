//! Offline Player Audio
//!
//! Equalizer DSP and local-file decoding for Offline Player.
//!
//! This crate provides:
//! - Six-band parametric equalizer (RBJ biquads, `f64` state)
//! - Lock-free snapshot handoff from the control domain to the render thread
//! - A real-time filter stage for host render callbacks
//! - Audio decoding via Symphonia (MP3, FLAC, OGG, WAV, AAC)
//!
//! # Example: Equalizer in a render callback
//!
//! ```rust
//! use offline_audio::effects::{EqPreset, EqualizerState, RealtimeFilterStage};
//! use offline_audio::StreamFormat;
//!
//! # fn example() -> offline_audio::Result<()> {
//! let format = StreamFormat::new(44100, 2);
//!
//! // Control domain
//! let mut eq = EqualizerState::new();
//! eq.set_render_format(format)?;
//! eq.apply_preset(&EqPreset::find("Bass Boost").expect("built-in preset"))?;
//! eq.set_on(true)?;
//!
//! // Render thread
//! let mut stage = RealtimeFilterStage::new(eq.reader());
//! stage.prepare(format)?;
//! let mut buffer = vec![0.0_f32; 512 * 2];
//! stage.process(&mut buffer, 512);
//! # Ok(())
//! # }
//! ```

mod decoder;
pub mod effects;
mod error;
mod format;

pub use decoder::{DecodedTrack, SymphoniaDecoder, TrackDecoder};
pub use error::{AudioError, Result};
pub use format::StreamFormat;
