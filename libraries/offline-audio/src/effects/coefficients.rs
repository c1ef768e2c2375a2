/// Biquad coefficient synthesis
///
/// RBJ cookbook formulas for the three band kinds the equalizer uses.
/// Pure functions, safe to call from any thread.
use crate::error::{AudioError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Filter kind for an equalizer band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    /// Low shelf - boosts/cuts below frequency
    LowShelf,
    /// Peaking - boosts/cuts around frequency with Q bandwidth
    Peaking,
    /// High shelf - boosts/cuts above frequency
    HighShelf,
}

/// Normalized biquad coefficients (`a0` is implicitly 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoefficients {
    /// Pass-through filter
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Both poles strictly inside the unit circle.
    ///
    /// For `z^2 + a1 z + a2` that is the stability triangle
    /// `|a2| < 1` and `|a1| < 1 + a2`.
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    /// Magnitude response in dB at `freq_hz`
    pub fn magnitude_db(&self, freq_hz: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq_hz / sample_rate;
        let (cos1, sin1) = (w.cos(), w.sin());
        let (cos2, sin2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * cos1 + self.b2 * cos2;
        let num_im = -(self.b1 * sin1 + self.b2 * sin2);
        let den_re = 1.0 + self.a1 * cos1 + self.a2 * cos2;
        let den_im = -(self.a1 * sin1 + self.a2 * sin2);

        let num = (num_re * num_re + num_im * num_im).sqrt();
        let den = (den_re * den_re + den_im * den_im).sqrt();
        20.0 * (num / den).log10()
    }
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Synthesize normalized coefficients for one band.
///
/// Returns [`BiquadCoefficients::IDENTITY`] exactly when `gain_db == 0`.
///
/// # Errors
/// `InvalidFilterParameter` when `sample_rate <= 0`, `freq_hz <= 0`,
/// `freq_hz >= sample_rate / 2`, `q <= 0`, or any input is not finite.
pub fn synthesize(
    kind: FilterKind,
    freq_hz: f64,
    gain_db: f64,
    q: f64,
    sample_rate: f64,
) -> Result<BiquadCoefficients> {
    validate(freq_hz, gain_db, q, sample_rate)?;

    if gain_db == 0.0 {
        return Ok(BiquadCoefficients::IDENTITY);
    }

    let a = 10.0_f64.powf(gain_db / 40.0);
    let w0 = 2.0 * PI * freq_hz / sample_rate;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);

    let (b0, b1, b2, a0, a1, a2) = match kind {
        FilterKind::Peaking => (
            1.0 + alpha * a,
            -2.0 * cos_w0,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w0,
            1.0 - alpha / a,
        ),
        FilterKind::LowShelf => {
            let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
            (
                a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
            )
        }
        FilterKind::HighShelf => {
            let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
            (
                a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
            )
        }
    };

    Ok(BiquadCoefficients {
        b0: b0 / a0,
        b1: b1 / a0,
        b2: b2 / a0,
        a1: a1 / a0,
        a2: a2 / a0,
    })
}

fn validate(freq_hz: f64, gain_db: f64, q: f64, sample_rate: f64) -> Result<()> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(AudioError::invalid(
            "sample_rate",
            sample_rate,
            "must be positive",
        ));
    }
    if !freq_hz.is_finite() || freq_hz <= 0.0 {
        return Err(AudioError::invalid("frequency", freq_hz, "must be positive"));
    }
    if freq_hz >= sample_rate / 2.0 {
        return Err(AudioError::invalid(
            "frequency",
            freq_hz,
            "must be below Nyquist",
        ));
    }
    if !q.is_finite() || q <= 0.0 {
        return Err(AudioError::invalid("q", q, "must be positive"));
    }
    if !gain_db.is_finite() {
        return Err(AudioError::invalid("gain_db", gain_db, "must be finite"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KINDS: [FilterKind; 3] = [
        FilterKind::LowShelf,
        FilterKind::Peaking,
        FilterKind::HighShelf,
    ];

    #[test]
    fn zero_gain_is_identity_for_every_kind() {
        for kind in KINDS {
            let c = synthesize(kind, 1000.0, 0.0, 1.0, 44100.0).unwrap();
            assert_eq!(c, BiquadCoefficients::IDENTITY, "{:?}", kind);
        }
    }

    #[test]
    fn peaking_matches_cookbook() {
        let c = synthesize(FilterKind::Peaking, 1000.0, 6.0, 1.0, 48000.0).unwrap();

        let a = 10.0_f64.powf(6.0 / 40.0);
        let w0 = 2.0 * PI * 1000.0 / 48000.0;
        let alpha = w0.sin() / 2.0;
        let a0 = 1.0 + alpha / a;

        assert!((c.b0 - (1.0 + alpha * a) / a0).abs() < 1e-12);
        assert!((c.b1 - (-2.0 * w0.cos()) / a0).abs() < 1e-12);
        assert!((c.a1 - c.b1).abs() < 1e-12);
        assert!((c.a2 - (1.0 - alpha / a) / a0).abs() < 1e-12);
    }

    #[test]
    fn peaking_gain_lands_at_center() {
        let c = synthesize(FilterKind::Peaking, 1000.0, 9.0, 1.0, 44100.0).unwrap();
        let db = c.magnitude_db(1000.0, 44100.0);
        assert!((db - 9.0).abs() < 0.01, "got {} dB", db);
    }

    #[test]
    fn shelves_apply_gain_on_their_side() {
        let low = synthesize(FilterKind::LowShelf, 200.0, 12.0, 0.9, 44100.0).unwrap();
        assert!((low.magnitude_db(10.0, 44100.0) - 12.0).abs() < 0.1);
        assert!(low.magnitude_db(15000.0, 44100.0).abs() < 0.1);

        let high = synthesize(FilterKind::HighShelf, 4000.0, -12.0, 0.8, 44100.0).unwrap();
        assert!((high.magnitude_db(20000.0, 44100.0) + 12.0).abs() < 0.2);
        assert!(high.magnitude_db(50.0, 44100.0).abs() < 0.1);
    }

    #[test]
    fn rejects_bad_parameters() {
        let bad = [
            (0.0, 1.0, 44100.0),
            (-5.0, 1.0, 44100.0),
            (22050.0, 1.0, 44100.0),
            (30000.0, 1.0, 44100.0),
            (1000.0, 0.0, 44100.0),
            (1000.0, -1.0, 44100.0),
            (1000.0, 1.0, 0.0),
            (1000.0, 1.0, f64::NAN),
        ];
        for (freq, q, sr) in bad {
            let result = synthesize(FilterKind::Peaking, freq, 3.0, q, sr);
            assert!(
                matches!(result, Err(AudioError::InvalidFilterParameter { .. })),
                "({}, {}, {}) should be rejected",
                freq,
                q,
                sr
            );
        }
    }

    #[test]
    fn zero_gain_still_validates() {
        assert!(synthesize(FilterKind::LowShelf, 30000.0, 0.0, 1.0, 44100.0).is_err());
    }

    proptest! {
        #[test]
        fn identity_at_zero_db_for_any_valid_input(
            kind in prop::sample::select(KINDS.to_vec()),
            sample_rate in 8000.0f64..192000.0,
            freq_fraction in 0.0001f64..0.4999,
            q in 0.05f64..20.0,
        ) {
            let freq = sample_rate * freq_fraction;
            let c = synthesize(kind, freq, 0.0, q, sample_rate).unwrap();
            prop_assert_eq!(c, BiquadCoefficients::IDENTITY);
        }
    }
}
