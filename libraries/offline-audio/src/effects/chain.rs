/// Per-channel filter cascade
///
/// One [`BiquadFilter`] per band slot, applied in increasing slot order.
/// Everything here is fixed-size so the render thread can drive it.
use super::biquad::BiquadFilter;
use super::coefficients::BiquadCoefficients;
use super::equalizer::BAND_COUNT;

/// Cascade of six biquads for one audio channel
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelFilterChain {
    filters: [BiquadFilter; BAND_COUNT],
}

impl ChannelFilterChain {
    pub fn new(coefficients: &[BiquadCoefficients; BAND_COUNT]) -> Self {
        let mut chain = Self::default();
        chain.set_coefficients(coefficients);
        chain
    }

    /// Replace every section's coefficients without touching delay state
    pub fn set_coefficients(&mut self, coefficients: &[BiquadCoefficients; BAND_COUNT]) {
        for (filter, c) in self.filters.iter_mut().zip(coefficients) {
            filter.set_coefficients(*c);
        }
    }

    #[inline]
    pub fn process(&mut self, x: f64) -> f64 {
        self.filters.iter_mut().fold(x, |acc, filter| filter.process(acc))
    }

    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }

    pub fn filters(&self) -> &[BiquadFilter; BAND_COUNT] {
        &self.filters
    }
}
