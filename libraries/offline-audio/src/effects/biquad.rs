/// Single second-order IIR section
///
/// Transposed direct form: two delay registers per section, coefficients
/// normalized so `a0 == 1`.
use super::coefficients::BiquadCoefficients;

/// Delay registers of one biquad section on one channel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelState {
    pub z1: f64,
    pub z2: f64,
}

/// Stateful biquad filter
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadFilter {
    coefficients: BiquadCoefficients,
    state: ChannelState,
}

impl BiquadFilter {
    pub fn new(coefficients: BiquadCoefficients) -> Self {
        Self {
            coefficients,
            state: ChannelState::default(),
        }
    }

    pub fn coefficients(&self) -> &BiquadCoefficients {
        &self.coefficients
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Swap coefficients, keeping the delay registers
    pub fn set_coefficients(&mut self, coefficients: BiquadCoefficients) {
        self.coefficients = coefficients;
    }

    /// Process one sample
    #[inline]
    pub fn process(&mut self, x: f64) -> f64 {
        let c = &self.coefficients;
        let y = c.b0 * x + self.state.z1;
        self.state.z1 = c.b1 * x - c.a1 * y + self.state.z2;
        self.state.z2 = c.b2 * x - c.a2 * y;
        y
    }

    /// Zero the delay registers
    pub fn reset(&mut self) {
        self.state = ChannelState::default();
    }
}
