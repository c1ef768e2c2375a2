/// Audio-specific errors
use thiserror::Error;

/// Result type alias using `AudioError`
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Filter parameters that would produce unstable or undefined coefficients
    #[error("Invalid filter parameter: {parameter} = {value} ({reason})")]
    InvalidFilterParameter {
        parameter: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// The host reported a zero sample rate or channel count
    #[error("Format unavailable: {sample_rate} Hz, {channels} channels")]
    FormatUnavailable { sample_rate: u32, channels: u16 },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Decoding error
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Symphonia error
    #[error("Symphonia error: {0}")]
    Symphonia(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

impl AudioError {
    pub(crate) fn invalid(parameter: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidFilterParameter {
            parameter,
            value,
            reason,
        }
    }
}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
