//! Error types for spectrum analysis

use thiserror::Error;

/// Why a signal was rejected before any transform work started
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum InvalidSignalReason {
    #[error("Input signal cannot be empty")]
    EmptySamples,

    #[error("Sample spacing must be positive (got {0})")]
    NonPositiveInterval(f64),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpectrumError {
    #[error("Invalid signal: {0}")]
    InvalidSignal(#[from] InvalidSignalReason),

    #[error("Failed to construct transform plan for length {len}: {reason}")]
    PlanConstructionFailed { len: usize, reason: String },

    #[error("Transform of length {len} failed: {reason}")]
    Transform { len: usize, reason: String },
}

impl SpectrumError {
    /// True for errors caused by the caller's input rather than by the engine
    pub fn is_invalid_signal(&self) -> bool {
        matches!(self, SpectrumError::InvalidSignal(_))
    }
}

pub type Result<T> = std::result::Result<T, SpectrumError>;
