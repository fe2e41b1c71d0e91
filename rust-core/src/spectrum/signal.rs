//! Uniformly sampled real-valued input

use crate::error::{InvalidSignalReason, Result};

/// Real samples taken at a fixed interval
///
/// Sample values are taken as given: the caller is responsible for keeping
/// NaN and infinite values out.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    samples: Vec<f64>,
    time_interval: f64,
}

impl Signal {
    /// Create a signal from samples and the spacing between them in seconds
    pub fn new(samples: impl Into<Vec<f64>>, time_interval: f64) -> Result<Self> {
        let samples = samples.into();
        validate(samples.len(), time_interval)?;

        Ok(Self {
            samples,
            time_interval,
        })
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Seconds between consecutive samples
    pub fn time_interval(&self) -> f64 {
        self.time_interval
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false for a constructed signal
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> f64 {
        1.0 / self.time_interval
    }

    /// Total covered time in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 * self.time_interval
    }
}

/// Reject empty input and non-positive (or NaN) intervals
pub(crate) fn validate(len: usize, time_interval: f64) -> Result<()> {
    if len == 0 {
        return Err(InvalidSignalReason::EmptySamples.into());
    }
    if time_interval.is_nan() || time_interval <= 0.0 {
        return Err(InvalidSignalReason::NonPositiveInterval(time_interval).into());
    }
    Ok(())
}
