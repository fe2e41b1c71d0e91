//! One-sided spectrum computation
//!
//! Runs the forward transform with a cached plan and turns the complex
//! coefficients into frequency / magnitude / phase bins.

use super::bin::{is_unfolded_bin, Spectrum, SpectrumBin};
use super::cache::{CacheConfig, PlanCache, PlanSource};
use super::signal::{validate, Signal};
use crate::error::{Result, SpectrumError};
use num_complex::Complex;
use std::f64::consts::PI;
use std::sync::Arc;

/// Computes spectra using plans from a shared source
///
/// Cheap to clone; clones share the same plan source.
pub struct SpectrumComputer<S: ?Sized = PlanCache> {
    plans: Arc<S>,
}

impl<S: ?Sized> Clone for SpectrumComputer<S> {
    fn clone(&self) -> Self {
        Self {
            plans: Arc::clone(&self.plans),
        }
    }
}

impl SpectrumComputer<PlanCache> {
    /// Computer with its own, initially empty plan cache
    pub fn with_config(config: CacheConfig) -> Self {
        Self::new(Arc::new(PlanCache::new(config)))
    }
}

impl Default for SpectrumComputer<PlanCache> {
    fn default() -> Self {
        Self::with_config(CacheConfig::default())
    }
}

impl<S: PlanSource + ?Sized> SpectrumComputer<S> {
    pub fn new(plans: Arc<S>) -> Self {
        Self { plans }
    }

    /// The plan source this computer draws from
    pub fn plans(&self) -> &Arc<S> {
        &self.plans
    }

    /// Analyze `samples` taken every `time_interval` seconds
    ///
    /// # Returns
    /// Bins `k = 0..=N/2` with
    /// * `frequency = k / (N * time_interval)`
    /// * `magnitude = |C[k]| / N` for DC and (even N) Nyquist, `2 |C[k]| / N` otherwise
    /// * `phase = atan2(Im C[k], Re C[k])`, 0 where the magnitude is exactly 0
    ///   and for single-sample input
    ///
    /// # Errors
    /// `InvalidSignal` for empty input or a non-positive interval,
    /// `PlanConstructionFailed` if no plan could be built for this length.
    pub fn analyze(&self, samples: &[f64], time_interval: f64) -> Result<Spectrum> {
        validate(samples.len(), time_interval)?;
        self.compute(samples, time_interval)
    }

    /// Analyze an already validated signal
    pub fn analyze_signal(&self, signal: &Signal) -> Result<Spectrum> {
        self.compute(signal.samples(), signal.time_interval())
    }

    fn compute(&self, samples: &[f64], time_interval: f64) -> Result<Spectrum> {
        let n = samples.len();
        let plan = self.plans.acquire(n)?;
        if plan.len() != n {
            return Err(SpectrumError::Transform {
                len: n,
                reason: format!("plan source returned a plan for length {}", plan.len()),
            });
        }

        // The backend may use its input as scratch, so work on a copy
        let mut input = samples.to_vec();
        let mut coefficients = vec![Complex::new(0.0, 0.0); n / 2 + 1];
        plan.process(&mut input, &mut coefficients)?;

        let bins = coefficients
            .iter()
            .enumerate()
            .map(|(k, &c)| coefficient_to_bin(k, c, n, time_interval))
            .collect();

        Ok(Spectrum::new(bins, n, time_interval))
    }
}

/// Derive the output bin for coefficient `k` of an `n`-point transform
fn coefficient_to_bin(k: usize, c: Complex<f64>, n: usize, time_interval: f64) -> SpectrumBin {
    let n_f = n as f64;

    let magnitude = if is_unfolded_bin(k, n) {
        c.norm() / n_f
    } else {
        2.0 * c.norm() / n_f
    };

    // A lone sample is a pure DC level: its sign lives in the sample, not the phase
    let phase = if magnitude == 0.0 || n == 1 {
        0.0
    } else {
        principal_phase(c.im.atan2(c.re))
    };

    SpectrumBin {
        frequency: k as f64 / (n_f * time_interval),
        magnitude,
        phase,
    }
}

/// Map atan2's -π (negative real axis approached from below) onto π
fn principal_phase(phase: f64) -> f64 {
    if phase <= -PI {
        PI
    } else {
        phase
    }
}
