//! Forward real-to-complex transform plans
//!
//! A plan is built once for a given input length and then executed any number
//! of times, from any number of threads, through a shared reference.

use crate::error::{Result, SpectrumError};
use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Shared handle to a ready-to-run plan
pub type SharedPlan = Arc<dyn TransformPlan>;

/// Length-specific execution strategy for the forward transform of real input
///
/// Implementations must be safe to execute concurrently through `&self`; all
/// per-call state (scratch space) is allocated by the call itself.
pub trait TransformPlan: Send + Sync {
    /// Number of real input samples this plan accepts
    fn len(&self) -> usize;

    /// Number of one-sided output coefficients (`len / 2 + 1`)
    fn num_bins(&self) -> usize {
        self.len() / 2 + 1
    }

    /// Transform `input` into the one-sided spectrum `output`
    ///
    /// `input` must hold exactly `len()` samples and may be used as scratch.
    /// `output` must hold exactly `num_bins()` coefficients.
    fn process(&self, input: &mut [f64], output: &mut [Complex<f64>]) -> Result<()>;
}

/// Constructs plans for a requested length
pub trait PlanBuilder: Send + Sync {
    /// Short backend name used in log output
    fn name(&self) -> &'static str;

    /// Build a plan for inputs of exactly `len` samples
    fn build(&self, len: usize) -> Result<SharedPlan>;
}

/// FFT backends available to the plan cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FftBackend {
    /// Dedicated real-input transform (`realfft`)
    #[default]
    RealFft,
    /// Full complex transform of the real input, truncated to the one-sided half (`rustfft`)
    ComplexFft,
}

impl FftBackend {
    /// Builder producing plans for this backend
    pub fn builder(self) -> Arc<dyn PlanBuilder> {
        match self {
            FftBackend::RealFft => Arc::new(RealFftBuilder),
            FftBackend::ComplexFft => Arc::new(ComplexFftBuilder),
        }
    }
}

fn check_lengths(len: usize, input: &[f64], output: &[Complex<f64>]) -> Result<()> {
    if input.len() != len {
        return Err(SpectrumError::Transform {
            len,
            reason: format!("expected {} input samples, got {}", len, input.len()),
        });
    }
    if output.len() != len / 2 + 1 {
        return Err(SpectrumError::Transform {
            len,
            reason: format!(
                "expected {} output coefficients, got {}",
                len / 2 + 1,
                output.len()
            ),
        });
    }
    Ok(())
}

fn reject_empty(len: usize) -> Result<()> {
    if len == 0 {
        return Err(SpectrumError::PlanConstructionFailed {
            len,
            reason: "transform length must be positive".into(),
        });
    }
    Ok(())
}

/// Plan backed by `realfft`
pub struct RealFftPlan {
    len: usize,
    r2c: Arc<dyn RealToComplex<f64>>,
}

impl RealFftPlan {
    pub fn new(len: usize) -> Result<Self> {
        reject_empty(len)?;

        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(len);

        Ok(Self { len, r2c })
    }
}

impl TransformPlan for RealFftPlan {
    fn len(&self) -> usize {
        self.len
    }

    fn process(&self, input: &mut [f64], output: &mut [Complex<f64>]) -> Result<()> {
        check_lengths(self.len, input, output)?;

        let mut scratch = self.r2c.make_scratch_vec();
        self.r2c
            .process_with_scratch(input, output, &mut scratch)
            .map_err(|e| SpectrumError::Transform {
                len: self.len,
                reason: e.to_string(),
            })
    }
}

/// Plan backed by a full-length `rustfft` complex transform
pub struct ComplexFftPlan {
    len: usize,
    fft: Arc<dyn Fft<f64>>,
}

impl ComplexFftPlan {
    pub fn new(len: usize) -> Result<Self> {
        reject_empty(len)?;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(len);

        Ok(Self { len, fft })
    }
}

impl TransformPlan for ComplexFftPlan {
    fn len(&self) -> usize {
        self.len
    }

    fn process(&self, input: &mut [f64], output: &mut [Complex<f64>]) -> Result<()> {
        check_lengths(self.len, input, output)?;

        let mut buffer: Vec<Complex<f64>> =
            input.iter().map(|&x| Complex::new(x, 0.0)).collect();
        let mut scratch = vec![Complex::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];
        self.fft.process_with_scratch(&mut buffer, &mut scratch);

        // Upper half is the conjugate mirror of the lower half
        let num_bins = output.len();
        output.copy_from_slice(&buffer[..num_bins]);
        Ok(())
    }
}

/// Builds [`RealFftPlan`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFftBuilder;

impl PlanBuilder for RealFftBuilder {
    fn name(&self) -> &'static str {
        "realfft"
    }

    fn build(&self, len: usize) -> Result<SharedPlan> {
        Ok(Arc::new(RealFftPlan::new(len)?))
    }
}

/// Builds [`ComplexFftPlan`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexFftBuilder;

impl PlanBuilder for ComplexFftBuilder {
    fn name(&self) -> &'static str {
        "rustfft"
    }

    fn build(&self, len: usize) -> Result<SharedPlan> {
        Ok(Arc::new(ComplexFftPlan::new(len)?))
    }
}
