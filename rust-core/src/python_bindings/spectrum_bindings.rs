//! Python bindings for spectrum analysis

use crate::error::SpectrumError;
use crate::spectrum::{CacheConfig, PlanCache, SpectrumComputer};
use numpy::{PyArray1, PyReadonlyArray1};
use once_cell::sync::Lazy;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::sync::Arc;

/// Plan cache shared by every analyzer in the interpreter
static SHARED_PLANS: Lazy<Arc<PlanCache>> =
    Lazy::new(|| Arc::new(PlanCache::new(CacheConfig::default())));

fn to_py_err(err: SpectrumError) -> PyErr {
    match err {
        SpectrumError::InvalidSignal(_) => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

/// Spectrum analyzer exposed to Python
#[pyclass(name = "SpectrumAnalyzer")]
pub struct PySpectrumAnalyzer {
    computer: SpectrumComputer,
}

#[pymethods]
impl PySpectrumAnalyzer {
    /// Create an analyzer backed by the process-wide plan cache
    #[new]
    fn new() -> Self {
        Self {
            computer: SpectrumComputer::new(Arc::clone(&SHARED_PLANS)),
        }
    }

    /// Analyze a real signal
    ///
    /// Args:
    ///     signal: Samples as numpy array
    ///     time_interval: Seconds between consecutive samples
    ///
    /// Returns:
    ///     Tuple of (frequencies, magnitudes, phases) numpy arrays
    ///
    /// Raises:
    ///     ValueError: If the signal is empty or the interval is not positive
    fn analyze<'py>(
        &self,
        py: Python<'py>,
        signal: PyReadonlyArray1<f64>,
        time_interval: f64,
    ) -> PyResult<(&'py PyArray1<f64>, &'py PyArray1<f64>, &'py PyArray1<f64>)> {
        let samples = signal.as_slice()?.to_vec();
        let computer = self.computer.clone();

        let spectrum = py
            .allow_threads(move || computer.analyze(&samples, time_interval))
            .map_err(to_py_err)?;

        let len = spectrum.len();
        let mut frequencies = Vec::with_capacity(len);
        let mut magnitudes = Vec::with_capacity(len);
        let mut phases = Vec::with_capacity(len);
        for bin in spectrum {
            frequencies.push(bin.frequency);
            magnitudes.push(bin.magnitude);
            phases.push(bin.phase);
        }

        Ok((
            PyArray1::from_vec(py, frequencies),
            PyArray1::from_vec(py, magnitudes),
            PyArray1::from_vec(py, phases),
        ))
    }

    /// Drop every cached FFT plan
    fn clear_cache(&self) {
        self.computer.plans().clear();
    }

    /// Cache state
    ///
    /// Returns:
    ///     Tuple of (number of cached lengths, list of lengths)
    fn cache_info(&self) -> (usize, Vec<usize>) {
        let info = self.computer.plans().info();
        (info.len(), info.cached_lengths)
    }
}
