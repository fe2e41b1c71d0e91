//! Spectrum API - real-signal spectral analysis core
//!
//! Turns uniformly sampled real signals into one-sided frequency / magnitude /
//! phase spectra, reusing FFT plans across requests of the same length.

// Suppress PyO3 non-local impl warnings (harmless macro-generated code)
#![cfg_attr(feature = "python", allow(non_local_definitions))]

pub mod error;
pub mod spectrum;
#[cfg(feature = "python")]
pub mod python_bindings;

pub use error::{InvalidSignalReason, Result, SpectrumError};
pub use spectrum::{
    CacheConfig, FftBackend, PlanCache, Signal, Spectrum, SpectrumBin, SpectrumComputer,
};
