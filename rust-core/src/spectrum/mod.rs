//! Spectral analysis with cached FFT plans

pub mod analysis;
pub mod bin;
pub mod cache;
pub mod fft;
pub mod signal;

pub use analysis::SpectrumComputer;
pub use bin::{Spectrum, SpectrumBin, Tolerance};
pub use cache::{CacheConfig, CacheInfo, CacheStats, PlanCache, PlanSource};
pub use fft::{FftBackend, PlanBuilder, SharedPlan, TransformPlan};
pub use signal::Signal;
