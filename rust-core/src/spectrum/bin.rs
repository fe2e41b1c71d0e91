//! Spectrum output types

/// Magnitudes below this are treated as zero when snapping
pub const DEFAULT_MAGNITUDE_TOLERANCE: f64 = 1e-4;

/// Phases below this (in radians) are treated as zero when snapping
pub const DEFAULT_PHASE_TOLERANCE: f64 = 1e-2;

/// One element of a one-sided spectrum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumBin {
    /// Frequency in Hz
    pub frequency: f64,

    /// Amplitude of the component at this frequency
    pub magnitude: f64,

    /// Phase in radians, in (-π, π]
    pub phase: f64,
}

impl SpectrumBin {
    /// Zero out magnitude and phase values that fall below the given tolerances
    ///
    /// Useful for presenting results; `analyze` never applies this itself.
    pub fn snap_to_zero(self, tolerance: &Tolerance) -> Self {
        Self {
            frequency: self.frequency,
            magnitude: if self.magnitude.abs() < tolerance.magnitude {
                0.0
            } else {
                self.magnitude
            },
            phase: if self.phase.abs() < tolerance.phase {
                0.0
            } else {
                self.phase
            },
        }
    }
}

/// Thresholds for [`SpectrumBin::snap_to_zero`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub magnitude: f64,
    pub phase: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            magnitude: DEFAULT_MAGNITUDE_TOLERANCE,
            phase: DEFAULT_PHASE_TOLERANCE,
        }
    }
}

/// Result of analysing one signal
///
/// Holds bins `0..=N/2` in increasing frequency order together with the
/// signal length and sampling interval they were derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    bins: Vec<SpectrumBin>,
    signal_len: usize,
    time_interval: f64,
}

impl Spectrum {
    pub(crate) fn new(bins: Vec<SpectrumBin>, signal_len: usize, time_interval: f64) -> Self {
        Self {
            bins,
            signal_len,
            time_interval,
        }
    }

    pub fn bins(&self) -> &[SpectrumBin] {
        &self.bins
    }

    pub fn into_bins(self) -> Vec<SpectrumBin> {
        self.bins
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SpectrumBin> {
        self.bins.iter()
    }

    /// Number of bins (`N / 2 + 1`)
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Always false: a spectrum has at least the DC bin
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Number of time-domain samples analysed
    pub fn signal_len(&self) -> usize {
        self.signal_len
    }

    pub fn time_interval(&self) -> f64 {
        self.time_interval
    }

    /// Spacing between adjacent bins in Hz
    pub fn frequency_resolution(&self) -> f64 {
        1.0 / (self.signal_len as f64 * self.time_interval)
    }

    /// Whether bin `k` has no mirrored counterpart (DC, and Nyquist for even N)
    pub fn is_unfolded(&self, k: usize) -> bool {
        is_unfolded_bin(k, self.signal_len)
    }

    /// Mean squared sample value recovered from the bins (Parseval)
    ///
    /// Folded bins carry twice the amplitude of each mirrored half, so their
    /// squared magnitude contributes half its value.
    pub fn mean_power(&self) -> f64 {
        self.bins
            .iter()
            .enumerate()
            .map(|(k, bin)| {
                let power = bin.magnitude * bin.magnitude;
                if self.is_unfolded(k) {
                    power
                } else {
                    power / 2.0
                }
            })
            .sum()
    }

    /// Strongest non-DC component, if any
    pub fn peak(&self) -> Option<&SpectrumBin> {
        self.bins
            .iter()
            .skip(1)
            .max_by(|a, b| a.magnitude.total_cmp(&b.magnitude))
    }
}

impl AsRef<[SpectrumBin]> for Spectrum {
    fn as_ref(&self) -> &[SpectrumBin] {
        &self.bins
    }
}

impl IntoIterator for Spectrum {
    type Item = SpectrumBin;
    type IntoIter = std::vec::IntoIter<SpectrumBin>;

    fn into_iter(self) -> Self::IntoIter {
        self.bins.into_iter()
    }
}

impl<'a> IntoIterator for &'a Spectrum {
    type Item = &'a SpectrumBin;
    type IntoIter = std::slice::Iter<'a, SpectrumBin>;

    fn into_iter(self) -> Self::IntoIter {
        self.bins.iter()
    }
}

pub(crate) fn is_unfolded_bin(k: usize, signal_len: usize) -> bool {
    k == 0 || (signal_len % 2 == 0 && k == signal_len / 2)
}
