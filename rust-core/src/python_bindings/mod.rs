//! PyO3 bindings for Python integration

use pyo3::prelude::*;

mod spectrum_bindings;

/// Python module definition
#[pymodule]
fn spectrum_api(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<spectrum_bindings::PySpectrumAnalyzer>()?;

    Ok(())
}
