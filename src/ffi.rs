/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Python FFI bindings via PyO3.
//!
//! Exposes a hierarchy of [`GaussianHmm`] classes labelled by strings. For
//! custom class models or label types, use the Rust API directly.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! from hhmm_core import HierarchicalHmm
//!
//! h = HierarchicalHmm()
//! h.add_left_right_class("circle", means=[[0.0], [1.0], [2.0]], variances=[[0.1]] * 3)
//! h.add_ergodic_class("shake", means=[[3.0], [-3.0]], variances=[[0.5]] * 2,
//!                     prior=[0.5, 0.5], transition=[0.5, 0.5, 0.5, 0.5])
//! for x in stream:
//!     h.filter([x])
//!     print(h.likeliest, h.instant_normalized_likelihoods)
//! ```

use pyo3::exceptions::{PyKeyError, PyValueError};
use pyo3::prelude::*;

use crate::config::HierarchyConfig;
use crate::error::HierarchyError;
use crate::gaussian::{GaussianHmm, GaussianState};
use crate::hierarchy::Hierarchy;
use crate::portable::PortableTables;

fn to_py(e: HierarchyError) -> PyErr {
    match e {
        HierarchyError::NotFound(_) | HierarchyError::UnknownLabel(_) => {
            PyKeyError::new_err(e.to_string())
        }
        _ => PyValueError::new_err(e.to_string()),
    }
}

fn states(means: Vec<Vec<f64>>, variances: Vec<Vec<f64>>) -> PyResult<Vec<GaussianState>> {
    if means.len() != variances.len() {
        return Err(PyValueError::new_err(format!(
            "{} means but {} variances",
            means.len(),
            variances.len()
        )));
    }
    means
        .into_iter()
        .zip(variances)
        .map(|(m, v)| GaussianState::new(m, v).map_err(to_py))
        .collect()
}

fn split(model: GaussianHmm, input_dimension: Option<usize>) -> PyResult<GaussianHmm> {
    match input_dimension {
        Some(d) => model.with_input_dimension(d).map_err(to_py),
        None => Ok(model),
    }
}

/// Hierarchical HMM over Gaussian class models.
///
/// Classes are decoded continuously, one frame at a time. In bimodal mode
/// frames carry only the input stream and `output_values` holds the
/// regressed output stream.
#[pyclass(name = "HierarchicalHmm")]
pub struct PyHierarchicalHmm {
    inner: Hierarchy<GaussianHmm>,
}

#[pymethods]
impl PyHierarchicalHmm {
    /// Create an empty hierarchy.
    ///
    /// Args:
    ///     bimodal:         decode the input stream and regress the output (default False)
    ///     exit_transition: default exit transition of every class (default 0.1)
    #[new]
    #[pyo3(signature = (bimodal=false, exit_transition=0.1))]
    pub fn new(bimodal: bool, exit_transition: f64) -> Self {
        Self {
            inner: Hierarchy::new(HierarchyConfig {
                bimodal,
                default_exit_transition: exit_transition,
                ..HierarchyConfig::default()
            }),
        }
    }

    /// Add a strictly ordered class (0.5 stay / 0.5 advance).
    ///
    /// Args:
    ///     label:           class label
    ///     means:           one mean vector per state
    ///     variances:       one variance vector per state
    ///     input_dimension: size of the input stream in bimodal mode
    #[pyo3(signature = (label, means, variances, input_dimension=None))]
    pub fn add_left_right_class(
        &mut self,
        label: String,
        means: Vec<Vec<f64>>,
        variances: Vec<Vec<f64>>,
        input_dimension: Option<usize>,
    ) -> PyResult<()> {
        let model = GaussianHmm::left_right(states(means, variances)?).map_err(to_py)?;
        let model = split(model, input_dimension)?;
        self.inner.add_class(label, model).map_err(to_py)
    }

    /// Add a fully connected class.
    ///
    /// Args:
    ///     prior:      entry probability per state
    ///     transition: row-major state transition matrix
    #[pyo3(signature = (label, means, variances, prior, transition, input_dimension=None))]
    pub fn add_ergodic_class(
        &mut self,
        label: String,
        means: Vec<Vec<f64>>,
        variances: Vec<Vec<f64>>,
        prior: Vec<f64>,
        transition: Vec<f64>,
        input_dimension: Option<usize>,
    ) -> PyResult<()> {
        let model = GaussianHmm::ergodic(states(means, variances)?, prior, transition).map_err(to_py)?;
        let model = split(model, input_dimension)?;
        self.inner.add_class(label, model).map_err(to_py)
    }

    /// Remove a class. Raises KeyError if it does not exist.
    pub fn remove_class(&mut self, label: String) -> PyResult<()> {
        self.inner.remove_class(&label).map(|_| ()).map_err(to_py)
    }

    /// Set the exit probability of one state on every class.
    pub fn set_exit_points(&mut self, state: usize, probability: f64) -> PyResult<()> {
        self.inner.propagate_exit_points(state, probability).map_err(to_py)
    }

    /// Start a new run.
    pub fn reset(&mut self) {
        self.inner.reset();
    }

    /// Absorb one observation frame.
    pub fn filter(&mut self, observation: Vec<f64>) -> PyResult<()> {
        self.inner.filter(&observation).map_err(to_py)
    }

    /// Class labels in order.
    #[getter]
    pub fn labels(&self) -> Vec<String> {
        self.inner.labels().cloned().collect()
    }

    /// Most likely class of the last frame, or None.
    #[getter]
    pub fn likeliest(&self) -> Option<String> {
        self.inner.results().likeliest().cloned()
    }

    /// Normalized instant likelihoods in label order.
    #[getter]
    pub fn instant_normalized_likelihoods(&self) -> Vec<f64> {
        self.inner.results().instant_normalized_likelihoods()
    }

    /// Normalized smoothed likelihoods in label order.
    #[getter]
    pub fn smoothed_normalized_likelihoods(&self) -> Vec<f64> {
        self.inner.results().smoothed_normalized_likelihoods()
    }

    /// Exit ratios in label order.
    #[getter]
    pub fn exit_ratios(&self) -> Vec<f64> {
        self.inner.results().exit_ratios()
    }

    /// Blended regression output (bimodal mode).
    #[getter]
    pub fn output_values(&self) -> Vec<f64> {
        self.inner.results().output().values.clone()
    }

    /// Blended regression variance (bimodal mode).
    #[getter]
    pub fn output_variance(&self) -> Vec<f64> {
        self.inner.results().output().variance.clone()
    }

    /// Export prior, transition and exit-transition tables as JSON.
    pub fn tables_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.inner.to_portable())
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    /// Replace the tables from JSON. The hierarchy is unchanged on error.
    pub fn load_tables_json(&mut self, json: &str) -> PyResult<()> {
        let tables: PortableTables<String> =
            serde_json::from_str(json).map_err(|e| PyValueError::new_err(e.to_string()))?;
        self.inner.load_portable(&tables).map_err(to_py)
    }

    /// Number of classes.
    pub fn __len__(&self) -> usize {
        self.inner.len()
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!(
            "HierarchicalHmm(classes={}, bimodal={})",
            self.inner.len(),
            self.inner.config().bimodal
        )
    }
}

// ── Module entry point ────────────────────────────────────────────────────────

/// Hierarchical HMM continuous recognition bindings.
#[pymodule]
pub fn hhmm_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyHierarchicalHmm>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
