/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! The per-class sequence model interface consumed by the hierarchy.
//!
//! A hierarchy never reaches into a class model's internals. Everything the
//! frontier recursion needs (emissions, topology, exit points) and everything
//! the model needs back (its own forward mass, for smoothing and regression)
//! crosses this boundary through [`ClassModel`].
//!
//! # Implementing for a new emission family
//!
//! ```rust,ignore
//! use hhmm_core::model::{ClassModel, Regression, Topology};
//! use hhmm_core::frontier::ForwardState;
//!
//! struct Template { /* ... */ }
//!
//! impl ClassModel for Template {
//!     fn state_count(&self) -> usize { 4 }
//!     fn topology(&self) -> Topology { Topology::StrictlyOrdered }
//!     // ...
//! }
//! ```

use core::fmt::{Debug, Display};
use core::hash::Hash;

use crate::error::Result;
use crate::frontier::ForwardState;

/// Class identifier used as the hierarchy key.
///
/// Iteration over classes always follows the `Ord` order of labels, which
/// keeps frontier vectors and portable tables reproducible.
pub trait Label: Ord + Hash + Clone + Debug + Display {}

impl<T: Ord + Hash + Clone + Debug + Display> Label for T {}

/// State graph of a class model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Topology {
    /// Any state may follow any state. Entry is spread by the model's state prior.
    FullyConnected,
    /// State `k` is reached only from `k` or `k - 1`. Entry is always state 0.
    StrictlyOrdered,
}

/// Regression output of one class (or of the whole hierarchy) for one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Regression {
    /// Estimated output values, one per output dimension.
    pub values: Vec<f64>,
    /// Estimated output variance, one per output dimension.
    pub variance: Vec<f64>,
}

impl Regression {
    /// All-zero output of the given dimension.
    pub fn zeros(dimension: usize) -> Self {
        Self {
            values: vec![0.0; dimension],
            variance: vec![0.0; dimension],
        }
    }

    /// Number of output dimensions.
    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

/// A trained sequence model for one class.
///
/// Transition weights are read through [`ClassModel::transition`] for both
/// topologies. A strictly ordered model only needs to answer `(k, k)` and
/// `(k, k + 1)`; other pairs are never requested.
pub trait ClassModel {
    /// Number of hidden states.
    fn state_count(&self) -> usize;

    /// Topology tag selecting the frontier recursion.
    fn topology(&self) -> Topology;

    /// Dimension of a full observation frame.
    fn dimension(&self) -> usize;

    /// Dimension of the input stream. Equal to [`Self::dimension`] for
    /// unimodal models.
    fn input_dimension(&self) -> usize;

    /// Whether the model carries usable parameters.
    fn is_trained(&self) -> bool {
        true
    }

    /// Check that the parameters agree with each other, so every accessor
    /// below stays in bounds for `0..state_count()`.
    ///
    /// Called on models restored from a snapshot.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Internal entry probability of `state` (fully connected topology).
    fn state_prior(&self, state: usize) -> f64;

    /// Internal transition weight from `from` to `to`.
    fn transition(&self, from: usize, to: usize) -> f64;

    /// Probability that the model exits at `state`.
    fn exit_probability(&self, state: usize) -> f64;

    /// Override the exit probability of one state.
    fn set_exit_point(&mut self, state: usize, probability: f64) -> Result<()>;

    /// Restore default exit probabilities.
    fn reset_exit_probabilities(&mut self);

    /// Emission probability of a full observation frame at `state`.
    fn emission(&self, state: usize, observation: &[f64]) -> f64;

    /// Emission probability of the input stream only at `state`.
    fn emission_input(&self, state: usize, observation: &[f64]) -> f64;

    /// Fold this frame's forward mass into the model's smoothed results.
    ///
    /// `instant_likelihood` is the class's total forward mass before the
    /// global normalization of the frame.
    fn update_results(&mut self, forward: &ForwardState, instant_likelihood: f64);

    /// Smoothed log-likelihood maintained by [`Self::update_results`].
    fn smoothed_log_likelihood(&self) -> f64;

    /// Normalized time progression through the sequence, in `[0, 1]`.
    fn progress(&self) -> f64 {
        0.0
    }

    /// Output regression given the class's forward mass and the input frame.
    fn regression(&self, forward: &ForwardState, observation: &[f64]) -> Regression;

    /// Clear per-run state (smoothing buffers, results).
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_has_requested_dimension() {
        let r = Regression::zeros(3);
        assert_eq!(r.dimension(), 3);
        assert!(r.values.iter().chain(r.variance.iter()).all(|&v| v == 0.0));
    }

    #[test]
    fn common_label_types() {
        fn is_label<L: Label>(_: &L) {}
        is_label(&String::from("circle"));
        is_label(&"square");
        is_label(&7u32);
    }
}
