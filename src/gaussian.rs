/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Reference class model: an HMM with diagonal Gaussian emissions.
//!
//! Parameters are supplied directly (estimation is out of scope). The model
//! supports both topologies and dual-stream operation, where the first
//! `input_dimension` values of a frame are the decoded input stream and the
//! remaining dimensions are regressed.
//!
//! # Results maintained per frame
//!
//! - **Smoothed log-likelihood**: mean of `ln(instant likelihood)` over the
//!   last `likelihood_window` frames.
//! - **Progress**: centroid of the forward mass inside a window of
//!   `state_count / 2` states on each side of the likeliest state, scaled to
//!   `[0, 1]`.

use core::ops::Range;

use crate::config::{ClassRegressionEstimator, GaussianHmmConfig};
use crate::error::{HierarchyError, Result};
use crate::frontier::{ExitSelector, ForwardState};
use crate::model::{ClassModel, Regression, Topology};
use crate::ring::RingBuffer;

const LN_2PI: f64 = 1.837_877_066_409_345_5;

// ─── GaussianState ──────────────────────────────────────────────────────────

/// Diagonal-covariance Gaussian emission of one state.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GaussianState {
    /// Mean, one value per observation dimension.
    pub mean: Vec<f64>,
    /// Variance, one strictly positive value per observation dimension.
    pub variance: Vec<f64>,
}

impl GaussianState {
    /// Build a state. Lengths must match and every variance must be positive.
    pub fn new(mean: Vec<f64>, variance: Vec<f64>) -> Result<Self> {
        let state = Self { mean, variance };
        state.check()?;
        Ok(state)
    }

    fn check(&self) -> Result<()> {
        if self.mean.len() != self.variance.len() || self.mean.is_empty() {
            return Err(HierarchyError::InvalidParameter(format!(
                "mean has {} values, variance has {}",
                self.mean.len(),
                self.variance.len()
            )));
        }
        if self.variance.iter().any(|&v| !(v > 0.0)) {
            return Err(HierarchyError::InvalidParameter(
                "variance must be strictly positive".into(),
            ));
        }
        Ok(())
    }

    /// Observation dimension.
    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    /// Density of `observation` over the dimensions in `dims`.
    ///
    /// `observation[i]` is matched against dimension `dims.start + i`.
    pub fn density(&self, observation: &[f64], dims: Range<usize>) -> f64 {
        let mut log_p = 0.0;
        for (d, &x) in dims.zip(observation) {
            let var = self.variance[d];
            let diff = x - self.mean[d];
            log_p -= 0.5 * (LN_2PI + var.ln() + diff * diff / var);
        }
        log_p.exp()
    }

    /// Output-stream mean and variance for an input split at `input_dimension`.
    ///
    /// With a diagonal covariance the input carries no information about the
    /// output, so the conditional estimate is the output marginal.
    pub fn regression(&self, input_dimension: usize) -> Regression {
        Regression {
            values: self.mean[input_dimension..].to_vec(),
            variance: self.variance[input_dimension..].to_vec(),
        }
    }
}

// ─── Transitions ────────────────────────────────────────────────────────────

/// Internal transition structure.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Transitions {
    /// Any state to any state.
    FullyConnected {
        /// Entry probability per state.
        prior: Vec<f64>,
        /// Row-major `n × n` matrix, `matrix[from * n + to]`.
        matrix: Vec<f64>,
    },
    /// Self-loop or advance by one.
    StrictlyOrdered {
        /// Probability of staying in each state.
        stay: Vec<f64>,
        /// Probability of advancing from each state to the next.
        advance: Vec<f64>,
    },
}

impl Transitions {
    fn check(&self, n: usize) -> Result<()> {
        match self {
            Self::FullyConnected { prior, matrix } if prior.len() != n || matrix.len() != n * n => {
                Err(HierarchyError::InvalidParameter(format!(
                    "{n} states but prior has {} and matrix {} entries",
                    prior.len(),
                    matrix.len()
                )))
            }
            Self::StrictlyOrdered { stay, advance } if stay.len() != n || advance.len() != n => {
                Err(HierarchyError::InvalidParameter(format!(
                    "{n} states but {} stay and {} advance weights",
                    stay.len(),
                    advance.len()
                )))
            }
            _ => Ok(()),
        }
    }
}

// ─── GaussianHmm ────────────────────────────────────────────────────────────

/// Per-run smoothing state.
#[derive(Clone, Debug, PartialEq)]
struct RunState {
    likelihood_buffer: RingBuffer<f64>,
    log_likelihood: f64,
    progress: f64,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            likelihood_buffer: RingBuffer::new(1, 1),
            log_likelihood: 0.0,
            progress: 0.0,
        }
    }
}

/// HMM with Gaussian emissions implementing [`ClassModel`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GaussianHmm {
    states: Vec<GaussianState>,
    transitions: Transitions,
    input_dimension: usize,
    exit_probabilities: Vec<f64>,
    config: GaussianHmmConfig,
    #[cfg_attr(feature = "serde", serde(skip))]
    run: RunState,
}

impl GaussianHmm {
    /// Strictly ordered model with a 0.5 stay / 0.5 advance split.
    ///
    /// The last state loops on itself with probability 1.
    pub fn left_right(states: Vec<GaussianState>) -> Result<Self> {
        let n = states.len();
        let mut stay = vec![0.5; n];
        let mut advance = vec![0.5; n];
        if n > 0 {
            stay[n - 1] = 1.0;
            advance[n - 1] = 0.0;
        }
        Self::strictly_ordered(states, stay, advance)
    }

    /// Strictly ordered model with explicit stay / advance probabilities.
    pub fn strictly_ordered(
        states: Vec<GaussianState>,
        stay: Vec<f64>,
        advance: Vec<f64>,
    ) -> Result<Self> {
        Self::build(states, Transitions::StrictlyOrdered { stay, advance })
    }

    /// Fully connected model with an explicit prior and transition matrix.
    pub fn ergodic(states: Vec<GaussianState>, prior: Vec<f64>, matrix: Vec<f64>) -> Result<Self> {
        Self::build(states, Transitions::FullyConnected { prior, matrix })
    }

    fn build(states: Vec<GaussianState>, transitions: Transitions) -> Result<Self> {
        check_states(&states)?;
        transitions.check(states.len())?;
        let dimension = states.first().map_or(0, GaussianState::dimension);
        let mut model = Self {
            states,
            transitions,
            input_dimension: dimension,
            exit_probabilities: Vec::new(),
            config: GaussianHmmConfig::default(),
            run: RunState::default(),
        };
        model.reset_exit_probabilities();
        model.reset();
        Ok(model)
    }

    /// Split frames into an input stream of `input_dimension` values and an
    /// output stream made of the remaining dimensions.
    pub fn with_input_dimension(mut self, input_dimension: usize) -> Result<Self> {
        if input_dimension == 0 || input_dimension > self.dimension() {
            return Err(HierarchyError::InvalidParameter(format!(
                "input dimension {input_dimension} outside 1..={}",
                self.dimension()
            )));
        }
        self.input_dimension = input_dimension;
        Ok(self)
    }

    /// Replace the configuration. Exit points and run state are reset.
    pub fn with_config(mut self, config: GaussianHmmConfig) -> Self {
        self.config = config;
        self.reset_exit_probabilities();
        self.reset();
        self
    }

    /// Model configuration.
    pub fn config(&self) -> &GaussianHmmConfig {
        &self.config
    }

    /// Emission states.
    pub fn states(&self) -> &[GaussianState] {
        &self.states
    }

    /// Transition structure.
    pub fn transitions(&self) -> &Transitions {
        &self.transitions
    }

    /// Check parameters that did not come through a constructor, such as a
    /// deserialized model.
    pub fn check(&self) -> Result<()> {
        let n = self.states.len();
        check_states(&self.states)?;
        for s in &self.states {
            s.check()?;
        }
        self.transitions.check(n)?;
        if self.exit_probabilities.len() != n {
            return Err(HierarchyError::InvalidParameter(format!(
                "{n} states but {} exit probabilities",
                self.exit_probabilities.len()
            )));
        }
        if let Some(p) = self.exit_probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(HierarchyError::InvalidParameter(format!(
                "exit probability {p} outside [0, 1]"
            )));
        }
        if n > 0 && (self.input_dimension == 0 || self.input_dimension > self.dimension()) {
            return Err(HierarchyError::InvalidParameter(format!(
                "input dimension {} outside 1..={}",
                self.input_dimension,
                self.dimension()
            )));
        }
        Ok(())
    }

    /// States consulted by windowed regression and progress for `forward`.
    fn window(&self, forward: &ForwardState) -> Range<usize> {
        let n = self.states.len();
        let best = forward.likeliest_state();
        let half = n / 2;
        best.saturating_sub(half)..(best + half + 1).min(n)
    }

    fn weighted_regression(&self, forward: &ForwardState, states: Range<usize>) -> Regression {
        let out = self.dimension() - self.input_dimension;
        let mut result = Regression::zeros(out);
        let norm: f64 = states.clone().map(|k| forward.state_mass(k)).sum();
        if norm <= 0.0 {
            return result;
        }
        for k in states {
            let w = forward.state_mass(k) / norm;
            let r = self.states[k].regression(self.input_dimension);
            for d in 0..out {
                result.values[d] += w * r.values[d];
                result.variance[d] += w * r.variance[d];
            }
        }
        result
    }
}

fn check_states(states: &[GaussianState]) -> Result<()> {
    let dimension = states.first().map_or(0, GaussianState::dimension);
    if states.iter().any(|s| s.dimension() != dimension) {
        return Err(HierarchyError::InvalidParameter(
            "states disagree on the observation dimension".into(),
        ));
    }
    Ok(())
}

impl ClassModel for GaussianHmm {
    fn state_count(&self) -> usize {
        self.states.len()
    }

    fn topology(&self) -> Topology {
        match self.transitions {
            Transitions::FullyConnected { .. } => Topology::FullyConnected,
            Transitions::StrictlyOrdered { .. } => Topology::StrictlyOrdered,
        }
    }

    fn dimension(&self) -> usize {
        self.states.first().map_or(0, GaussianState::dimension)
    }

    fn input_dimension(&self) -> usize {
        self.input_dimension
    }

    fn is_trained(&self) -> bool {
        !self.states.is_empty()
    }

    fn validate(&self) -> Result<()> {
        self.check()
    }

    fn state_prior(&self, state: usize) -> f64 {
        match &self.transitions {
            Transitions::FullyConnected { prior, .. } => prior[state],
            Transitions::StrictlyOrdered { .. } => {
                if state == 0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    fn transition(&self, from: usize, to: usize) -> f64 {
        match &self.transitions {
            Transitions::FullyConnected { matrix, .. } => matrix[from * self.states.len() + to],
            Transitions::StrictlyOrdered { stay, advance } => {
                if to == from {
                    stay[from]
                } else if to == from + 1 {
                    advance[from]
                } else {
                    0.0
                }
            }
        }
    }

    fn exit_probability(&self, state: usize) -> f64 {
        self.exit_probabilities[state]
    }

    fn set_exit_point(&mut self, state: usize, probability: f64) -> Result<()> {
        let len = self.exit_probabilities.len();
        if state >= len {
            return Err(HierarchyError::OutOfRange { index: state, len });
        }
        if !(0.0..=1.0).contains(&probability) {
            return Err(HierarchyError::InvalidParameter(format!(
                "exit probability {probability} outside [0, 1]"
            )));
        }
        self.exit_probabilities[state] = probability;
        Ok(())
    }

    fn reset_exit_probabilities(&mut self) {
        let n = self.states.len();
        self.exit_probabilities = vec![0.0; n];
        if n > 0 {
            self.exit_probabilities[n - 1] = self.config.exit_probability_last_state;
        }
    }

    fn emission(&self, state: usize, observation: &[f64]) -> f64 {
        let s = &self.states[state];
        s.density(observation, 0..s.dimension())
    }

    fn emission_input(&self, state: usize, observation: &[f64]) -> f64 {
        self.states[state].density(observation, 0..self.input_dimension)
    }

    fn update_results(&mut self, forward: &ForwardState, instant_likelihood: f64) {
        let window = self.config.likelihood_window.max(1);
        self.run.likelihood_buffer.resize(window);
        // ln(0) would pin the window mean at -inf for `window` frames
        let ll = instant_likelihood.max(f64::MIN_POSITIVE).ln();
        if self.run.likelihood_buffer.push_value(ll).is_ok() {
            self.run.log_likelihood = self.run.likelihood_buffer.mean()[0];
        }

        let n = self.states.len();
        let range = self.window(forward);
        let norm: f64 = range.clone().map(|k| forward.state_mass(k)).sum();
        self.run.progress = if n > 1 && norm > 0.0 {
            let centroid: f64 = range.map(|k| forward.state_mass(k) * k as f64).sum::<f64>() / norm;
            centroid / (n - 1) as f64
        } else {
            0.0
        };
    }

    fn smoothed_log_likelihood(&self) -> f64 {
        self.run.log_likelihood
    }

    fn progress(&self) -> f64 {
        self.run.progress
    }

    fn regression(&self, forward: &ForwardState, _observation: &[f64]) -> Regression {
        if forward.is_empty() || forward.sum(ExitSelector::All) <= 0.0 {
            return Regression::zeros(self.dimension() - self.input_dimension);
        }
        match self.config.regression_estimator {
            ClassRegressionEstimator::Full => self.weighted_regression(forward, 0..self.states.len()),
            ClassRegressionEstimator::Windowed => {
                self.weighted_regression(forward, self.window(forward))
            }
            ClassRegressionEstimator::Likeliest => {
                self.states[forward.likeliest_state()].regression(self.input_dimension)
            }
        }
    }

    fn reset(&mut self) {
        self.run = RunState {
            likelihood_buffer: RingBuffer::new(1, self.config.likelihood_window),
            log_likelihood: 0.0,
            progress: 0.0,
        };
    }
}
