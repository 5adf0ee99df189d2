/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Frame-by-frame frontier forward engine.
//!
//! The engine owns the forward state of every class and the two frontier
//! vectors for the duration of a run. Class models and inter-class tables are
//! borrowed per frame; the engine never keeps a reference to them.
//!
//! # Frame recursion
//!
//! ```text
//! first frame   α_c[k]      = entry(k) · b_k(o)           then normalize
//! next frames   soft(i)     = Σ_k α_s^{t−1}[i][k]         frontier vectors
//!               hard(i)     = Σ_k α_h^{t−1}[i][k]
//!               front[k]    (per topology, see `topology`)
//!               m[k]        = b_k(o) · front[k]
//!               α_h[k]      = η · e_k · m[k]
//!               α_s[k]      = (1 − η) · e_k · m[k]
//!               α_c[k]      = (1 − e_k) · m[k]
//!               Z           = Σ_classes Σ_k m[k]           then divide by Z
//! ```
//!
//! `entry(k)` is the model's state prior for fully connected classes and the
//! class prior on state 0 for strictly ordered ones; `η` is the class's exit
//! transition and `e_k` the model's exit probability at `k`.
//!
//! A frame whose `Z` is zero or not finite is rejected: the forward state is
//! computed into scratch buffers and only committed once `Z` is known to be
//! usable.

use tracing::{trace, warn};

use crate::error::{HierarchyError, Result};
use crate::model::{ClassModel, Topology};
use crate::tables::DenseTables;

use super::forward::{ExitSelector, ForwardState};
use super::topology::front_mass;

/// Lifecycle of a filtering run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FilterPhase {
    /// No frame processed since the last reset.
    #[default]
    Uninitialized,
    /// The first frame has been absorbed.
    Initialized,
    /// At least one recursion step has run.
    Streaming,
}

/// Forward state and frontier vectors for one run over a hierarchy.
#[derive(Clone, Debug, Default)]
pub struct FrontierEngine {
    forward: Vec<ForwardState>,
    scratch: Vec<ForwardState>,
    frontier_soft: Vec<f64>,
    frontier_hard: Vec<f64>,
    instant: Vec<f64>,
    scratch_instant: Vec<f64>,
    front: Vec<f64>,
    phase: FilterPhase,
    frames: u64,
}

impl FrontierEngine {
    /// Engine with no classes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all forward state and size it for `state_counts` (one entry per class).
    pub fn reset(&mut self, state_counts: &[usize]) {
        let n = state_counts.len();
        self.forward.resize_with(n, ForwardState::default);
        self.scratch.resize_with(n, ForwardState::default);
        for ((f, s), &states) in self.forward.iter_mut().zip(self.scratch.iter_mut()).zip(state_counts) {
            f.clear(states);
            s.clear(states);
        }
        self.frontier_soft.clear();
        self.frontier_soft.resize(n, 0.0);
        self.frontier_hard.clear();
        self.frontier_hard.resize(n, 0.0);
        self.instant.clear();
        self.instant.resize(n, 0.0);
        self.scratch_instant.clear();
        self.scratch_instant.resize(n, 0.0);
        self.phase = FilterPhase::Uninitialized;
        self.frames = 0;
    }

    /// Current phase.
    pub fn phase(&self) -> FilterPhase {
        self.phase
    }

    /// Frames absorbed since the last reset.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Number of classes the engine is sized for.
    pub fn class_count(&self) -> usize {
        self.forward.len()
    }

    /// Normalized forward state of every class, in class order.
    pub fn forward(&self) -> &[ForwardState] {
        &self.forward
    }

    /// Unnormalized class mass of the last committed frame, in class order.
    pub fn instant_likelihoods(&self) -> &[f64] {
        &self.instant
    }

    /// Soft-exit frontier vector computed for the last recursion step.
    pub fn frontier_soft(&self) -> &[f64] {
        &self.frontier_soft
    }

    /// Hard-exit frontier vector computed for the last recursion step.
    pub fn frontier_hard(&self) -> &[f64] {
        &self.frontier_hard
    }

    /// Reduce each class's forward state to one scalar.
    pub fn likelihood_by_exit(&self, selector: ExitSelector) -> Vec<f64> {
        self.forward.iter().map(|f| f.sum(selector)).collect()
    }

    /// Absorb one frame: initialization on the first frame, recursion after.
    ///
    /// Returns the normalization constant of the frame.
    pub fn step<'a, M, I>(
        &mut self,
        models: I,
        tables: &DenseTables,
        observation: &[f64],
        bimodal: bool,
    ) -> Result<f64>
    where
        M: ClassModel + ?Sized + 'a,
        I: IntoIterator<Item = &'a M>,
    {
        match self.phase {
            FilterPhase::Uninitialized => self.init_frame(models, tables, observation, bimodal),
            FilterPhase::Initialized | FilterPhase::Streaming => {
                self.update_frame(models, tables, observation, bimodal)
            }
        }
    }

    /// First-frame initialization.
    pub fn init_frame<'a, M, I>(
        &mut self,
        models: I,
        tables: &DenseTables,
        observation: &[f64],
        bimodal: bool,
    ) -> Result<f64>
    where
        M: ClassModel + ?Sized + 'a,
        I: IntoIterator<Item = &'a M>,
    {
        let mut norm = 0.0;
        for (i, model) in models.into_iter().enumerate() {
            let n = model.state_count();
            let alpha = &mut self.scratch[i];
            alpha.clear(n);
            let mut mass = 0.0;
            match model.topology() {
                Topology::FullyConnected => {
                    for k in 0..n {
                        let a = model.state_prior(k) * emission(model, k, observation, bimodal);
                        alpha.set_continue(k, a);
                        mass += a;
                    }
                }
                Topology::StrictlyOrdered => {
                    if n > 0 {
                        let a = tables.prior[i] * emission(model, 0, observation, bimodal);
                        alpha.set_continue(0, a);
                        mass = a;
                    }
                }
            }
            self.scratch_instant[i] = mass;
            norm += mass;
        }
        self.commit(norm)?;
        self.phase = FilterPhase::Initialized;
        trace!(norm, "frontier init frame");
        Ok(norm)
    }

    /// One step of the frontier recursion.
    pub fn update_frame<'a, M, I>(
        &mut self,
        models: I,
        tables: &DenseTables,
        observation: &[f64],
        bimodal: bool,
    ) -> Result<f64>
    where
        M: ClassModel + ?Sized + 'a,
        I: IntoIterator<Item = &'a M>,
    {
        for (i, f) in self.forward.iter().enumerate() {
            self.frontier_soft[i] = f.sum(ExitSelector::SoftExit);
            self.frontier_hard[i] = f.sum(ExitSelector::HardExit);
        }

        let mut norm = 0.0;
        for (dst, model) in models.into_iter().enumerate() {
            let n = model.state_count();

            let mut inflow = 0.0;
            for src in 0..self.frontier_soft.len() {
                inflow += self.frontier_soft[src] * tables.transition(src, dst)
                    + tables.prior[dst] * self.frontier_hard[src];
            }

            self.front.clear();
            self.front.resize(n, 0.0);
            front_mass(model, &self.forward[dst], inflow, &mut self.front);

            let eta = tables.exit_transition[dst];
            let alpha = &mut self.scratch[dst];
            alpha.clear(n);
            let mut mass = 0.0;
            for k in 0..n {
                let m = emission(model, k, observation, bimodal) * self.front[k];
                alpha.partition(k, m, model.exit_probability(k), eta);
                mass += m;
            }
            self.scratch_instant[dst] = mass;
            norm += mass;
        }
        self.commit(norm)?;
        self.phase = FilterPhase::Streaming;
        trace!(norm, frame = self.frames, "frontier update frame");
        Ok(norm)
    }

    /// Normalize the scratch buffers by `norm` and make them current, along
    /// with the per-class masses of the frame.
    fn commit(&mut self, norm: f64) -> Result<()> {
        if !(norm > 0.0 && norm.is_finite()) {
            warn!(norm, frame = self.frames, "degenerate frame, forward state held");
            return Err(HierarchyError::DegenerateFrame);
        }
        for alpha in self.scratch.iter_mut() {
            alpha.scale(norm);
        }
        core::mem::swap(&mut self.forward, &mut self.scratch);
        core::mem::swap(&mut self.instant, &mut self.scratch_instant);
        self.frames += 1;
        Ok(())
    }
}

#[inline]
fn emission<M: ClassModel + ?Sized>(model: &M, state: usize, observation: &[f64], bimodal: bool) -> f64 {
    if bimodal {
        model.emission_input(state, observation)
    } else {
        model.emission(state, observation)
    }
}
