/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Inter-class parameter tables: prior, transition and exit transition.
//!
//! # Invariants
//!
//! - After [`TransitionTables::derive_uniform`] the prior sums to 1 and every
//!   transition row sums to 1.
//! - [`TransitionTables::normalize`] never divides by a zero sum; such a row
//!   (or prior) is left as it is.
//! - The tables carry no order of their own. Every iteration is driven by the
//!   caller's label slice, so dense views and portable exports follow the
//!   hierarchy's class order.

use hashbrown::HashMap;

use crate::model::Label;

/// Prior, transition and exit-transition weights keyed by class label.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionTables<L: Label> {
    prior: HashMap<L, f64>,
    transition: HashMap<L, HashMap<L, f64>>,
    exit_transition: HashMap<L, f64>,
}

impl<L: Label> Default for TransitionTables<L> {
    fn default() -> Self {
        Self {
            prior: HashMap::new(),
            transition: HashMap::new(),
            exit_transition: HashMap::new(),
        }
    }
}

impl<L: Label> TransitionTables<L> {
    /// Empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of classes the prior was derived or loaded for.
    pub fn len(&self) -> usize {
        self.prior.len()
    }

    /// `true` when no class has a prior.
    pub fn is_empty(&self) -> bool {
        self.prior.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.prior.clear();
        self.transition.clear();
        self.exit_transition.clear();
    }

    /// Reset to uniform prior and transitions, and a constant exit transition.
    pub fn derive_uniform(&mut self, labels: &[&L], exit_transition: f64) {
        self.clear();
        let n = labels.len();
        if n == 0 {
            return;
        }
        let uniform = 1.0 / n as f64;
        for &src in labels {
            self.prior.insert(src.clone(), uniform);
            self.exit_transition.insert(src.clone(), exit_transition);
            let row = labels.iter().map(|&dst| (dst.clone(), uniform)).collect();
            self.transition.insert(src.clone(), row);
        }
    }

    /// Rescale so the prior and each transition row sum to 1.
    ///
    /// Missing entries count as zero. Zero sums are skipped.
    pub fn normalize(&mut self, labels: &[&L]) {
        let mut prior_sum = 0.0;
        for &src in labels {
            prior_sum += self.prior(src);
            let row = self.transition.entry(src.clone()).or_default();
            let row_sum: f64 = labels.iter().map(|&dst| row.get(dst).copied().unwrap_or(0.0)).sum();
            if row_sum > 0.0 {
                for &dst in labels {
                    if let Some(p) = row.get_mut(dst) {
                        *p /= row_sum;
                    }
                }
            }
        }
        if prior_sum > 0.0 {
            for &label in labels {
                if let Some(p) = self.prior.get_mut(label) {
                    *p /= prior_sum;
                }
            }
        }
    }

    /// Prior of `label`; zero if unset.
    pub fn prior(&self, label: &L) -> f64 {
        self.prior.get(label).copied().unwrap_or(0.0)
    }

    /// Transition weight from `src` to `dst`; zero if unset.
    pub fn transition(&self, src: &L, dst: &L) -> f64 {
        self.transition
            .get(src)
            .and_then(|row| row.get(dst))
            .copied()
            .unwrap_or(0.0)
    }

    /// Exit transition of `label`; zero if unset.
    pub fn exit_transition(&self, label: &L) -> f64 {
        self.exit_transition.get(label).copied().unwrap_or(0.0)
    }

    /// Set the prior of `label`.
    pub fn set_prior(&mut self, label: L, probability: f64) {
        self.prior.insert(label, probability);
    }

    /// Set the transition weight from `src` to `dst`.
    pub fn set_transition(&mut self, src: L, dst: L, probability: f64) {
        self.transition.entry(src).or_default().insert(dst, probability);
    }

    /// Set the exit transition of `label`.
    pub fn set_exit_transition(&mut self, label: L, probability: f64) {
        self.exit_transition.insert(label, probability);
    }

    /// Index-addressed copy of the tables in `labels` order.
    pub fn dense(&self, labels: &[&L]) -> DenseTables {
        let n = labels.len();
        let mut transition = Vec::with_capacity(n * n);
        for &src in labels {
            for &dst in labels {
                transition.push(self.transition(src, dst));
            }
        }
        DenseTables {
            prior: labels.iter().map(|&l| self.prior(l)).collect(),
            transition,
            exit_transition: labels.iter().map(|&l| self.exit_transition(l)).collect(),
        }
    }
}

/// Tables laid out by class index for the per-frame recursion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DenseTables {
    /// Class prior, by class index.
    pub prior: Vec<f64>,
    /// Row-major `n × n` transition matrix, `transition[src * n + dst]`.
    pub transition: Vec<f64>,
    /// Exit transition, by class index.
    pub exit_transition: Vec<f64>,
}

impl DenseTables {
    /// Number of classes.
    pub fn len(&self) -> usize {
        self.prior.len()
    }

    /// `true` for an empty hierarchy.
    pub fn is_empty(&self) -> bool {
        self.prior.is_empty()
    }

    /// Transition weight between class indices.
    #[inline]
    pub fn transition(&self, src: usize, dst: usize) -> f64 {
        self.transition[src * self.len() + dst]
    }
}
