/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Hierarchy registry: class models keyed by label, the inter-class tables,
//! and the streaming run over them.
//!
//! # Lifecycle
//!
//! ```text
//! add_class / remove_class ──► tables re-derived (if the count changed) ──► reset
//!                                                                          │
//!             filter(frame) ◄──────────────────────────────────────────────┘
//!             Uninitialized ─► Initialized ─► Streaming ─► … ─► reset
//! ```
//!
//! Structural changes reset the run. Tables loaded or set by hand survive
//! until the next structural change, which replaces them with uniform
//! defaults.
//!
//! # Example
//!
//! ```rust,ignore
//! use hhmm_core::gaussian::{GaussianHmm, GaussianState};
//! use hhmm_core::hierarchy::Hierarchy;
//!
//! let mut h: Hierarchy<GaussianHmm> = Hierarchy::default();
//! h.add_class("circle".into(), circle_model)?;
//! h.add_class("swipe".into(), swipe_model)?;
//! for frame in stream {
//!     h.filter(&frame)?;
//!     println!("{:?}", h.results().likeliest());
//! }
//! ```

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::config::HierarchyConfig;
use crate::error::{HierarchyError, Result};
use crate::frontier::{FilterPhase, ForwardState, FrontierEngine};
use crate::model::{ClassModel, Label};
use crate::results::HierarchyResults;
use crate::tables::{DenseTables, TransitionTables};

/// A dynamic set of class models combined into one hierarchical HMM.
///
/// Classes are kept in label order. That order defines the class index used
/// by the forward engine, the result vectors and the portable tables.
#[derive(Debug)]
pub struct Hierarchy<M: ClassModel, L: Label = String> {
    classes: BTreeMap<L, M>,
    tables: TransitionTables<L>,
    dense: DenseTables,
    config: HierarchyConfig,
    engine: FrontierEngine,
    results: HierarchyResults<L>,
}

impl<M: ClassModel, L: Label> Default for Hierarchy<M, L> {
    fn default() -> Self {
        Self::new(HierarchyConfig::default())
    }
}

impl<M: ClassModel + Clone, L: Label> Clone for Hierarchy<M, L> {
    /// Deep copy of the models and tables. The copy starts a fresh run.
    fn clone(&self) -> Self {
        let mut copy = Self {
            classes: self.classes.clone(),
            tables: self.tables.clone(),
            dense: self.dense.clone(),
            config: self.config.clone(),
            engine: FrontierEngine::new(),
            results: HierarchyResults::default(),
        };
        copy.reset();
        copy
    }
}

impl<M: ClassModel, L: Label> Hierarchy<M, L> {
    /// Empty hierarchy.
    pub fn new(config: HierarchyConfig) -> Self {
        Self {
            classes: BTreeMap::new(),
            tables: TransitionTables::new(),
            dense: DenseTables::default(),
            config,
            engine: FrontierEngine::new(),
            results: HierarchyResults::default(),
        }
    }

    /// Hierarchy over already-configured models with uniform tables.
    ///
    /// Unlike [`Self::add_class`], the models' exit points are left as they are.
    #[cfg_attr(not(feature = "serde"), allow(dead_code))]
    pub(crate) fn from_classes(config: HierarchyConfig, classes: BTreeMap<L, M>) -> Self {
        let mut h = Self::new(config);
        h.classes = classes;
        let labels: Vec<&L> = h.classes.keys().collect();
        h.tables.derive_uniform(&labels, h.config.default_exit_transition);
        h.refresh();
        h.reset();
        h
    }

    // ── Registry ──────────────────────────────────────────────────────────

    /// Hierarchy configuration.
    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// `true` when no class has been added.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class labels in order.
    pub fn labels(&self) -> impl Iterator<Item = &L> {
        self.classes.keys()
    }

    /// Classes and their models in label order.
    pub fn classes(&self) -> impl Iterator<Item = (&L, &M)> {
        self.classes.iter()
    }

    /// Model of `label`.
    pub fn class(&self, label: &L) -> Option<&M> {
        self.classes.get(label)
    }

    /// `true` if `label` is a class of this hierarchy.
    pub fn contains(&self, label: &L) -> bool {
        self.classes.contains_key(label)
    }

    /// Insert `model` under `label`.
    ///
    /// Fails with [`HierarchyError::DuplicateLabel`] if the label exists.
    pub fn add_class(&mut self, label: L, model: M) -> Result<()> {
        if self.classes.contains_key(&label) {
            return Err(HierarchyError::DuplicateLabel(label.to_string()));
        }
        debug!(label = %label, states = model.state_count(), "add class");
        self.classes.insert(label, model);
        self.update_transition_parameters();
        self.reset();
        Ok(())
    }

    /// Remove `label` and return its model.
    ///
    /// Fails with [`HierarchyError::NotFound`] if the label is absent.
    pub fn remove_class(&mut self, label: &L) -> Result<M> {
        let model = self
            .classes
            .remove(label)
            .ok_or_else(|| HierarchyError::NotFound(label.to_string()))?;
        debug!(label = %label, "remove class");
        self.update_transition_parameters();
        self.reset();
        Ok(model)
    }

    /// Re-derive defaults if the class count differs from the tables'.
    fn update_transition_parameters(&mut self) {
        if self.classes.len() == self.tables.len() {
            return;
        }
        self.derive_default_parameters();
    }

    /// Uniform prior and transitions, the configured exit transition, and
    /// default exit points on every model.
    ///
    /// Discards any loaded or hand-set table values.
    pub fn derive_default_parameters(&mut self) {
        let labels: Vec<&L> = self.classes.keys().collect();
        self.tables.derive_uniform(&labels, self.config.default_exit_transition);
        for model in self.classes.values_mut() {
            model.reset_exit_probabilities();
        }
        self.refresh();
        debug!(classes = self.classes.len(), "default parameters derived");
    }

    /// Rescale the prior and every transition row to sum to 1.
    ///
    /// Rows (and a prior) summing to zero are left untouched.
    pub fn normalize_transitions(&mut self) {
        let labels: Vec<&L> = self.classes.keys().collect();
        self.tables.normalize(&labels);
        self.refresh();
    }

    /// Set the exit probability of `state` on every class model.
    ///
    /// Validated against every model before any is changed.
    pub fn propagate_exit_points(&mut self, state: usize, probability: f64) -> Result<()> {
        if let Some(model) = self.classes.values().find(|m| state >= m.state_count()) {
            return Err(HierarchyError::OutOfRange {
                index: state,
                len: model.state_count(),
            });
        }
        if !(0.0..=1.0).contains(&probability) {
            return Err(HierarchyError::InvalidParameter(format!(
                "exit probability {probability} outside [0, 1]"
            )));
        }
        for model in self.classes.values_mut() {
            model.set_exit_point(state, probability)?;
        }
        Ok(())
    }

    // ── Tables ────────────────────────────────────────────────────────────

    /// Inter-class tables.
    pub fn tables(&self) -> &TransitionTables<L> {
        &self.tables
    }

    /// Prior of `label`.
    pub fn prior(&self, label: &L) -> f64 {
        self.tables.prior(label)
    }

    /// Transition weight from `src` to `dst`.
    pub fn transition(&self, src: &L, dst: &L) -> f64 {
        self.tables.transition(src, dst)
    }

    /// Exit transition of `label`.
    pub fn exit_transition(&self, label: &L) -> f64 {
        self.tables.exit_transition(label)
    }

    /// Set the prior of an existing class.
    pub fn set_prior(&mut self, label: &L, probability: f64) -> Result<()> {
        self.require(label)?;
        self.tables.set_prior(label.clone(), probability);
        self.refresh();
        Ok(())
    }

    /// Set the transition weight between two existing classes.
    pub fn set_transition(&mut self, src: &L, dst: &L, probability: f64) -> Result<()> {
        self.require(src)?;
        self.require(dst)?;
        self.tables.set_transition(src.clone(), dst.clone(), probability);
        self.refresh();
        Ok(())
    }

    /// Set the exit transition of an existing class.
    pub fn set_exit_transition(&mut self, label: &L, probability: f64) -> Result<()> {
        self.require(label)?;
        self.tables.set_exit_transition(label.clone(), probability);
        self.refresh();
        Ok(())
    }

    /// Swap in fully validated tables.
    #[cfg_attr(not(feature = "serde"), allow(dead_code))]
    pub(crate) fn install_tables(&mut self, tables: TransitionTables<L>) {
        self.tables = tables;
        self.refresh();
        debug!(classes = self.classes.len(), "tables loaded");
    }

    fn require(&self, label: &L) -> Result<()> {
        if self.classes.contains_key(label) {
            Ok(())
        } else {
            Err(HierarchyError::NotFound(label.to_string()))
        }
    }

    fn refresh(&mut self) {
        let labels: Vec<&L> = self.classes.keys().collect();
        self.dense = self.tables.dense(&labels);
    }

    // ── Streaming ─────────────────────────────────────────────────────────

    /// Start a new run: clear forward state, frontier vectors, results and
    /// every model's per-run state.
    pub fn reset(&mut self) {
        let counts: Vec<usize> = self.classes.values().map(|m| m.state_count()).collect();
        self.engine.reset(&counts);
        self.results.clear();
        for model in self.classes.values_mut() {
            model.reset();
        }
        debug!(classes = counts.len(), "hierarchy reset");
    }

    /// Absorb one observation frame and refresh the results.
    ///
    /// In bimodal mode `observation` is the input stream only. A
    /// [`HierarchyError::DegenerateFrame`] leaves the run and results as they
    /// were; the next frame can be filtered normally.
    pub fn filter(&mut self, observation: &[f64]) -> Result<()> {
        if self.classes.is_empty() {
            return Err(HierarchyError::Empty);
        }
        if let Some(label) = self.classes.iter().find(|(_, m)| !m.is_trained()).map(|(l, _)| l) {
            return Err(HierarchyError::NotTrained(label.to_string()));
        }
        let bimodal = self.config.bimodal;
        for model in self.classes.values() {
            let expected = if bimodal {
                model.input_dimension()
            } else {
                model.dimension()
            };
            if observation.len() != expected {
                return Err(HierarchyError::DimensionMismatch {
                    expected,
                    found: observation.len(),
                });
            }
        }
        if self.engine.class_count() != self.classes.len() {
            self.reset();
        }

        self.engine.step(self.classes.values(), &self.dense, observation, bimodal)?;

        let forward = self.engine.forward();
        let instant = self.engine.instant_likelihoods();
        for ((model, f), &l) in self.classes.values_mut().zip(forward).zip(instant) {
            model.update_results(f, l);
        }
        self.update_results();

        if bimodal {
            let regressions = self
                .classes
                .values()
                .zip(self.engine.forward())
                .map(|(m, f)| m.regression(f, observation))
                .collect();
            self.results.update_regression(regressions, self.config.regression_estimator);
        }
        trace!(
            frame = self.engine.frames(),
            likeliest = ?self.results.likeliest(),
            "frame filtered"
        );
        Ok(())
    }

    /// Recompute the result snapshot from the committed forward state and
    /// the models' smoothed likelihoods.
    ///
    /// Results are cleared while no frame has been absorbed.
    pub fn update_results(&mut self) {
        if self.engine.phase() == FilterPhase::Uninitialized
            || self.engine.class_count() != self.classes.len()
        {
            self.results.clear();
            return;
        }
        self.results.update(
            self.classes.iter(),
            self.engine.forward(),
            self.engine.instant_likelihoods(),
        );
    }

    /// Result snapshot of the last frame.
    pub fn results(&self) -> &HierarchyResults<L> {
        &self.results
    }

    /// Run phase.
    pub fn phase(&self) -> FilterPhase {
        self.engine.phase()
    }

    /// Frames absorbed since the last reset.
    pub fn frames(&self) -> u64 {
        self.engine.frames()
    }

    /// Normalized forward state of `label`.
    pub fn forward(&self, label: &L) -> Option<&ForwardState> {
        let index = self.classes.keys().position(|l| l == label)?;
        self.engine.forward().get(index)
    }

    /// The frontier engine of the current run.
    pub fn engine(&self) -> &FrontierEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::ExitSelector;
    use crate::gaussian::{GaussianHmm, GaussianState};

    fn model(means: &[f64]) -> GaussianHmm {
        let states = means
            .iter()
            .map(|&m| GaussianState::new(vec![m], vec![0.5]).unwrap())
            .collect();
        GaussianHmm::left_right(states).unwrap()
    }

    fn hierarchy() -> Hierarchy<GaussianHmm> {
        let mut h = Hierarchy::default();
        h.add_class("a".to_string(), model(&[0.0, 1.0])).unwrap();
        h.add_class("b".to_string(), model(&[3.0, 2.0])).unwrap();
        h
    }

    #[test]
    fn test_add_class_derives_uniform_tables() {
        let h = hierarchy();
        let a = "a".to_string();
        let b = "b".to_string();
        assert_eq!(h.prior(&a), 0.5);
        assert_eq!(h.transition(&a, &b), 0.5);
        assert!((h.exit_transition(&b) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_duplicate_and_missing_labels() {
        let mut h = hierarchy();
        assert_eq!(
            h.add_class("a".to_string(), model(&[0.0])),
            Err(HierarchyError::DuplicateLabel("a".into()))
        );
        assert_eq!(
            h.remove_class(&"z".to_string()).unwrap_err(),
            HierarchyError::NotFound("z".into())
        );
        assert!(h.set_prior(&"z".to_string(), 1.0).is_err());
    }

    #[test]
    fn test_filter_preconditions() {
        let mut h: Hierarchy<GaussianHmm> = Hierarchy::default();
        assert_eq!(h.filter(&[0.0]), Err(HierarchyError::Empty));

        let mut h = hierarchy();
        assert_eq!(
            h.filter(&[0.0, 0.0]),
            Err(HierarchyError::DimensionMismatch { expected: 1, found: 2 })
        );
        assert_eq!(h.phase(), FilterPhase::Uninitialized);
    }

    #[test]
    fn test_filter_streams() {
        let mut h = hierarchy();
        h.filter(&[0.0]).unwrap();
        assert_eq!(h.phase(), FilterPhase::Initialized);
        h.filter(&[0.8]).unwrap();
        assert_eq!(h.phase(), FilterPhase::Streaming);
        assert_eq!(h.results().likeliest(), Some(&"a".to_string()));
        let total: f64 = h.labels().map(|l| h.forward(l).unwrap().sum(ExitSelector::All)).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_manual_tables_survive_until_structural_change() {
        let mut h = hierarchy();
        let a = "a".to_string();
        h.set_prior(&a, 3.0).unwrap();
        h.set_prior(&"b".to_string(), 1.0).unwrap();
        h.normalize_transitions();
        assert!((h.prior(&a) - 0.75).abs() < 1e-12);

        h.add_class("c".to_string(), model(&[5.0])).unwrap();
        assert!((h.prior(&a) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_propagate_exit_points() {
        let mut h = hierarchy();
        h.propagate_exit_points(0, 0.2).unwrap();
        assert!(h.classes().all(|(_, m)| m.exit_probability(0) == 0.2));
        assert_eq!(
            h.propagate_exit_points(5, 0.2),
            Err(HierarchyError::OutOfRange { index: 5, len: 2 })
        );
    }

    #[test]
    fn test_clone_starts_fresh_run() {
        let mut h = hierarchy();
        h.filter(&[0.0]).unwrap();
        let copy = h.clone();
        assert_eq!(copy.phase(), FilterPhase::Uninitialized);
        assert!(copy.results().is_empty());
        assert_eq!(copy.tables(), h.tables());
    }
}
