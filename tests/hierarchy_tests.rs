//! Integration tests for the hierarchy lifecycle and the frontier recursion.

use hhmm_core::results::blend;
use hhmm_core::{
    ClassModel, ExitSelector, FilterPhase, GaussianHmm, GaussianState, Hierarchy, HierarchyConfig,
    HierarchyError, Regression, RegressionEstimator,
};

// ─── helpers ─────────────────────────────────────────────────────────────────

fn state(mean: &[f64], var: f64) -> GaussianState {
    GaussianState::new(mean.to_vec(), vec![var; mean.len()]).unwrap()
}

/// Three strictly ordered states at 0, 1, 2.
fn class_a() -> GaussianHmm {
    GaussianHmm::left_right(vec![state(&[0.0], 0.2), state(&[1.0], 0.2), state(&[2.0], 0.2)]).unwrap()
}

/// Two fully connected states at 5 and 6.
fn class_b() -> GaussianHmm {
    GaussianHmm::ergodic(
        vec![state(&[5.0], 0.2), state(&[6.0], 0.2)],
        vec![0.5, 0.5],
        vec![0.7, 0.3, 0.3, 0.7],
    )
    .unwrap()
}

fn two_classes() -> Hierarchy<GaussianHmm> {
    let mut h = Hierarchy::default();
    h.add_class("A".to_string(), class_a()).unwrap();
    h.add_class("B".to_string(), class_b()).unwrap();
    h
}

fn total_mass(h: &Hierarchy<GaussianHmm>) -> f64 {
    h.labels().map(|l| h.forward(l).unwrap().sum(ExitSelector::All)).sum()
}

fn label(s: &str) -> String {
    s.to_string()
}

// ─── scenarios ───────────────────────────────────────────────────────────────

#[test]
fn test_first_frame_favours_matching_class() {
    let mut h = two_classes();
    assert_eq!(h.prior(&label("A")), 0.5);
    assert_eq!(h.prior(&label("B")), 0.5);

    h.filter(&[0.0]).unwrap();
    let l = h.results().instant_normalized_likelihoods();
    assert!(l[0] > l[1], "A should dominate: {l:?}");
    assert!((l.iter().sum::<f64>() - 1.0).abs() < 1e-9);
}

#[test]
fn test_mass_is_conserved_over_a_run() {
    let mut h = two_classes();
    for x in [0.0, 0.4, 1.0, 1.5, 2.0, 2.1, 5.2, 5.9, 6.0, 0.1] {
        h.filter(&[x]).unwrap();
        assert!((total_mass(&h) - 1.0).abs() < 1e-9);
    }
    assert_eq!(h.phase(), FilterPhase::Streaming);
    assert_eq!(h.frames(), 10);
}

#[test]
fn test_hand_off_between_classes() {
    let mut h = two_classes();
    for x in [0.0, 1.0, 2.0, 2.0, 2.0] {
        h.filter(&[x]).unwrap();
    }
    assert_eq!(h.results().likeliest(), Some(&label("A")));
    for _ in 0..10 {
        h.filter(&[5.5]).unwrap();
    }
    assert_eq!(h.results().likeliest(), Some(&label("B")));
}

#[test]
fn test_add_then_remove_restores_tables() {
    let mut h = two_classes();
    let before = h.tables().clone();
    h.add_class(label("C"), class_a()).unwrap();
    assert!((h.prior(&label("A")) - 1.0 / 3.0).abs() < 1e-12);
    h.remove_class(&label("C")).unwrap();
    assert_eq!(h.tables(), &before);
}

#[test]
fn test_likeliest_is_deterministic() {
    let mut h = two_classes();
    h.filter(&[0.0]).unwrap();
    h.filter(&[0.5]).unwrap();
    let first = h.results().likeliest().cloned();
    h.update_results();
    assert_eq!(h.results().likeliest().cloned(), first);
}

#[test]
fn test_likeliest_tie_goes_to_first_label() {
    let mut h = Hierarchy::default();
    h.add_class(label("x"), class_a()).unwrap();
    h.add_class(label("y"), class_a()).unwrap();
    h.filter(&[0.0]).unwrap();
    assert_eq!(h.results().likeliest(), Some(&label("x")));
}

#[test]
fn test_degenerate_frame_is_recoverable() {
    let mut h = two_classes();
    h.filter(&[0.0]).unwrap();
    let before = h.results().clone();

    let err = h.filter(&[1.0e6]).unwrap_err();
    assert_eq!(err, HierarchyError::DegenerateFrame);
    assert!(err.is_recoverable());
    assert_eq!(h.results(), &before);
    assert_eq!(h.phase(), FilterPhase::Initialized);

    h.filter(&[0.5]).unwrap();
    assert_eq!(h.phase(), FilterPhase::Streaming);
}

#[test]
fn test_update_results_after_degenerate_frame_keeps_last_frame() {
    let mut h = two_classes();
    h.filter(&[0.0]).unwrap();
    let before = h.results().clone();
    let instant_before = h.engine().instant_likelihoods().to_vec();

    assert_eq!(h.filter(&[1.0e6]), Err(HierarchyError::DegenerateFrame));
    assert_eq!(h.engine().instant_likelihoods(), instant_before.as_slice());

    h.update_results();
    assert_eq!(h.results(), &before);
    let sum: f64 = h.results().instant_normalized_likelihoods().iter().sum();
    assert!((sum - 1.0).abs() < 1e-9);
}

#[test]
fn test_exit_transition_splits_exit_mass() {
    let mut h = Hierarchy::default();
    h.add_class(label("only"), class_a()).unwrap();
    h.set_exit_transition(&label("only"), 0.25).unwrap();
    h.propagate_exit_points(2, 0.5).unwrap();
    for x in [0.0, 1.0, 2.0, 2.0] {
        h.filter(&[x]).unwrap();
    }
    let f = h.forward(&label("only")).unwrap();
    let hard = f.sum(ExitSelector::HardExit);
    let soft = f.sum(ExitSelector::SoftExit);
    assert!(hard > 0.0);
    assert!((soft - 3.0 * hard).abs() < 1e-9);
    assert!(h.results().exit_ratios()[0] > 0.0);
}

#[test]
fn test_reset_returns_to_uninitialized() {
    let mut h = two_classes();
    h.filter(&[0.0]).unwrap();
    h.reset();
    assert_eq!(h.phase(), FilterPhase::Uninitialized);
    assert!(h.results().is_empty());
    assert_eq!(h.class(&label("A")).unwrap().smoothed_log_likelihood(), 0.0);
}

// ─── errors ──────────────────────────────────────────────────────────────────

#[test]
fn test_filter_on_empty_hierarchy() {
    let mut h: Hierarchy<GaussianHmm> = Hierarchy::default();
    assert_eq!(h.filter(&[0.0]), Err(HierarchyError::Empty));
}

#[test]
fn test_dimension_checked_before_any_mutation() {
    let mut h = two_classes();
    h.filter(&[0.0]).unwrap();
    let frames = h.frames();
    assert!(matches!(
        h.filter(&[0.0, 1.0]),
        Err(HierarchyError::DimensionMismatch { expected: 1, found: 2 })
    ));
    assert_eq!(h.frames(), frames);
}

// ─── bimodal ─────────────────────────────────────────────────────────────────

fn bimodal_class(output: f64) -> GaussianHmm {
    GaussianHmm::left_right(vec![state(&[0.0, output], 1.0)])
        .unwrap()
        .with_input_dimension(1)
        .unwrap()
}

#[test]
fn test_bimodal_mixture_output() {
    let mut h = Hierarchy::new(HierarchyConfig::bimodal());
    h.add_class(label("low"), bimodal_class(2.0)).unwrap();
    h.add_class(label("high"), bimodal_class(4.0)).unwrap();
    h.set_prior(&label("high"), 0.75).unwrap();
    h.set_prior(&label("low"), 0.25).unwrap();

    h.filter(&[0.0]).unwrap();
    // labels sort as ["high", "low"]
    let w = h.results().instant_normalized_likelihoods();
    assert!((w[0] - 0.75).abs() < 1e-12 && (w[1] - 0.25).abs() < 1e-12);
    assert!((h.results().output().values[0] - 3.5).abs() < 1e-12);
}

#[test]
fn test_bimodal_likeliest_output() {
    let config = HierarchyConfig {
        regression_estimator: RegressionEstimator::Likeliest,
        ..HierarchyConfig::bimodal()
    };
    let mut h = Hierarchy::new(config);
    h.add_class(label("low"), bimodal_class(2.0)).unwrap();
    h.add_class(label("high"), bimodal_class(4.0)).unwrap();
    h.filter(&[0.0]).unwrap();
    let best = h.results().likeliest().cloned().unwrap();
    let expected = if best == "high" { 4.0 } else { 2.0 };
    assert_eq!(h.results().output().values, vec![expected]);
}

#[test]
fn test_mixture_blend_of_two_outputs() {
    let a = Regression { values: vec![2.0], variance: vec![1.0] };
    let b = Regression { values: vec![4.0], variance: vec![1.0] };
    let r = blend(RegressionEstimator::Mixture, None, &[0.25, 0.75], &[&a, &b]);
    assert!((r.values[0] - 3.5).abs() < 1e-12);
}
