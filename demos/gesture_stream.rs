//! # Continuous gesture stream
//!
//! Three one-dimensional "gestures" are decoded from a single unsegmented
//! stream: a rising ramp, a falling ramp and a two-level shake. The stream
//! plays rise → shake → fall with no markers between them, and the
//! hierarchy reports the likeliest gesture, its progress and its exit ratio
//! on every frame.

use hhmm_core::{GaussianHmm, GaussianState, Hierarchy, HierarchyError};

// ── Gestures ─────────────────────────────────────────────────────────────────

fn ramp(from: f64, to: f64, states: usize) -> GaussianHmm {
    let step = (to - from) / (states - 1) as f64;
    let states = (0..states)
        .map(|k| GaussianState::new(vec![from + step * k as f64], vec![0.05]))
        .collect::<Result<Vec<_>, _>>()
        .expect("valid states");
    GaussianHmm::left_right(states).expect("valid ramp")
}

fn shake() -> GaussianHmm {
    let states = vec![
        GaussianState::new(vec![-1.0], vec![0.1]).expect("valid state"),
        GaussianState::new(vec![1.0], vec![0.1]).expect("valid state"),
    ];
    GaussianHmm::ergodic(states, vec![0.5, 0.5], vec![0.2, 0.8, 0.8, 0.2]).expect("valid shake")
}

fn stream() -> Vec<f64> {
    let mut frames = Vec::new();
    frames.extend((0..12).map(|t| t as f64 / 11.0));
    frames.extend((0..10).map(|t| if t % 2 == 0 { -1.0 } else { 1.0 }));
    frames.extend((0..12).map(|t| 1.0 - t as f64 / 11.0));
    frames
}

fn main() {
    let mut hierarchy: Hierarchy<GaussianHmm> = Hierarchy::default();
    hierarchy.add_class("rise".into(), ramp(0.0, 1.0, 6)).expect("new label");
    hierarchy.add_class("fall".into(), ramp(1.0, 0.0, 6)).expect("new label");
    hierarchy.add_class("shake".into(), shake()).expect("new label");
    hierarchy.propagate_exit_points(1, 0.05).expect("every class has two states");

    println!("{:>5}  {:>6}  {:>10}  {:>8}  {:>6}", "frame", "x", "likeliest", "progress", "exit");
    for (t, x) in stream().into_iter().enumerate() {
        match hierarchy.filter(&[x]) {
            Ok(()) => {}
            Err(HierarchyError::DegenerateFrame) => {
                println!("{t:>5}  {x:>6.2}  (no information)");
                continue;
            }
            Err(e) => panic!("filter failed: {e}"),
        }
        let results = hierarchy.results();
        let best = results.likeliest().cloned().unwrap_or_default();
        let class = results.class(&best).cloned().unwrap_or_default();
        println!(
            "{t:>5}  {x:>6.2}  {best:>10}  {:>8.2}  {:>6.3}",
            class.progress, class.exit_ratio
        );
    }
}
