/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Per-topology front-mass recursions.
//!
//! Both recursions read the destination class's *previous* continue array
//! and an `inflow` term computed by the engine from the other classes'
//! frontier vectors:
//!
//! ```text
//! inflow(dst) = Σ_src soft(src) · T[src → dst] + prior(dst) · hard(src)
//! ```
//!
//! Continue mass is re-inflated by `1 / (1 − exit(j))` before it travels,
//! recovering the pre-partition mass of state `j`.
//!
//! **Fully connected:**
//! `front[k] = Σ_j a[j → k] / (1 − exit(j)) · α_c[j]  +  π[k] · inflow`
//!
//! **Strictly ordered:**
//! ```text
//! front[0] = a[0 → 0] · α_c[0]  +  inflow
//! front[k] = a[k → k] / (1 − exit(k)) · α_c[k]
//!          + a[k−1 → k] / (1 − exit(k−1)) · α_c[k−1]        (k > 0)
//! ```

use crate::model::{ClassModel, Topology};

use super::ForwardState;

/// Continue mass of a state divided by its stay probability.
///
/// A state with exit probability 1 keeps no continue mass, so nothing
/// travels from it.
#[inline]
fn rescaled(mass: f64, exit_probability: f64) -> f64 {
    let stay = 1.0 - exit_probability;
    if stay > 0.0 {
        mass / stay
    } else {
        0.0
    }
}

/// Fill `front` for the destination class `model`.
pub(crate) fn front_mass<M: ClassModel + ?Sized>(
    model: &M,
    previous: &ForwardState,
    inflow: f64,
    front: &mut [f64],
) {
    match model.topology() {
        Topology::FullyConnected => fully_connected(model, previous, inflow, front),
        Topology::StrictlyOrdered => strictly_ordered(model, previous, inflow, front),
    }
}

fn fully_connected<M: ClassModel + ?Sized>(
    model: &M,
    previous: &ForwardState,
    inflow: f64,
    front: &mut [f64],
) {
    let alpha = previous.continuing();
    let n = front.len();
    for k in 0..n {
        let mut mass = 0.0;
        for (j, &a) in alpha.iter().enumerate().take(n) {
            mass += model.transition(j, k) * rescaled(a, model.exit_probability(j));
        }
        front[k] = mass + model.state_prior(k) * inflow;
    }
}

fn strictly_ordered<M: ClassModel + ?Sized>(
    model: &M,
    previous: &ForwardState,
    inflow: f64,
    front: &mut [f64],
) {
    let alpha = previous.continuing();
    let n = front.len();
    if n == 0 {
        return;
    }
    // The entry state is not rescaled by its exit probability.
    front[0] = model.transition(0, 0) * alpha[0] + inflow;
    for k in 1..n {
        front[k] = model.transition(k, k) * rescaled(alpha[k], model.exit_probability(k))
            + model.transition(k - 1, k) * rescaled(alpha[k - 1], model.exit_probability(k - 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::model::Regression;

    /// Emission-free model with fixed transitions for checking the recursions.
    struct Fixed {
        topology: Topology,
        prior: Vec<f64>,
        matrix: Vec<f64>,
        exit: Vec<f64>,
    }

    impl ClassModel for Fixed {
        fn state_count(&self) -> usize {
            self.exit.len()
        }
        fn topology(&self) -> Topology {
            self.topology
        }
        fn dimension(&self) -> usize {
            1
        }
        fn input_dimension(&self) -> usize {
            1
        }
        fn state_prior(&self, state: usize) -> f64 {
            self.prior[state]
        }
        fn transition(&self, from: usize, to: usize) -> f64 {
            self.matrix[from * self.exit.len() + to]
        }
        fn exit_probability(&self, state: usize) -> f64 {
            self.exit[state]
        }
        fn set_exit_point(&mut self, _: usize, _: f64) -> Result<()> {
            Ok(())
        }
        fn reset_exit_probabilities(&mut self) {}
        fn emission(&self, _: usize, _: &[f64]) -> f64 {
            1.0
        }
        fn emission_input(&self, _: usize, _: &[f64]) -> f64 {
            1.0
        }
        fn update_results(&mut self, _: &ForwardState, _: f64) {}
        fn smoothed_log_likelihood(&self) -> f64 {
            0.0
        }
        fn regression(&self, _: &ForwardState, _: &[f64]) -> Regression {
            Regression::default()
        }
        fn reset(&mut self) {}
    }

    fn previous(continuing: &[f64]) -> ForwardState {
        let mut f = ForwardState::zeros(continuing.len());
        for (k, &v) in continuing.iter().enumerate() {
            f.set_continue(k, v);
        }
        f
    }

    #[test]
    fn strictly_ordered_moves_forward_only() {
        let model = Fixed {
            topology: Topology::StrictlyOrdered,
            prior: vec![1.0, 0.0, 0.0],
            matrix: vec![
                0.5, 0.5, 0.0, //
                0.0, 0.5, 0.5, //
                0.0, 0.0, 1.0,
            ],
            exit: vec![0.0, 0.0, 0.5],
        };
        let prev = previous(&[0.2, 0.3, 0.25]);
        let mut front = [0.0; 3];
        front_mass(&model, &prev, 0.1, &mut front);

        assert!((front[0] - (0.5 * 0.2 + 0.1)).abs() < 1e-12);
        assert!((front[1] - (0.5 * 0.3 + 0.5 * 0.2)).abs() < 1e-12);
        // state 2 rescaled by 1 / (1 − 0.5)
        assert!((front[2] - (1.0 * 0.25 / 0.5 + 0.5 * 0.3)).abs() < 1e-12);
    }

    #[test]
    fn strictly_ordered_entry_state_is_not_rescaled() {
        let model = Fixed {
            topology: Topology::StrictlyOrdered,
            prior: vec![1.0, 0.0],
            matrix: vec![0.6, 0.4, 0.0, 1.0],
            exit: vec![0.5, 0.0],
        };
        let prev = previous(&[0.2, 0.3]);
        let mut front = [0.0; 2];
        front_mass(&model, &prev, 0.1, &mut front);

        assert!((front[0] - (0.6 * 0.2 + 0.1)).abs() < 1e-12);
        // the advance out of state 0 does see the 1 / (1 − 0.5) discount
        assert!((front[1] - (1.0 * 0.3 + 0.4 * 0.2 / 0.5)).abs() < 1e-12);
    }

    #[test]
    fn fully_connected_spreads_inflow_by_prior() {
        let model = Fixed {
            topology: Topology::FullyConnected,
            prior: vec![0.25, 0.75],
            matrix: vec![0.9, 0.1, 0.2, 0.8],
            exit: vec![0.0, 0.5],
        };
        let prev = previous(&[0.4, 0.3]);
        let mut front = [0.0; 2];
        front_mass(&model, &prev, 0.2, &mut front);

        let from1 = 0.3 / 0.5;
        assert!((front[0] - (0.9 * 0.4 + 0.2 * from1 + 0.25 * 0.2)).abs() < 1e-12);
        assert!((front[1] - (0.1 * 0.4 + 0.8 * from1 + 0.75 * 0.2)).abs() < 1e-12);
    }

    #[test]
    fn certain_exit_carries_no_continue_mass() {
        assert_eq!(rescaled(0.0, 1.0), 0.0);
        assert!((rescaled(0.3, 0.25) - 0.4).abs() < 1e-12);
    }
}
