/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Partitioned forward variables of one class.
//!
//! Each state carries three masses:
//!
//! ```text
//! continue   mass that stays inside the class
//! soft exit  mass leaving the class to continue in a sibling
//! hard exit  mass leaving the class and ending the hierarchy-level segment
//! ```
//!
//! After every normalized frame the three arrays of every class sum to 1
//! across the whole hierarchy.

/// Selects which forward array(s) a reduction reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitSelector {
    /// Mass that stays inside the class.
    Continue,
    /// Mass handed off to a sibling class.
    SoftExit,
    /// Mass terminating the hierarchy-level segment.
    HardExit,
    /// All three arrays.
    All,
}

/// Three parallel forward arrays indexed by state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ForwardState {
    continuing: Vec<f64>,
    soft_exit: Vec<f64>,
    hard_exit: Vec<f64>,
}

impl ForwardState {
    /// All-zero forward state for `states` states.
    pub fn zeros(states: usize) -> Self {
        Self {
            continuing: vec![0.0; states],
            soft_exit: vec![0.0; states],
            hard_exit: vec![0.0; states],
        }
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.continuing.len()
    }

    /// `true` for a state-less class.
    pub fn is_empty(&self) -> bool {
        self.continuing.is_empty()
    }

    /// Resize to `states` states and zero every entry.
    pub fn clear(&mut self, states: usize) {
        for array in [&mut self.continuing, &mut self.soft_exit, &mut self.hard_exit] {
            array.clear();
            array.resize(states, 0.0);
        }
    }

    /// Continue array.
    pub fn continuing(&self) -> &[f64] {
        &self.continuing
    }

    /// Soft-exit array.
    pub fn soft_exit(&self) -> &[f64] {
        &self.soft_exit
    }

    /// Hard-exit array.
    pub fn hard_exit(&self) -> &[f64] {
        &self.hard_exit
    }

    /// Total mass of `state` across the three arrays.
    pub fn state_mass(&self, state: usize) -> f64 {
        self.continuing[state] + self.soft_exit[state] + self.hard_exit[state]
    }

    /// Sum of the selected array(s) over all states.
    pub fn sum(&self, selector: ExitSelector) -> f64 {
        let total = |a: &[f64]| a.iter().sum::<f64>();
        match selector {
            ExitSelector::Continue => total(&self.continuing),
            ExitSelector::SoftExit => total(&self.soft_exit),
            ExitSelector::HardExit => total(&self.hard_exit),
            ExitSelector::All => {
                total(&self.continuing) + total(&self.soft_exit) + total(&self.hard_exit)
            }
        }
    }

    /// Mass currently leaving the class, soft plus hard.
    pub fn exit_mass(&self) -> f64 {
        self.sum(ExitSelector::SoftExit) + self.sum(ExitSelector::HardExit)
    }

    /// Share of the class mass that is exiting. Zero for a massless class.
    pub fn exit_ratio(&self) -> f64 {
        let total = self.sum(ExitSelector::All);
        if total > 0.0 {
            self.exit_mass() / total
        } else {
            0.0
        }
    }

    /// Index of the state with the largest total mass. First wins on ties.
    pub fn likeliest_state(&self) -> usize {
        let mut best = 0;
        for k in 1..self.len() {
            if self.state_mass(k) > self.state_mass(best) {
                best = k;
            }
        }
        best
    }

    pub(crate) fn set_continue(&mut self, state: usize, mass: f64) {
        self.continuing[state] = mass;
    }

    /// Split `mass` (emission × front) of `state` into the three arrays.
    ///
    /// `exit_probability` is the model's exit probability at `state`,
    /// `exit_transition` the hierarchy's terminal share for the class.
    pub(crate) fn partition(
        &mut self,
        state: usize,
        mass: f64,
        exit_probability: f64,
        exit_transition: f64,
    ) {
        self.hard_exit[state] = exit_transition * exit_probability * mass;
        self.soft_exit[state] = (1.0 - exit_transition) * exit_probability * mass;
        self.continuing[state] = (1.0 - exit_probability) * mass;
    }

    /// Divide every entry by `norm`.
    pub(crate) fn scale(&mut self, norm: f64) {
        for array in [&mut self.continuing, &mut self.soft_exit, &mut self.hard_exit] {
            for v in array.iter_mut() {
                *v /= norm;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_conserves_mass() {
        let mut f = ForwardState::zeros(2);
        f.partition(0, 0.8, 0.25, 0.1);
        f.partition(1, 0.2, 0.0, 0.1);
        assert!((f.sum(ExitSelector::All) - 1.0).abs() < 1e-12);
        assert!((f.sum(ExitSelector::HardExit) - 0.1 * 0.25 * 0.8).abs() < 1e-12);
        assert!((f.sum(ExitSelector::SoftExit) - 0.9 * 0.25 * 0.8).abs() < 1e-12);
        assert!((f.sum(ExitSelector::Continue) - (0.75 * 0.8 + 0.2)).abs() < 1e-12);
    }

    #[test]
    fn exit_ratio_of_empty_class_is_zero() {
        let f = ForwardState::zeros(3);
        assert_eq!(f.exit_ratio(), 0.0);
    }

    #[test]
    fn likeliest_state_first_on_ties() {
        let mut f = ForwardState::zeros(3);
        f.set_continue(1, 0.4);
        f.set_continue(2, 0.4);
        assert_eq!(f.likeliest_state(), 1);
    }

    #[test]
    fn clear_resizes() {
        let mut f = ForwardState::zeros(2);
        f.set_continue(0, 1.0);
        f.clear(4);
        assert_eq!(f.len(), 4);
        assert_eq!(f.sum(ExitSelector::All), 0.0);
    }

    #[test]
    fn scale_divides_all_arrays() {
        let mut f = ForwardState::zeros(1);
        f.partition(0, 2.0, 0.5, 0.5);
        f.scale(2.0);
        assert!((f.sum(ExitSelector::All) - 1.0).abs() < 1e-12);
    }
}
