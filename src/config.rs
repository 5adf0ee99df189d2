/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Runtime configuration for the hierarchy and the reference class model.

/// Policy for combining per-class regression outputs into one hierarchy output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegressionEstimator {
    /// Copy the output of the most likely class verbatim.
    Likeliest,
    /// Weight every class output by its normalized instantaneous likelihood.
    ///
    /// Variances are blended with the same weights; the spread of the class
    /// means is not added.
    #[default]
    Mixture,
}

/// Which states a single class consults when producing its regression output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClassRegressionEstimator {
    /// Every state, weighted by its forward mass.
    Full,
    /// States inside the progress window around the most likely state.
    #[default]
    Windowed,
    /// Only the most likely state.
    Likeliest,
}

/// Configuration for a [`crate::hierarchy::Hierarchy`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HierarchyConfig {
    /// Decode the input stream only and regress the output stream.
    /// Default: false.
    pub bimodal: bool,

    /// Blending policy for hierarchy-level regression. Default: `Mixture`.
    pub regression_estimator: RegressionEstimator,

    /// Exit transition assigned to every class when defaults are derived.
    /// Default: 0.1.
    pub default_exit_transition: f64,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            bimodal: false,
            regression_estimator: RegressionEstimator::Mixture,
            default_exit_transition: 0.1,
        }
    }
}

impl HierarchyConfig {
    /// Default configuration with dual-stream regression enabled.
    pub fn bimodal() -> Self {
        Self {
            bimodal: true,
            ..Self::default()
        }
    }
}

/// Configuration for a [`crate::gaussian::GaussianHmm`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GaussianHmmConfig {
    /// Number of frames averaged into the smoothed log-likelihood. Default: 5.
    pub likelihood_window: usize,

    /// Exit probability of the last state after a reset of the exit points.
    /// Default: 0.1.
    pub exit_probability_last_state: f64,

    /// Per-class regression policy. Default: `Windowed`.
    pub regression_estimator: ClassRegressionEstimator,
}

impl Default for GaussianHmmConfig {
    fn default() -> Self {
        Self {
            likelihood_window: 5,
            exit_probability_last_state: 0.1,
            regression_estimator: ClassRegressionEstimator::Windowed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = HierarchyConfig::default();
        assert!(!c.bimodal);
        assert_eq!(c.regression_estimator, RegressionEstimator::Mixture);
        assert!((c.default_exit_transition - 0.1).abs() < 1e-12);

        let g = GaussianHmmConfig::default();
        assert_eq!(g.likelihood_window, 5);
        assert_eq!(g.regression_estimator, ClassRegressionEstimator::Windowed);
    }

    #[test]
    fn bimodal_keeps_other_defaults() {
        let c = HierarchyConfig::bimodal();
        assert!(c.bimodal);
        assert_eq!(c.regression_estimator, RegressionEstimator::Mixture);
    }
}
