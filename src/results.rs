/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Per-frame result snapshot of a hierarchy.
//!
//! After every committed frame the aggregator reads, for each class in label
//! order:
//!
//! - the class's unnormalized frame mass (instant likelihood),
//! - the smoothed log-likelihood the class model maintains,
//! - the class's forward state (exit ratio) and progress.
//!
//! Both likelihood families are normalized to sum to 1 across classes. The
//! likeliest class is the arg max of the smoothed log-likelihood; on a tie the
//! first class in label order wins.

use crate::config::RegressionEstimator;
use crate::frontier::ForwardState;
use crate::model::{ClassModel, Label, Regression};

/// Results of one class for the last committed frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassResults {
    /// Class mass before the global normalization of the frame.
    pub instant_likelihood: f64,
    /// `instant_likelihood` divided by the sum over classes.
    pub instant_normalized: f64,
    /// Smoothed log-likelihood reported by the class model.
    pub smoothed_log_likelihood: f64,
    /// `exp(smoothed_log_likelihood)`. May underflow to zero.
    pub smoothed_likelihood: f64,
    /// Smoothed likelihood normalized across classes.
    pub smoothed_normalized: f64,
    /// Share of the class mass currently exiting, soft plus hard.
    pub exit_ratio: f64,
    /// Time progression reported by the class model.
    pub progress: f64,
    /// Regression output of the class (bimodal hierarchies only).
    pub regression: Regression,
}

/// Aggregate and per-class results.
#[derive(Clone, Debug, PartialEq)]
pub struct HierarchyResults<L: Label> {
    classes: Vec<(L, ClassResults)>,
    likeliest: Option<L>,
    output: Regression,
}

impl<L: Label> Default for HierarchyResults<L> {
    fn default() -> Self {
        Self {
            classes: Vec::new(),
            likeliest: None,
            output: Regression::default(),
        }
    }
}

impl<L: Label> HierarchyResults<L> {
    /// Forget every class result.
    pub fn clear(&mut self) {
        self.classes.clear();
        self.likeliest = None;
        self.output = Regression::default();
    }

    /// Most likely class of the last frame. `None` before the first frame.
    pub fn likeliest(&self) -> Option<&L> {
        self.likeliest.as_ref()
    }

    /// Results of `label`, if it took part in the last frame.
    pub fn class(&self, label: &L) -> Option<&ClassResults> {
        self.classes.iter().find(|(l, _)| l == label).map(|(_, r)| r)
    }

    /// Per-class results in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&L, &ClassResults)> {
        self.classes.iter().map(|(l, r)| (l, r))
    }

    /// Number of classes with results.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// `true` before the first frame.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Unnormalized instant likelihoods in label order.
    pub fn instant_likelihoods(&self) -> Vec<f64> {
        self.column(|r| r.instant_likelihood)
    }

    /// Normalized instant likelihoods in label order.
    pub fn instant_normalized_likelihoods(&self) -> Vec<f64> {
        self.column(|r| r.instant_normalized)
    }

    /// Smoothed log-likelihoods in label order.
    pub fn smoothed_log_likelihoods(&self) -> Vec<f64> {
        self.column(|r| r.smoothed_log_likelihood)
    }

    /// Normalized smoothed likelihoods in label order.
    pub fn smoothed_normalized_likelihoods(&self) -> Vec<f64> {
        self.column(|r| r.smoothed_normalized)
    }

    /// Exit ratios in label order.
    pub fn exit_ratios(&self) -> Vec<f64> {
        self.column(|r| r.exit_ratio)
    }

    /// Blended regression output. Empty for unimodal hierarchies.
    pub fn output(&self) -> &Regression {
        &self.output
    }

    fn column(&self, f: impl Fn(&ClassResults) -> f64) -> Vec<f64> {
        self.classes.iter().map(|(_, r)| f(r)).collect()
    }

    /// Rebuild the snapshot from the class models and the committed frame.
    ///
    /// `classes`, `forward` and `instant` must all follow label order.
    pub(crate) fn update<'a, M>(
        &mut self,
        classes: impl IntoIterator<Item = (&'a L, &'a M)>,
        forward: &[ForwardState],
        instant: &[f64],
    ) where
        L: 'a,
        M: ClassModel + ?Sized + 'a,
    {
        self.classes.clear();
        self.likeliest = None;
        let mut best = f64::NEG_INFINITY;
        for (i, (label, model)) in classes.into_iter().enumerate() {
            let smoothed_log_likelihood = model.smoothed_log_likelihood();
            if self.likeliest.is_none() || smoothed_log_likelihood > best {
                best = smoothed_log_likelihood;
                self.likeliest = Some(label.clone());
            }
            self.classes.push((
                label.clone(),
                ClassResults {
                    instant_likelihood: instant[i],
                    smoothed_log_likelihood,
                    smoothed_likelihood: smoothed_log_likelihood.exp(),
                    exit_ratio: forward[i].exit_ratio(),
                    progress: model.progress(),
                    ..ClassResults::default()
                },
            ));
        }

        let instant_sum: f64 = self.classes.iter().map(|(_, r)| r.instant_likelihood).sum();
        // shift by the max so the normalization survives very negative logs
        let shifted: Vec<f64> = self
            .classes
            .iter()
            .map(|(_, r)| (r.smoothed_log_likelihood - best).exp())
            .collect();
        let shifted_sum: f64 = shifted.iter().sum();
        for ((_, r), s) in self.classes.iter_mut().zip(shifted) {
            if instant_sum > 0.0 {
                r.instant_normalized = r.instant_likelihood / instant_sum;
            }
            if shifted_sum > 0.0 && shifted_sum.is_finite() {
                r.smoothed_normalized = s / shifted_sum;
            }
        }
    }

    /// Store each class's regression and blend them into the hierarchy output.
    ///
    /// `regressions` must follow label order.
    pub(crate) fn update_regression(&mut self, regressions: Vec<Regression>, estimator: RegressionEstimator) {
        for ((_, r), regression) in self.classes.iter_mut().zip(regressions) {
            r.regression = regression;
        }
        let likeliest = self
            .likeliest
            .as_ref()
            .and_then(|best| self.classes.iter().position(|(l, _)| l == best));
        let weights = self.instant_normalized_likelihoods();
        let outputs: Vec<&Regression> = self.classes.iter().map(|(_, r)| &r.regression).collect();
        self.output = blend(estimator, likeliest, &weights, &outputs);
    }
}

/// Combine per-class regression outputs.
///
/// `Likeliest` copies `outputs[likeliest]`. `Mixture` weights output and
/// variance of each class by `weights` (the normalized instant likelihoods).
pub fn blend(
    estimator: RegressionEstimator,
    likeliest: Option<usize>,
    weights: &[f64],
    outputs: &[&Regression],
) -> Regression {
    let dimension = outputs.first().map_or(0, |r| r.dimension());
    match estimator {
        RegressionEstimator::Likeliest => likeliest
            .and_then(|i| outputs.get(i))
            .map_or_else(|| Regression::zeros(dimension), |r| (*r).clone()),
        RegressionEstimator::Mixture => {
            let mut blended = Regression::zeros(dimension);
            for (&w, r) in weights.iter().zip(outputs) {
                for d in 0..dimension.min(r.dimension()) {
                    blended.values[d] += w * r.values[d];
                    blended.variance[d] += w * r.variance[d];
                }
            }
            blended
        }
    }
}
