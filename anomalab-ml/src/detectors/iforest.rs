//! Isolation Forest anomaly detection

use super::{ModelFamily, OutlierDetector, check_columns, check_fit_input};
use crate::error::MlError;
use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Isolation Forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IsolationForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Rows drawn (without replacement) to grow each tree
    pub max_samples: usize,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
        }
    }
}

/// Isolation Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IsolationTree {
    Internal {
        feature: usize,
        threshold: f64,
        /// values < threshold
        left: Box<IsolationTree>,
        /// values >= threshold
        right: Box<IsolationTree>,
    },
    External {
        size: usize,
    },
}

impl IsolationTree {
    /// Grow a tree over `indices` until isolation or `max_height`.
    pub fn build(
        x: &Array2<f64>,
        indices: &[usize],
        height: usize,
        max_height: usize,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let n_samples = indices.len();
        if height >= max_height || n_samples <= 1 {
            return IsolationTree::External { size: n_samples };
        }

        // Only features that still vary in this node can split it.
        let splittable: Vec<(usize, f64, f64)> = (0..x.ncols())
            .filter_map(|feature| {
                let (min, max) = indices.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), &i| (lo.min(x[[i, feature]]), hi.max(x[[i, feature]])),
                );
                (max > min).then_some((feature, min, max))
            })
            .collect();
        if splittable.is_empty() {
            return IsolationTree::External { size: n_samples };
        }

        let (feature, min_val, max_val) = splittable[rng.gen_range(0..splittable.len())];
        let threshold = rng.gen_range(min_val..max_val);

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature]] < threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return IsolationTree::External { size: n_samples };
        }

        IsolationTree::Internal {
            feature,
            threshold,
            left: Box::new(Self::build(x, &left_indices, height + 1, max_height, rng)),
            right: Box::new(Self::build(x, &right_indices, height + 1, max_height, rng)),
        }
    }

    /// Path length for a sample, with the c(size) correction at leaves.
    pub fn path_length(&self, sample: ArrayView1<f64>, current_height: usize) -> f64 {
        match self {
            IsolationTree::External { size } => current_height as f64 + average_path_length(*size),
            IsolationTree::Internal {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] < *threshold {
                    left.path_length(sample, current_height + 1)
                } else {
                    right.path_length(sample, current_height + 1)
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points:
/// c(n) = 2 H(n-1) - 2(n-1)/n.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n_f = n as f64;
            2.0 * ((n_f - 1.0).ln() + EULER_GAMMA) - 2.0 * (n_f - 1.0) / n_f
        }
    }
}

/// Isolation Forest anomaly detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    params: IsolationForestParams,
    seed: u64,
    trees: Vec<IsolationTree>,
    /// Rows per tree actually used (min of max_samples and the fit size)
    psi: usize,
    n_features: Option<usize>,
}

impl IsolationForest {
    pub fn new(params: IsolationForestParams, seed: u64) -> Result<Self, MlError> {
        if params.n_estimators == 0 {
            return Err(MlError::config("iforest: n_estimators must be at least 1"));
        }
        if params.max_samples < 2 {
            return Err(MlError::config("iforest: max_samples must be at least 2"));
        }
        Ok(Self {
            params,
            seed,
            trees: Vec::new(),
            psi: 0,
            n_features: None,
        })
    }
}

impl OutlierDetector for IsolationForest {
    fn family(&self) -> ModelFamily {
        ModelFamily::IsolationForest
    }

    fn fit(&mut self, x: &Array2<f64>) -> Result<(), MlError> {
        check_fit_input(self.family(), x, 2)?;
        let n_samples = x.nrows();
        let psi = self.params.max_samples.min(n_samples);
        let max_height = (psi as f64).log2().ceil() as usize;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        self.trees = (0..self.params.n_estimators)
            .map(|_| {
                let indices = rand::seq::index::sample(&mut rng, n_samples, psi).into_vec();
                IsolationTree::build(x, &indices, 0, max_height, &mut rng)
            })
            .collect();
        self.psi = psi;
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>, MlError> {
        check_columns(self.family(), self.n_features, x)?;
        let c_n = average_path_length(self.psi);
        let n_trees = self.trees.len() as f64;

        // s(x, psi) = 2^(-E[h(x)] / c(psi))
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mean_path = self
                    .trees
                    .iter()
                    .map(|tree| tree.path_length(row, 0))
                    .sum::<f64>()
                    / n_trees;
                2.0_f64.powf(-mean_path / c_n)
            })
            .collect())
    }
}
