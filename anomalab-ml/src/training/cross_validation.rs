//! Stratified K-fold cross-validation splits.

use crate::data::{INLIER, OUTLIER};
use crate::error::MlError;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Cross-validation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidation {
    #[serde(default = "default_n_folds")]
    pub n_folds: usize,
    #[serde(default = "default_true")]
    pub shuffle: bool,
}

fn default_n_folds() -> usize {
    5
}

fn default_true() -> bool {
    true
}

impl Default for CrossValidation {
    fn default() -> Self {
        Self {
            n_folds: default_n_folds(),
            shuffle: true,
        }
    }
}

/// A single train/validation split
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    pub fold_idx: usize,
    pub train_indices: Vec<usize>,
    pub validation_indices: Vec<usize>,
}

/// Stratified K-fold splitter: every fold keeps the class proportions.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    shuffle: bool,
    seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, shuffle: bool, seed: u64) -> Result<Self, MlError> {
        if n_splits < 2 {
            return Err(MlError::config(format!(
                "n_folds must be at least 2, got {n_splits}"
            )));
        }
        Ok(Self {
            n_splits,
            shuffle,
            seed,
        })
    }

    pub fn from_config(config: &CrossValidation, seed: u64) -> Result<Self, MlError> {
        Self::new(config.n_folds, config.shuffle, seed)
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Split row indices of `labels` into folds.
    ///
    /// Each class must have at least `n_splits` rows so every validation
    /// fold holds both inliers and outliers.
    pub fn split(&self, labels: &[u8]) -> Result<Vec<Fold>, MlError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        // Continue the round-robin across classes so fold sizes stay balanced.
        let mut next = 0;

        for label in [INLIER, OUTLIER] {
            let mut indices: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|(_, l)| **l == label)
                .map(|(i, _)| i)
                .collect();
            if indices.len() < self.n_splits {
                return Err(MlError::training(format!(
                    "class {label} has {} rows, fewer than n_folds = {}",
                    indices.len(),
                    self.n_splits
                )));
            }
            if self.shuffle {
                indices.shuffle(&mut rng);
            }
            for idx in indices {
                folds[next % self.n_splits].push(idx);
                next += 1;
            }
        }

        Ok((0..self.n_splits)
            .map(|fold_idx| {
                let mut validation_indices = folds[fold_idx].clone();
                validation_indices.sort_unstable();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                Fold {
                    fold_idx,
                    train_indices,
                    validation_indices,
                }
            })
            .collect())
    }
}
