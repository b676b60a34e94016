//! Synthetic benchmark data: a standard-normal inlier cluster with outliers
//! scattered in a shell well outside it.

use crate::data::dataset::{Dataset, INLIER, OUTLIER};
use crate::error::MlError;
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Parameters of a generated dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    #[serde(default = "default_inliers")]
    pub n_inliers: usize,
    #[serde(default = "default_outliers")]
    pub n_outliers: usize,
    #[serde(default = "default_features")]
    pub n_features: usize,
    #[serde(default)]
    pub seed: u64,
}

fn default_inliers() -> usize {
    950
}

fn default_outliers() -> usize {
    50
}

fn default_features() -> usize {
    6
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_inliers: default_inliers(),
            n_outliers: default_outliers(),
            n_features: default_features(),
            seed: 0,
        }
    }
}

// Outlier coordinates have magnitude in this range, i.e. 3.5 to 7 standard
// deviations away from the inlier mean on every axis.
const OUTLIER_MIN: f64 = 3.5;
const OUTLIER_MAX: f64 = 7.0;

/// Generate a shuffled dataset from `config`.
pub fn make_outlier_blobs(name: &str, config: &SyntheticConfig) -> Result<Dataset, MlError> {
    if config.n_inliers == 0 || config.n_outliers == 0 {
        return Err(MlError::invalid_input(
            "synthetic data needs at least one inlier and one outlier",
        ));
    }
    if config.n_features == 0 {
        return Err(MlError::invalid_input("synthetic data needs at least one feature"));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| MlError::invalid_input(format!("normal distribution: {e}")))?;

    let n = config.n_inliers + config.n_outliers;
    let d = config.n_features;

    let mut labels: Vec<u8> = std::iter::repeat_n(INLIER, config.n_inliers)
        .chain(std::iter::repeat_n(OUTLIER, config.n_outliers))
        .collect();
    labels.shuffle(&mut rng);

    let mut features = Array2::<f64>::zeros((n, d));
    for (mut row, &label) in features.rows_mut().into_iter().zip(labels.iter()) {
        for value in row.iter_mut() {
            *value = if label == OUTLIER {
                let magnitude = rng.gen_range(OUTLIER_MIN..OUTLIER_MAX);
                if rng.gen_bool(0.5) { magnitude } else { -magnitude }
            } else {
                normal.sample(&mut rng)
            };
        }
    }

    Dataset::new(name, features, labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_and_counts() {
        let config = SyntheticConfig {
            n_inliers: 90,
            n_outliers: 10,
            n_features: 3,
            seed: 7,
        };
        let ds = make_outlier_blobs("blobs", &config).unwrap();
        assert_eq!(ds.len(), 100);
        assert_eq!(ds.n_features(), 3);
        assert_eq!(ds.n_outliers(), 10);
    }

    #[test]
    fn test_outliers_are_far_from_center() {
        let ds = make_outlier_blobs("blobs", &SyntheticConfig::default()).unwrap();
        for idx in ds.class_indices(OUTLIER) {
            let row = ds.features().row(idx);
            assert!(row.iter().all(|v| v.abs() >= OUTLIER_MIN));
        }
    }

    #[test]
    fn test_same_seed_same_data() {
        let config = SyntheticConfig::default();
        let a = make_outlier_blobs("a", &config).unwrap();
        let b = make_outlier_blobs("b", &config).unwrap();
        assert_eq!(a.features(), b.features());
        assert_eq!(a.labels(), b.labels());
    }

    #[test]
    fn test_rejects_missing_class() {
        let config = SyntheticConfig {
            n_outliers: 0,
            ..SyntheticConfig::default()
        };
        assert!(make_outlier_blobs("x", &config).is_err());
    }
}
