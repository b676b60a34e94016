//! Stratified train/test holdout split.

use crate::data::dataset::{Dataset, INLIER, OUTLIER};
use crate::error::MlError;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Holdout split settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of each class moved to the test side.
    #[serde(default = "default_test_size")]
    pub test_size: f64,
}

fn default_test_size() -> f64 {
    0.3
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
        }
    }
}

/// Split `dataset` into (train, test), preserving the class ratio on both sides.
///
/// Each class contributes `ceil(n_class * test_size)` rows to the test side and
/// must keep at least one row on each side.
pub fn train_test_split(
    dataset: &Dataset,
    test_size: f64,
    seed: u64,
) -> Result<(Dataset, Dataset), MlError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(MlError::invalid_input(format!(
            "test_size must be strictly between 0 and 1, got {test_size}"
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(dataset.len());
    let mut test = Vec::new();

    for label in [INLIER, OUTLIER] {
        let mut indices = dataset.class_indices(label);
        // Epsilon keeps 90 * 0.3 from rounding up to 28.
        let n_test = (indices.len() as f64 * test_size - 1e-9).ceil() as usize;
        if n_test == 0 || n_test >= indices.len() {
            return Err(MlError::dataset(format!(
                "{}: class {label} has {} rows, too few for a {test_size} test split",
                dataset.name(),
                indices.len()
            )));
        }
        indices.shuffle(&mut rng);
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((dataset.select(&train), dataset.select(&test)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn dataset(n_in: usize, n_out: usize) -> Dataset {
        let n = n_in + n_out;
        let features = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
        let labels = (0..n).map(|i| u8::from(i >= n_in)).collect();
        Dataset::new("split", features, labels).unwrap()
    }

    #[test]
    fn test_sizes_per_class() {
        let (train, test) = train_test_split(&dataset(90, 10), 0.3, 0).unwrap();
        assert_eq!(test.len(), 27 + 3);
        assert_eq!(test.n_outliers(), 3);
        assert_eq!(train.len(), 70);
        assert_eq!(train.n_outliers(), 7);
    }

    #[test]
    fn test_sides_are_disjoint_and_cover() {
        let (train, test) = train_test_split(&dataset(40, 8), 0.25, 5).unwrap();
        let mut all: Vec<i64> = train
            .features()
            .iter()
            .chain(test.features().iter())
            .map(|v| *v as i64)
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..48).collect::<Vec<_>>());
    }

    #[test]
    fn test_single_outlier_cannot_split() {
        let err = train_test_split(&dataset(20, 1), 0.3, 0).unwrap_err();
        assert!(err.to_string().contains("class 1 has 1 rows"));
    }

    #[test]
    fn test_invalid_test_size() {
        assert!(train_test_split(&dataset(20, 5), 0.0, 0).is_err());
        assert!(train_test_split(&dataset(20, 5), 1.0, 0).is_err());
    }
}
