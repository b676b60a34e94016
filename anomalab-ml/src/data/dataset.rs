//! In-memory tabular dataset: a feature matrix plus binary outlier labels.

use crate::error::MlError;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Label value for a normal point.
pub const INLIER: u8 = 0;
/// Label value for an anomalous point.
pub const OUTLIER: u8 = 1;

/// A named feature matrix with one binary label per row.
///
/// Rows are samples, columns are features. Labels are `0` (inlier) or `1`
/// (outlier). Constructed through [`Dataset::new`], which enforces these
/// invariants, and immutable afterwards.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    features: Array2<f64>,
    labels: Vec<u8>,
}

/// Serializable description of a dataset, used in listings and catalogs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub name: String,
    pub rows: usize,
    pub features: usize,
    pub outliers: usize,
    pub outlier_ratio: f64,
}

impl Dataset {
    pub fn new(
        name: impl Into<String>,
        features: Array2<f64>,
        labels: Vec<u8>,
    ) -> Result<Self, MlError> {
        let name = name.into();
        if features.nrows() == 0 {
            return Err(MlError::dataset(format!("{name}: dataset has no rows")));
        }
        if features.ncols() == 0 {
            return Err(MlError::dataset(format!("{name}: dataset has no feature columns")));
        }
        if features.nrows() != labels.len() {
            return Err(MlError::dataset(format!(
                "{name}: {} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        if let Some(pos) = labels.iter().position(|&l| l != INLIER && l != OUTLIER) {
            return Err(MlError::dataset(format!(
                "{name}: label {} at row {pos} is not binary",
                labels[pos]
            )));
        }
        if let Some(((row, col), value)) = features.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(MlError::dataset(format!(
                "{name}: non-finite value {value} at row {row}, column {col}"
            )));
        }
        Ok(Self {
            name,
            features,
            labels,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn n_outliers(&self) -> usize {
        self.labels.iter().filter(|&&l| l == OUTLIER).count()
    }

    pub fn n_inliers(&self) -> usize {
        self.len() - self.n_outliers()
    }

    /// Fraction of rows labelled as outliers.
    pub fn outlier_ratio(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.n_outliers() as f64 / self.len() as f64
    }

    /// Row indices carrying the given label, in dataset order.
    pub fn class_indices(&self, label: u8) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == label)
            .map(|(i, _)| i)
            .collect()
    }

    /// New dataset made of the given rows (repeats allowed), keeping the name.
    ///
    /// Indices must be in bounds; callers derive them from this dataset.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            name: self.name.clone(),
            features: self.features.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            name: self.name.clone(),
            rows: self.len(),
            features: self.n_features(),
            outliers: self.n_outliers(),
            outlier_ratio: self.outlier_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy() -> Dataset {
        Dataset::new(
            "toy",
            array![[0.0, 1.0], [1.0, 1.0], [2.0, 1.0], [9.0, 9.0]],
            vec![0, 0, 0, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_counts_and_ratio() {
        let ds = toy();
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.n_features(), 2);
        assert_eq!(ds.n_outliers(), 1);
        assert_eq!(ds.n_inliers(), 3);
        assert!((ds.outlier_ratio() - 0.25).abs() < 1e-12);
        assert_eq!(ds.class_indices(OUTLIER), vec![3]);
    }

    #[test]
    fn test_select_rows_with_repeats() {
        let ds = toy();
        let sub = ds.select(&[3, 0, 3]);
        assert_eq!(sub.labels(), &[1, 0, 1]);
        assert_eq!(sub.features()[[0, 0]], 9.0);
        assert_eq!(sub.features()[[1, 0]], 0.0);
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let err = Dataset::new("bad", array![[1.0], [2.0]], vec![0]).unwrap_err();
        assert!(err.to_string().contains("2 feature rows but 1 labels"));
    }

    #[test]
    fn test_rejects_non_binary_labels() {
        let err = Dataset::new("bad", array![[1.0], [2.0]], vec![0, 2]).unwrap_err();
        assert!(matches!(err, MlError::Dataset(_)));
    }

    #[test]
    fn test_rejects_nan_features() {
        let err = Dataset::new("bad", array![[1.0], [f64::NAN]], vec![0, 1]).unwrap_err();
        assert!(err.to_string().contains("non-finite"));
    }

    #[test]
    fn test_rejects_empty() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert!(Dataset::new("empty", empty, vec![]).is_err());
    }
}
