//! Local Outlier Factor (LOF) anomaly detection, novelty mode: the reference
//! densities come from the fitted rows and new rows are scored against them.

use super::neighbors::{Metric, k_nearest};
use super::{ModelFamily, OutlierDetector, check_columns, check_fit_input};
use crate::error::MlError;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

// Added to mean reachability distance so duplicated points keep a finite density.
const LRD_EPSILON: f64 = 1e-10;

/// LOF hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LofParams {
    pub n_neighbors: usize,
    pub metric: Metric,
}

impl Default for LofParams {
    fn default() -> Self {
        Self {
            n_neighbors: 20,
            metric: Metric::Euclidean,
        }
    }
}

/// Local Outlier Factor anomaly detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalOutlierFactor {
    params: LofParams,
    /// Effective k: n_neighbors capped at n_train - 1
    k: usize,
    x_train: Option<Array2<f64>>,
    /// Distance from each training row to its k-th neighbour
    k_distances: Array1<f64>,
    /// Local reachability density of each training row
    lrd: Array1<f64>,
}

impl LocalOutlierFactor {
    pub fn new(params: LofParams) -> Result<Self, MlError> {
        if params.n_neighbors == 0 {
            return Err(MlError::config("lof: n_neighbors must be at least 1"));
        }
        Ok(Self {
            params,
            k: 0,
            x_train: None,
            k_distances: Array1::zeros(0),
            lrd: Array1::zeros(0),
        })
    }

    /// Local reachability density from a neighbour list.
    fn local_reachability_density(&self, neighbors: &[(usize, f64)]) -> f64 {
        let mean_reach = neighbors
            .iter()
            .map(|&(idx, dist)| self.k_distances[idx].max(dist))
            .sum::<f64>()
            / neighbors.len() as f64;
        1.0 / (mean_reach + LRD_EPSILON)
    }

    fn score_point(&self, point: ArrayView1<f64>, train: &Array2<f64>) -> f64 {
        let neighbors = k_nearest(point, train, self.k, self.params.metric, None);
        let lrd_point = self.local_reachability_density(&neighbors);
        let mean_neighbor_lrd =
            neighbors.iter().map(|&(idx, _)| self.lrd[idx]).sum::<f64>() / neighbors.len() as f64;
        mean_neighbor_lrd / lrd_point
    }
}

impl OutlierDetector for LocalOutlierFactor {
    fn family(&self) -> ModelFamily {
        ModelFamily::Lof
    }

    fn fit(&mut self, x: &Array2<f64>) -> Result<(), MlError> {
        check_fit_input(self.family(), x, 2)?;
        let k = self.params.n_neighbors.min(x.nrows() - 1);
        if k < self.params.n_neighbors {
            tracing::debug!(
                requested = self.params.n_neighbors,
                used = k,
                "lof: n_neighbors capped by training size"
            );
        }

        let neighbors: Vec<Vec<(usize, f64)>> = x
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| k_nearest(row, x, k, self.params.metric, Some(i)))
            .collect();

        self.k = k;
        self.k_distances = neighbors
            .iter()
            .map(|n| n.last().map(|&(_, d)| d).unwrap_or(0.0))
            .collect();
        self.lrd = neighbors
            .iter()
            .map(|n| self.local_reachability_density(n))
            .collect();
        self.x_train = Some(x.clone());
        Ok(())
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>, MlError> {
        check_columns(self.family(), self.x_train.as_ref().map(|t| t.ncols()), x)?;
        let train = self
            .x_train
            .as_ref()
            .ok_or_else(|| MlError::model("lof: decision_function called before fit"))?;
        Ok(x.rows()
            .into_iter()
            .map(|row| self.score_point(row, train))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::{assert_outliers_rank_high, blobs};
    use ndarray::array;

    #[test]
    fn test_ranks_planted_outliers_high() {
        let ds = blobs();
        let mut lof = LocalOutlierFactor::new(LofParams::default()).unwrap();
        lof.fit(ds.features()).unwrap();
        let scores = lof.decision_function(ds.features()).unwrap();
        assert_outliers_rank_high(&ds, scores.as_slice().unwrap());
    }

    #[test]
    fn test_uniform_grid_scores_near_one() {
        let x = Array2::from_shape_fn((25, 2), |(i, j)| if j == 0 { (i % 5) as f64 } else { (i / 5) as f64 });
        let mut lof = LocalOutlierFactor::new(LofParams {
            n_neighbors: 4,
            metric: Metric::Manhattan,
        })
        .unwrap();
        lof.fit(&x).unwrap();
        let center = lof.decision_function(&array![[2.0, 2.0]]).unwrap();
        let far = lof.decision_function(&array![[20.0, 20.0]]).unwrap();
        assert!((center[0] - 1.0).abs() < 0.5, "center lof {}", center[0]);
        assert!(far[0] > 5.0, "far lof {}", far[0]);
    }

    #[test]
    fn test_duplicates_stay_finite() {
        let x = Array2::from_elem((6, 2), 3.0);
        let mut lof = LocalOutlierFactor::new(LofParams::default()).unwrap();
        lof.fit(&x).unwrap();
        let scores = lof.decision_function(&array![[3.0, 3.0], [4.0, 3.0]]).unwrap();
        assert!(scores.iter().all(|s| s.is_finite()));
        assert!(scores[1] > scores[0]);
    }

    #[test]
    fn test_k_capped_by_training_size() {
        let mut lof = LocalOutlierFactor::new(LofParams {
            n_neighbors: 50,
            ..Default::default()
        })
        .unwrap();
        lof.fit(&array![[0.0], [1.0], [2.0]]).unwrap();
        assert_eq!(lof.k, 2);
    }

    #[test]
    fn test_single_row_rejected() {
        let mut lof = LocalOutlierFactor::new(LofParams::default()).unwrap();
        assert!(lof.fit(&array![[0.0, 1.0]]).is_err());
    }
}
