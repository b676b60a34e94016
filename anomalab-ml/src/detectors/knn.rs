//! k-nearest-neighbour distance detector.

use super::neighbors::{Metric, k_nearest};
use super::{ModelFamily, OutlierDetector, check_columns, check_fit_input};
use crate::error::MlError;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// How the k neighbour distances collapse into one score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnnMethod {
    /// Distance to the k-th neighbour
    #[default]
    Largest,
    Mean,
    Median,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KnnParams {
    pub n_neighbors: usize,
    pub method: KnnMethod,
    pub metric: Metric,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            method: KnnMethod::Largest,
            metric: Metric::Euclidean,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Knn {
    params: KnnParams,
    x_train: Option<Array2<f64>>,
}

impl Knn {
    pub fn new(params: KnnParams) -> Result<Self, MlError> {
        if params.n_neighbors == 0 {
            return Err(MlError::config("knn: n_neighbors must be at least 1"));
        }
        Ok(Self {
            params,
            x_train: None,
        })
    }
}

fn collapse(method: KnnMethod, distances: &[f64]) -> f64 {
    match method {
        KnnMethod::Largest => distances.last().copied().unwrap_or(0.0),
        KnnMethod::Mean => distances.iter().sum::<f64>() / distances.len() as f64,
        KnnMethod::Median => {
            // distances arrive sorted ascending
            let n = distances.len();
            if n % 2 == 1 {
                distances[n / 2]
            } else {
                (distances[n / 2 - 1] + distances[n / 2]) / 2.0
            }
        }
    }
}

impl OutlierDetector for Knn {
    fn family(&self) -> ModelFamily {
        ModelFamily::Knn
    }

    fn fit(&mut self, x: &Array2<f64>) -> Result<(), MlError> {
        check_fit_input(self.family(), x, self.params.n_neighbors)?;
        self.x_train = Some(x.clone());
        Ok(())
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>, MlError> {
        check_columns(self.family(), self.x_train.as_ref().map(|t| t.ncols()), x)?;
        let train = self
            .x_train
            .as_ref()
            .ok_or_else(|| MlError::model("knn: decision_function called before fit"))?;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let distances: Vec<f64> =
                    k_nearest(row, train, self.params.n_neighbors, self.params.metric, None)
                        .into_iter()
                        .map(|(_, d)| d)
                        .collect();
                collapse(self.params.method, &distances)
            })
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
        for method in [KnnMethod::Largest, KnnMethod::Mean, KnnMethod::Median] {
            let mut knn = Knn::new(KnnParams {
                method,
                ..Default::default()
            })
            .unwrap();
            knn.fit(ds.features()).unwrap();
            let scores = knn.decision_function(ds.features()).unwrap();
            assert_outliers_rank_high(&ds, scores.as_slice().unwrap());
        }
    }

    #[test]
    fn test_methods_on_known_distances() {
        let train = array![[1.0], [2.0], [4.0], [8.0]];
        let query = array![[0.0]];
        let score = |method, n_neighbors| {
            let mut knn = Knn::new(KnnParams {
                n_neighbors,
                method,
                metric: Metric::Euclidean,
            })
            .unwrap();
            knn.fit(&train).unwrap();
            knn.decision_function(&query).unwrap()[0]
        };
        assert_eq!(score(KnnMethod::Largest, 3), 4.0);
        assert!((score(KnnMethod::Mean, 3) - 7.0 / 3.0).abs() < 1e-12);
        assert_eq!(score(KnnMethod::Median, 3), 2.0);
        assert_eq!(score(KnnMethod::Median, 4), 3.0);
    }

    #[test]
    fn test_needs_k_training_rows() {
        let mut knn = Knn::new(KnnParams {
            n_neighbors: 10,
            ..Default::default()
        })
        .unwrap();
        assert!(knn.fit(&array![[0.0], [1.0]]).is_err());
    }

    #[test]
    fn test_method_from_json() {
        let p: KnnParams = serde_json::from_str(r#"{"method": "median", "n_neighbors": 3}"#).unwrap();
        assert_eq!(p.method, KnnMethod::Median);
        assert_eq!(p.metric, Metric::Euclidean);
    }
}
