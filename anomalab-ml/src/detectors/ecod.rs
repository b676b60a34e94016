//! Empirical-CDF-based outlier detection (ECOD).
//!
//! Per feature, a row's left and right tail probabilities are read off the
//! fitted empirical CDF. The sample skewness of the feature decides which
//! tail counts; each feature contributes the larger of that skew-corrected
//! tail score and the mean of both tails, and a row's score is the sum.

use super::{ModelFamily, OutlierDetector, check_columns, check_fit_input};
use crate::error::MlError;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// ECOD takes no hyperparameters; any key in its grid is an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EcodParams {}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FeatureEcdf {
    sorted: Vec<f64>,
    /// Sign of the sample skewness: -1, 0 or 1
    skew_sign: i8,
}

impl FeatureEcdf {
    fn fit(column: ArrayView1<f64>) -> Self {
        let mut sorted: Vec<f64> = column.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Self {
            skew_sign: skew_sign(&sorted),
            sorted,
        }
    }

    /// Smoothed tail probabilities (P[X <= v], P[X >= v]).
    ///
    /// `(count + 1) / (n + 1)` keeps both strictly positive for values
    /// outside the fitted range.
    fn tails(&self, value: f64) -> (f64, f64) {
        let n = self.sorted.len();
        let at_most = self.sorted.partition_point(|&x| x <= value);
        let at_least = n - self.sorted.partition_point(|&x| x < value);
        let denom = (n + 1) as f64;
        ((at_most + 1) as f64 / denom, (at_least + 1) as f64 / denom)
    }

    fn score(&self, value: f64) -> f64 {
        let (left, right) = self.tails(value);
        let u_left = -left.ln();
        let u_right = -right.ln();
        let u_skew = match self.skew_sign {
            s if s < 0 => u_left,
            s if s > 0 => u_right,
            _ => u_left + u_right,
        };
        u_skew.max((u_left + u_right) / 2.0)
    }
}

fn skew_sign(values: &[f64]) -> i8 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let m2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    if m2 <= f64::EPSILON {
        return 0;
    }
    let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / n;
    let skew = m3 / m2.powf(1.5);
    if skew.abs() < 1e-12 {
        0
    } else if skew > 0.0 {
        1
    } else {
        -1
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ecod {
    features: Vec<FeatureEcdf>,
    fitted: bool,
}

impl Ecod {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutlierDetector for Ecod {
    fn family(&self) -> ModelFamily {
        ModelFamily::Ecod
    }

    fn fit(&mut self, x: &Array2<f64>) -> Result<(), MlError> {
        check_fit_input(self.family(), x, 1)?;
        self.features = x.columns().into_iter().map(FeatureEcdf::fit).collect();
        self.fitted = true;
        Ok(())
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>, MlError> {
        check_columns(self.family(), self.fitted.then_some(self.features.len()), x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .zip(&self.features)
                    .map(|(&v, ecdf)| ecdf.score(v))
                    .sum::<f64>()
            })
            .collect())
    }
}
