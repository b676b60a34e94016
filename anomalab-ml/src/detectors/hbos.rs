//! Histogram-based outlier score (HBOS).
//!
//! One equal-width histogram per feature over the fitted range. A row's score
//! is the sum over features of `-ln(density + alpha)`, so rare bins and values
//! outside the fitted range push the score up.

use super::{ModelFamily, OutlierDetector, check_columns, check_fit_input};
use crate::error::MlError;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HbosParams {
    pub n_bins: usize,
    /// Regulariser added to every density before the log
    pub alpha: f64,
}

impl Default for HbosParams {
    fn default() -> Self {
        Self {
            n_bins: 10,
            alpha: 0.1,
        }
    }
}

/// Density histogram of one feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FeatureHistogram {
    min: f64,
    max: f64,
    width: f64,
    densities: Vec<f64>,
}

impl FeatureHistogram {
    fn fit(column: ArrayView1<f64>, n_bins: usize) -> Self {
        let (min, max) = column
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let n = column.len() as f64;

        if max <= min {
            // Constant feature: all mass at one point.
            return Self {
                min,
                max,
                width: 0.0,
                densities: vec![1.0],
            };
        }

        let width = (max - min) / n_bins as f64;
        let mut counts = vec![0usize; n_bins];
        for &v in column.iter() {
            counts[Self::bin_of(v, min, width, n_bins)] += 1;
        }
        Self {
            min,
            max,
            width,
            densities: counts.into_iter().map(|c| c as f64 / (n * width)).collect(),
        }
    }

    fn bin_of(value: f64, min: f64, width: f64, n_bins: usize) -> usize {
        // The right edge belongs to the last bin.
        (((value - min) / width).floor() as usize).min(n_bins - 1)
    }

    fn density(&self, value: f64) -> f64 {
        if value < self.min || value > self.max {
            return 0.0;
        }
        if self.width == 0.0 {
            return self.densities[0];
        }
        self.densities[Self::bin_of(value, self.min, self.width, self.densities.len())]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hbos {
    params: HbosParams,
    histograms: Vec<FeatureHistogram>,
    fitted: bool,
}

impl Hbos {
    pub fn new(params: HbosParams) -> Result<Self, MlError> {
        if params.n_bins == 0 {
            return Err(MlError::config("hbos: n_bins must be at least 1"));
        }
        if !(params.alpha > 0.0 && params.alpha.is_finite()) {
            return Err(MlError::config(format!(
                "hbos: alpha must be a positive number, got {}",
                params.alpha
            )));
        }
        Ok(Self {
            params,
            histograms: Vec::new(),
            fitted: false,
        })
    }
}

impl OutlierDetector for Hbos {
    fn family(&self) -> ModelFamily {
        ModelFamily::Hbos
    }

    fn fit(&mut self, x: &Array2<f64>) -> Result<(), MlError> {
        check_fit_input(self.family(), x, 1)?;
        self.histograms = x
            .columns()
            .into_iter()
            .map(|col| FeatureHistogram::fit(col, self.params.n_bins))
            .collect();
        self.fitted = true;
        Ok(())
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>, MlError> {
        let fitted_cols = self.fitted.then_some(self.histograms.len());
        check_columns(self.family(), fitted_cols, x)?;
        let alpha = self.params.alpha;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .zip(&self.histograms)
                    .map(|(&v, hist)| -(hist.density(v) + alpha).ln())
                    .sum::<f64>()
            })
            .collect())
    }
}
