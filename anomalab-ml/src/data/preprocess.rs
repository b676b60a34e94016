//! Feature scaling fitted on training rows only.

use crate::error::MlError;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Preprocessing switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Z-score every feature using statistics of the fitting rows.
    #[serde(default = "default_true")]
    pub standardize: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { standardize: true }
    }
}

/// Per-column z-score scaler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit column means and population standard deviations.
    /// Constant columns get a scale of 1 so they map to zero.
    pub fn fit(x: &Array2<f64>) -> Result<Self, MlError> {
        if x.nrows() == 0 {
            return Err(MlError::invalid_input("cannot fit a scaler on zero rows"));
        }
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| MlError::invalid_input("cannot fit a scaler on zero rows"))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        Ok(Self { mean, scale })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, MlError> {
        if x.ncols() != self.mean.len() {
            return Err(MlError::invalid_input(format!(
                "scaler fitted on {} columns, got {}",
                self.mean.len(),
                x.ncols()
            )));
        }
        Ok((x - &self.mean) / &self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_zero_mean_unit_variance() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        let z = scaler.transform(&x).unwrap();
        for col in z.columns() {
            assert!(col.mean().unwrap().abs() < 1e-12);
            assert!((col.std(0.0) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let x = array![[5.0], [5.0], [5.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        let z = scaler.transform(&array![[5.0], [6.0]]).unwrap();
        assert_eq!(z, array![[0.0], [1.0]]);
    }

    #[test]
    fn test_column_mismatch() {
        let scaler = StandardScaler::fit(&array![[1.0, 2.0]]).unwrap();
        assert!(scaler.transform(&array![[1.0]]).is_err());
    }
}
