//! Unsupervised anomaly detectors.
//!
//! Every detector is fitted on feature rows alone (labels are never shown to
//! it) and returns one score per row where higher means more anomalous.
//! [`build_detector`] turns a `(family, hyperparameters)` pair from the grid
//! search into a ready-to-fit detector.

pub mod ecod;
pub mod hbos;
pub mod iforest;
pub mod knn;
pub mod lof;
pub mod neighbors;

pub use ecod::Ecod;
pub use hbos::{Hbos, HbosParams};
pub use iforest::{IsolationForest, IsolationForestParams};
pub use knn::{Knn, KnnMethod, KnnParams};
pub use lof::{LocalOutlierFactor, LofParams};
pub use neighbors::Metric;

use crate::error::MlError;
use ndarray::{Array1, Array2};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A fitted-then-scored outlier detector.
pub trait OutlierDetector: Send + fmt::Debug {
    fn family(&self) -> ModelFamily;

    /// Learn the notion of normality from `x` (rows are samples).
    fn fit(&mut self, x: &Array2<f64>) -> Result<(), MlError>;

    /// Outlier score per row of `x`; higher is more anomalous.
    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>, MlError>;
}

/// Detector families available to the grid search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    #[serde(rename = "iforest")]
    IsolationForest,
    Lof,
    Knn,
    Hbos,
    Ecod,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 5] = [
        ModelFamily::IsolationForest,
        ModelFamily::Lof,
        ModelFamily::Knn,
        ModelFamily::Hbos,
        ModelFamily::Ecod,
    ];

    /// Config / CLI key.
    pub fn key(&self) -> &'static str {
        match self {
            Self::IsolationForest => "iforest",
            Self::Lof => "lof",
            Self::Knn => "knn",
            Self::Hbos => "hbos",
            Self::Ecod => "ecod",
        }
    }

    /// Column heading in result tables.
    pub fn label(&self) -> &'static str {
        match self {
            Self::IsolationForest => "IForest",
            Self::Lof => "LOF",
            Self::Knn => "KNN",
            Self::Hbos => "HBOS",
            Self::Ecod => "ECOD",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::IsolationForest => "Isolation forest: short random-split paths mark outliers",
            Self::Lof => "Local outlier factor: density relative to neighbours",
            Self::Knn => "k-nearest-neighbour distance",
            Self::Hbos => "Histogram-based outlier score, features treated independently",
            Self::Ecod => "Empirical-CDF tail probabilities, parameter free",
        }
    }

    /// Hyperparameter grid searched when the config does not give one.
    pub fn default_grid(&self) -> BTreeMap<String, Vec<Value>> {
        let grid: Vec<(&str, Vec<Value>)> = match self {
            Self::IsolationForest => vec![
                ("n_estimators", vec![json!(50), json!(100), json!(200)]),
                ("max_samples", vec![json!(64), json!(128), json!(256)]),
            ],
            Self::Lof => vec![("n_neighbors", vec![json!(5), json!(10), json!(20), json!(35)])],
            Self::Knn => vec![
                ("n_neighbors", vec![json!(1), json!(5), json!(10)]),
                ("method", vec![json!("largest"), json!("mean"), json!("median")]),
            ],
            Self::Hbos => vec![("n_bins", vec![json!(5), json!(10), json!(20), json!(50)])],
            Self::Ecod => vec![],
        };
        grid.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModelFamily {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.key() == lower || f.label().to_ascii_lowercase() == lower)
            .ok_or_else(|| {
                MlError::not_found(format!(
                    "unknown model family '{s}' (expected one of: {})",
                    Self::ALL.map(|f| f.key()).join(", ")
                ))
            })
    }
}

/// Instantiate a detector from a hyperparameter combination.
///
/// Unknown parameter names and out-of-range values are rejected with
/// [`MlError::Config`], so a bad grid fails before any fitting happens.
pub fn build_detector(
    family: ModelFamily,
    params: &BTreeMap<String, Value>,
    seed: u64,
) -> Result<Box<dyn OutlierDetector>, MlError> {
    Ok(match family {
        ModelFamily::IsolationForest => Box::new(IsolationForest::new(parse_params(family, params)?, seed)?),
        ModelFamily::Lof => Box::new(LocalOutlierFactor::new(parse_params(family, params)?)?),
        ModelFamily::Knn => Box::new(Knn::new(parse_params(family, params)?)?),
        ModelFamily::Hbos => Box::new(Hbos::new(parse_params(family, params)?)?),
        ModelFamily::Ecod => {
            let _: ecod::EcodParams = parse_params(family, params)?;
            Box::new(Ecod::new())
        }
    })
}

fn parse_params<T: DeserializeOwned>(
    family: ModelFamily,
    params: &BTreeMap<String, Value>,
) -> Result<T, MlError> {
    let object: serde_json::Map<String, Value> =
        params.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    serde_json::from_value(Value::Object(object))
        .map_err(|e| MlError::config(format!("{}: invalid hyperparameters: {e}", family.key())))
}

/// Reject score requests whose column count differs from the fitted data.
pub(crate) fn check_columns(
    family: ModelFamily,
    fitted: Option<usize>,
    x: &Array2<f64>,
) -> Result<(), MlError> {
    let expected = fitted.ok_or_else(|| {
        MlError::model(format!("{}: decision_function called before fit", family.key()))
    })?;
    if x.ncols() != expected {
        return Err(MlError::invalid_input(format!(
            "{}: fitted on {expected} features, got {}",
            family.key(),
            x.ncols()
        )));
    }
    Ok(())
}

/// Reject fitting on an empty matrix.
pub(crate) fn check_fit_input(family: ModelFamily, x: &Array2<f64>, min_rows: usize) -> Result<(), MlError> {
    if x.ncols() == 0 {
        return Err(MlError::invalid_input(format!("{}: no feature columns", family.key())));
    }
    if x.nrows() < min_rows {
        return Err(MlError::training(format!(
            "{}: needs at least {min_rows} rows to fit, got {}",
            family.key(),
            x.nrows()
        )));
    }
    Ok(())
}
