//! # anomalab-ml: unsupervised anomaly-detection benchmarking
//!
//! Loads labelled tabular datasets, subsamples them to a controlled outlier
//! ratio, grid-searches a set of detectors with stratified K-fold
//! cross-validation, and reports AUC-ROC as dataset × model tables.
//!
//! The pipeline is one linear pass:
//! 1. [`data`] loads and subsamples datasets and splits train/test
//! 2. [`training`] runs the grid search and cross-validation
//! 3. [`report`] pivots the best scores and exports them

pub mod config;
pub mod data;
pub mod detectors;
pub mod error;
pub mod persistence;
pub mod report;
pub mod training;

pub use config::{BenchConfig, OutputConfig, config_exists, load_config};
pub use data::{Dataset, DatasetCatalog, DatasetSpec};
pub use detectors::{ModelFamily, OutlierDetector, build_detector};
pub use error::MlError;
pub use report::{Metric, PivotTable, export_all};
pub use training::{ExperimentOutcome, ExperimentRunner, ModelGrid};
