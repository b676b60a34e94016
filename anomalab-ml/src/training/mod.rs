//! Model selection: stratified cross-validation, grid sweeps, metrics, and the experiment loop.

pub mod cross_validation;
pub mod experiment;
pub mod metrics;
pub mod reproducibility;
pub mod sweep;

pub use cross_validation::{CrossValidation, Fold, StratifiedKFold};
pub use experiment::{
    BestResult, ExperimentOutcome, ExperimentRegistry, ExperimentRunner, TrialRecord, TrialStatus, select_best,
};
pub use metrics::{CrossValidationResult, roc_auc};
pub use reproducibility::{EnvironmentSnapshot, RunManifest, SeedManager};
pub use sweep::{HyperparamSweep, ModelGrid, ParamSet, format_params};
