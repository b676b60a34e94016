//! The grid-search / cross-validation experiment loop.

use super::cross_validation::{Fold, StratifiedKFold};
use super::metrics::{CrossValidationResult, roc_auc};
use super::reproducibility::{RunManifest, SeedManager};
use super::sweep::{ParamSet, format_params};
use crate::config::BenchConfig;
use crate::data::{Dataset, DatasetCatalog, StandardScaler, subsample, train_test_split};
use crate::detectors::{ModelFamily, build_detector};
use crate::error::MlError;
use crate::persistence;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    Completed,
    Failed,
}

/// One (dataset, model, hyperparameter combination) evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub dataset: String,
    pub family: ModelFamily,
    pub params: ParamSet,
    pub status: TrialStatus,
    #[serde(default)]
    pub fold_scores: Vec<f64>,
    pub mean_validation_auc: Option<f64>,
    pub std_validation_auc: Option<f64>,
    pub test_auc: Option<f64>,
    pub elapsed_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrialRecord {
    fn completed(
        dataset: &str,
        family: ModelFamily,
        params: ParamSet,
        cv: CrossValidationResult,
        test_auc: f64,
        elapsed_secs: f64,
    ) -> Self {
        Self {
            dataset: dataset.to_string(),
            family,
            params,
            status: TrialStatus::Completed,
            mean_validation_auc: Some(cv.mean_score),
            std_validation_auc: Some(cv.std_score),
            fold_scores: cv.fold_scores,
            test_auc: Some(test_auc),
            elapsed_secs,
            error: None,
        }
    }

    fn failed(dataset: &str, family: ModelFamily, params: ParamSet, error: &MlError, elapsed_secs: f64) -> Self {
        Self {
            dataset: dataset.to_string(),
            family,
            params,
            status: TrialStatus::Failed,
            fold_scores: Vec::new(),
            mean_validation_auc: None,
            std_validation_auc: None,
            test_auc: None,
            elapsed_secs,
            error: Some(error.to_string()),
        }
    }
}

/// Best hyperparameters for one (dataset, model) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestResult {
    pub dataset: String,
    pub family: ModelFamily,
    pub params: ParamSet,
    pub validation_auc: f64,
    pub test_auc: f64,
}

/// Pick the best completed trial per (dataset, model) by mean validation
/// AUC. Ties keep the earliest trial; output follows first-seen order.
pub fn select_best(records: &[TrialRecord]) -> Vec<BestResult> {
    let mut best: Vec<BestResult> = Vec::new();
    for record in records {
        let (Some(validation_auc), Some(test_auc)) = (record.mean_validation_auc, record.test_auc) else {
            continue;
        };
        if record.status != TrialStatus::Completed {
            continue;
        }
        let candidate = BestResult {
            dataset: record.dataset.clone(),
            family: record.family,
            params: record.params.clone(),
            validation_auc,
            test_auc,
        };
        match best
            .iter_mut()
            .find(|b| b.dataset == record.dataset && b.family == record.family)
        {
            Some(current) if validation_auc > current.validation_auc => *current = candidate,
            Some(_) => {}
            None => best.push(candidate),
        }
    }
    best
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentOutcome {
    /// Dataset names in run order.
    pub datasets: Vec<String>,
    /// Model families in configured order.
    pub models: Vec<ModelFamily>,
    pub records: Vec<TrialRecord>,
    pub best: Vec<BestResult>,
    pub manifest: RunManifest,
}

impl ExperimentOutcome {
    pub fn best_for(&self, dataset: &str, family: ModelFamily) -> Option<&BestResult> {
        self.best
            .iter()
            .find(|b| b.dataset == dataset && b.family == family)
    }

    pub fn failed_trials(&self) -> impl Iterator<Item = &TrialRecord> {
        self.records
            .iter()
            .filter(|r| r.status == TrialStatus::Failed)
    }
}

/// Runs the configured grid search over a set of loaded datasets.
#[derive(Debug, Clone)]
pub struct ExperimentRunner {
    config: BenchConfig,
}

impl ExperimentRunner {
    /// Validates the configuration, including every grid combination.
    pub fn new(config: BenchConfig) -> Result<Self, MlError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Evaluate every model grid on every dataset, in order.
    ///
    /// Dataset-level problems (a subsample or split that cannot be drawn)
    /// abort the run; a failing trial is recorded and the loop continues.
    pub fn run(&self, datasets: &[Dataset], catalog: &DatasetCatalog) -> Result<ExperimentOutcome, MlError> {
        let mut seeds = SeedManager::new(self.config.seed);
        let mut manifest = RunManifest::new(self.config.seed, serde_json::to_value(&self.config)?);
        manifest.record_datasets(catalog);
        info!(
            run_id = %manifest.run_id,
            datasets = datasets.len(),
            models = self.config.models.len(),
            "Starting experiment"
        );

        let mut records = Vec::new();
        for dataset in datasets {
            self.run_dataset(dataset, &mut seeds, &mut records)?;
        }

        let failed = records
            .iter()
            .filter(|r| r.status == TrialStatus::Failed)
            .count();
        manifest.finish(&seeds, records.len(), failed);
        info!(
            run_id = %manifest.run_id,
            trials = records.len(),
            failed,
            duration_secs = manifest.duration_secs().unwrap_or_default(),
            "Experiment finished"
        );

        Ok(ExperimentOutcome {
            datasets: datasets.iter().map(|d| d.name().to_string()).collect(),
            models: self.config.models.iter().map(|g| g.family).collect(),
            best: select_best(&records),
            records,
            manifest,
        })
    }

    fn run_dataset(
        &self,
        dataset: &Dataset,
        seeds: &mut SeedManager,
        records: &mut Vec<TrialRecord>,
    ) -> Result<(), MlError> {
        let name = dataset.name();
        let sample = subsample(dataset, &self.config.subsample, seeds.get_seed(&format!("subsample/{name}")))?;
        let (train, test) = train_test_split(&sample, self.config.split.test_size, seeds.get_seed(&format!("split/{name}")))?;
        let folds = StratifiedKFold::from_config(&self.config.cv, seeds.get_seed(&format!("cv/{name}")))?
            .split(train.labels())
            .map_err(|e| MlError::training(format!("{name}: {e}")))?;
        info!(
            dataset = name,
            rows = sample.len(),
            outliers = sample.n_outliers(),
            train = train.len(),
            test = test.len(),
            folds = folds.len(),
            "Prepared dataset"
        );

        for grid in &self.config.models {
            let family = grid.family;
            let model_seed = seeds.get_seed(&format!("model/{name}/{}", family.key()));
            let trials = grid.sweep().generate_trials()?;
            info!(dataset = name, model = family.key(), trials = trials.len(), "Grid search");

            for params in trials {
                let started = Instant::now();
                let result = self.evaluate(family, &params, model_seed, &train, &test, &folds);
                let elapsed = started.elapsed().as_secs_f64();
                let record = match result {
                    Ok((cv, test_auc)) => {
                        debug!(
                            dataset = name,
                            model = family.key(),
                            params = %format_params(&params),
                            validation_auc = cv.mean_score,
                            test_auc,
                            "Trial completed"
                        );
                        TrialRecord::completed(name, family, params, cv, test_auc, elapsed)
                    }
                    Err(e) => {
                        warn!(
                            dataset = name,
                            model = family.key(),
                            params = %format_params(&params),
                            error = %e,
                            "Trial failed"
                        );
                        TrialRecord::failed(name, family, params, &e, elapsed)
                    }
                };
                records.push(record);
            }
        }
        Ok(())
    }

    /// Cross-validate one combination on `train`, then refit on all of
    /// `train` and score `test`.
    fn evaluate(
        &self,
        family: ModelFamily,
        params: &ParamSet,
        seed: u64,
        train: &Dataset,
        test: &Dataset,
        folds: &[Fold],
    ) -> Result<(CrossValidationResult, f64), MlError> {
        let mut fold_scores = Vec::with_capacity(folds.len());
        for fold in folds {
            let x_train = train.features().select(Axis(0), &fold.train_indices);
            let x_val = train.features().select(Axis(0), &fold.validation_indices);
            let y_val: Vec<u8> = fold
                .validation_indices
                .iter()
                .map(|&i| train.labels()[i])
                .collect();
            fold_scores.push(self.fit_and_score(family, params, seed, &x_train, &x_val, &y_val)?);
        }
        let cv = CrossValidationResult::from_scores(fold_scores, "auc_roc")?;
        let test_auc = self.fit_and_score(family, params, seed, train.features(), test.features(), test.labels())?;
        Ok((cv, test_auc))
    }

    fn fit_and_score(
        &self,
        family: ModelFamily,
        params: &ParamSet,
        seed: u64,
        x_fit: &Array2<f64>,
        x_eval: &Array2<f64>,
        y_eval: &[u8],
    ) -> Result<f64, MlError> {
        let (x_fit, x_eval) = if self.config.preprocess.standardize {
            let scaler = StandardScaler::fit(x_fit)?;
            (scaler.transform(x_fit)?, scaler.transform(x_eval)?)
        } else {
            (x_fit.clone(), x_eval.clone())
        };
        let mut detector = build_detector(family, params, seed)?;
        detector.fit(&x_fit)?;
        let scores = detector.decision_function(&x_eval)?;
        roc_auc(y_eval, &scores.to_vec())
    }
}

/// Persisted trial records of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentRegistry {
    pub run_id: Option<String>,
    pub records: Vec<TrialRecord>,
}

impl ExperimentRegistry {
    pub fn from_outcome(outcome: &ExperimentOutcome) -> Self {
        Self {
            run_id: Some(outcome.manifest.run_id.clone()),
            records: outcome.records.clone(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, MlError> {
        Ok(persistence::load_json(path)?.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<(), MlError> {
        persistence::atomic_write_json(path, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataSourceType, DatasetSpec, SubsampleConfig, SyntheticConfig, make_outlier_blobs};
    use crate::training::ModelGrid;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn small_config() -> (BenchConfig, Vec<Dataset>, DatasetCatalog) {
        let synthetic = SyntheticConfig {
            n_inliers: 190,
            n_outliers: 20,
            n_features: 4,
            seed: 3,
        };
        let spec = DatasetSpec {
            name: "blobs".into(),
            source: DataSourceType::Synthetic(synthetic.clone()),
        };
        let dataset = make_outlier_blobs("blobs", &synthetic).unwrap();
        let mut catalog = DatasetCatalog::new();
        catalog.register(&spec, &dataset, Path::new(".")).unwrap();

        let mut config = BenchConfig {
            datasets: vec![spec],
            subsample: SubsampleConfig {
                n_samples: Some(150),
                outlier_ratio: Some(0.1),
                replace: false,
            },
            models: vec![
                ModelGrid::with_params(
                    ModelFamily::Knn,
                    BTreeMap::from([("n_neighbors".to_string(), vec![json!(3), json!(5)])]),
                ),
                ModelGrid::new(ModelFamily::Ecod),
            ],
            ..BenchConfig::default()
        };
        config.cv.n_folds = 3;
        (config, vec![dataset], catalog)
    }

    fn record(dataset: &str, family: ModelFamily, n: i64, val: Option<f64>) -> TrialRecord {
        TrialRecord {
            dataset: dataset.into(),
            family,
            params: BTreeMap::from([("n".to_string(), json!(n))]),
            status: if val.is_some() { TrialStatus::Completed } else { TrialStatus::Failed },
            fold_scores: Vec::new(),
            mean_validation_auc: val,
            std_validation_auc: val.map(|_| 0.0),
            test_auc: val,
            elapsed_secs: 0.0,
            error: None,
        }
    }

    #[test]
    fn test_select_best_keeps_first_of_ties() {
        let records = vec![
            record("a", ModelFamily::Knn, 1, Some(0.8)),
            record("a", ModelFamily::Knn, 2, Some(0.9)),
            record("a", ModelFamily::Knn, 3, Some(0.9)),
            record("a", ModelFamily::Knn, 4, None),
            record("a", ModelFamily::Lof, 1, None),
            record("b", ModelFamily::Knn, 1, Some(0.7)),
        ];
        let best = select_best(&records);
        assert_eq!(best.len(), 2);
        assert_eq!(best[0].params["n"], json!(2));
        assert_eq!(best[0].validation_auc, 0.9);
        assert_eq!(best[1].dataset, "b");
    }

    #[test]
    fn test_run_small_grid() {
        let (config, datasets, catalog) = small_config();
        let outcome = ExperimentRunner::new(config).unwrap().run(&datasets, &catalog).unwrap();

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.failed_trials().count(), 0);
        assert_eq!(outcome.models, vec![ModelFamily::Knn, ModelFamily::Ecod]);
        for record in &outcome.records {
            assert_eq!(record.fold_scores.len(), 3);
            let auc = record.test_auc.unwrap();
            assert!((0.0..=1.0).contains(&auc));
        }
        let knn = outcome.best_for("blobs", ModelFamily::Knn).unwrap();
        assert!(knn.validation_auc > 0.9, "knn validation auc {}", knn.validation_auc);
        assert!(outcome.best_for("blobs", ModelFamily::Ecod).is_some());
        assert_eq!(outcome.manifest.trials, 3);
        assert!(outcome.manifest.dataset_hashes.contains_key("blobs"));
        assert!(outcome.manifest.component_seeds.contains_key("cv/blobs"));
    }

    #[test]
    fn test_run_is_deterministic() {
        let (config, datasets, catalog) = small_config();
        let runner = ExperimentRunner::new(config).unwrap();
        let a = runner.run(&datasets, &catalog).unwrap();
        let b = runner.run(&datasets, &catalog).unwrap();
        let scores = |o: &ExperimentOutcome| -> Vec<Option<f64>> {
            o.records.iter().map(|r| r.mean_validation_auc).collect()
        };
        assert_eq!(scores(&a), scores(&b));
        assert_eq!(a.best, b.best);
    }

    #[test]
    fn test_failing_trial_is_recorded() {
        let (mut config, datasets, catalog) = small_config();
        // Fold training sets hold about 69 rows, fewer than 80 neighbours.
        config.models = vec![ModelGrid::with_params(
            ModelFamily::Knn,
            BTreeMap::from([("n_neighbors".to_string(), vec![json!(5), json!(80)])]),
        )];
        let outcome = ExperimentRunner::new(config).unwrap().run(&datasets, &catalog).unwrap();
        assert_eq!(outcome.records.len(), 2);
        let failed: Vec<_> = outcome.failed_trials().collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].error.is_some());
        assert_eq!(outcome.best.len(), 1);
        assert_eq!(outcome.best[0].params["n_neighbors"], json!(5));
    }

    #[test]
    fn test_too_few_outliers_for_folds_aborts() {
        let (mut config, datasets, catalog) = small_config();
        config.subsample.outlier_ratio = Some(0.02);
        config.cv.n_folds = 5;
        let err = ExperimentRunner::new(config).unwrap().run(&datasets, &catalog).unwrap_err();
        assert!(err.to_string().contains("blobs"));
    }

    #[test]
    fn test_invalid_grid_rejected_up_front() {
        let (mut config, _, _) = small_config();
        config.models = vec![ModelGrid::with_params(
            ModelFamily::Lof,
            BTreeMap::from([("bogus".to_string(), vec![json!(1)])]),
        )];
        assert!(matches!(ExperimentRunner::new(config), Err(MlError::Config(_))));
    }

    #[test]
    fn test_registry_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trials.json");
        let registry = ExperimentRegistry {
            run_id: Some("run-1".into()),
            records: vec![
                record("a", ModelFamily::Hbos, 1, Some(0.5)),
                record("b", ModelFamily::Hbos, 1, None),
            ],
        };
        registry.save(&path).unwrap();

        let loaded = ExperimentRegistry::load(&path).unwrap();
        assert_eq!(loaded.records, registry.records);
        assert_eq!(loaded.run_id.as_deref(), Some("run-1"));
        assert_eq!(loaded.records[1].status, TrialStatus::Failed);
        assert!(ExperimentRegistry::load(&dir.path().join("none.json")).unwrap().records.is_empty());
    }
}
