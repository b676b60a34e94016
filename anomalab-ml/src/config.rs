//! Benchmark configuration and its layered loading.

use crate::data::{DataSourceType, DatasetSpec, PreprocessConfig, SplitConfig, SubsampleConfig, SyntheticConfig};
use crate::detectors::ModelFamily;
use crate::error::MlError;
use crate::training::{CrossValidation, ModelGrid};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Directory holding the workspace config, relative to the workspace root.
pub const WORKSPACE_DIR: &str = ".anomalab";
pub const CONFIG_FILE: &str = "config.toml";

/// Top-level benchmark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Global seed every component seed is derived from.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub subsample: SubsampleConfig,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub cv: CrossValidation,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default = "default_datasets")]
    pub datasets: Vec<DatasetSpec>,
    /// Model grids in column order of the result tables.
    #[serde(default = "default_models")]
    pub models: Vec<ModelGrid>,
}

fn default_seed() -> u64 {
    42
}

fn default_datasets() -> Vec<DatasetSpec> {
    vec![
        DatasetSpec {
            name: "synthetic-6d".into(),
            source: DataSourceType::Synthetic(SyntheticConfig::default()),
        },
        DatasetSpec {
            name: "synthetic-20d".into(),
            source: DataSourceType::Synthetic(SyntheticConfig {
                n_inliers: 1900,
                n_outliers: 100,
                n_features: 20,
                seed: 1,
            }),
        },
    ]
}

fn default_models() -> Vec<ModelGrid> {
    ModelFamily::ALL.into_iter().map(ModelGrid::new).collect()
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            subsample: SubsampleConfig::default(),
            split: SplitConfig::default(),
            cv: CrossValidation::default(),
            preprocess: PreprocessConfig::default(),
            output: OutputConfig::default(),
            datasets: default_datasets(),
            models: default_models(),
        }
    }
}

/// Where results are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_validation_file")]
    pub validation_file: String,
    #[serde(default = "default_test_file")]
    pub test_file: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("anomalab-results")
}

fn default_validation_file() -> String {
    "validation_auc.csv".into()
}

fn default_test_file() -> String {
    "test_auc.csv".into()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            validation_file: default_validation_file(),
            test_file: default_test_file(),
        }
    }
}

impl BenchConfig {
    /// Semantic checks that serde cannot express. Every grid combination is
    /// built once so a bad hyperparameter fails before any data is loaded.
    pub fn validate(&self) -> Result<(), MlError> {
        if self.datasets.is_empty() {
            return Err(MlError::config("no datasets configured"));
        }
        if self.models.is_empty() {
            return Err(MlError::config("no models configured"));
        }

        let mut names = BTreeSet::new();
        for spec in &self.datasets {
            if spec.name.trim().is_empty() {
                return Err(MlError::config("dataset name must not be empty"));
            }
            if !names.insert(spec.name.as_str()) {
                return Err(MlError::config(format!("duplicate dataset '{}'", spec.name)));
            }
        }

        let mut families = BTreeSet::new();
        for grid in &self.models {
            if !families.insert(grid.family) {
                return Err(MlError::config(format!("model '{}' listed twice", grid.family.key())));
            }
            grid.validate()?;
        }

        if let Some(ratio) = self.subsample.outlier_ratio
            && !(ratio > 0.0 && ratio < 1.0)
        {
            return Err(MlError::config(format!(
                "subsample.outlier_ratio must be in (0, 1), got {ratio}"
            )));
        }
        if !(self.split.test_size > 0.0 && self.split.test_size < 1.0) {
            return Err(MlError::config(format!(
                "split.test_size must be in (0, 1), got {}",
                self.split.test_size
            )));
        }
        if self.cv.n_folds < 2 {
            return Err(MlError::config(format!(
                "cv.n_folds must be at least 2, got {}",
                self.cv.n_folds
            )));
        }
        if self.output.validation_file == self.output.test_file {
            return Err(MlError::config("validation and test exports share a file name"));
        }
        Ok(())
    }

    /// Keep only the named datasets and model families, in configured order.
    pub fn restrict(&mut self, datasets: &[String], models: &[ModelFamily]) -> Result<(), MlError> {
        for name in datasets {
            if !self.datasets.iter().any(|d| &d.name == name) {
                return Err(MlError::not_found(format!("dataset '{name}' is not configured")));
            }
        }
        if !datasets.is_empty() {
            self.datasets.retain(|d| datasets.contains(&d.name));
        }
        if !models.is_empty() {
            for family in models {
                if !self.models.iter().any(|g| g.family == *family) {
                    self.models.push(ModelGrid::new(*family));
                }
            }
            self.models.retain(|g| models.contains(&g.family));
        }
        Ok(())
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "anomalab", "anomalab")
}

/// Path of the per-user config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Path of the workspace config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(WORKSPACE_DIR).join(CONFIG_FILE)
}

/// Load configuration from all sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `ANOMALAB_`)
/// 2. Explicit config file
/// 3. Workspace-local config (`.anomalab/config.toml`)
/// 4. User config (`~/.config/anomalab/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<BenchConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(BenchConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        // Toml::file silently skips missing files; a named file must exist.
        if !path.exists() {
            return Err(Box::new(figment::Error::from(format!(
                "config file not found: {}",
                path.display()
            ))));
        }
        figment = figment.merge(Toml::file(path));
    }

    // ANOMALAB_SEED, ANOMALAB_CV__N_FOLDS, ANOMALAB_OUTPUT__DIR, ...
    figment = figment.merge(Env::prefixed("ANOMALAB_").split("__"));

    figment.extract().map_err(Box::new)
}

/// Check whether a user-level or workspace-level config file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = BenchConfig::default();
        config.validate().unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.models.len(), ModelFamily::ALL.len());
        assert_eq!(config.output.dir, PathBuf::from("anomalab-results"));
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let text = toml::to_string(&BenchConfig::default()).unwrap();
        let parsed: BenchConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, BenchConfig::default());
    }

    #[test]
    fn test_workspace_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(WORKSPACE_DIR)).unwrap();
        let mut f = std::fs::File::create(workspace_config_path(dir.path())).unwrap();
        writeln!(
            f,
            r#"
seed = 7

[cv]
n_folds = 3

[[datasets]]
name = "cardio"
source = {{ type = "csv", path = "data/cardio.csv" }}

[[models]]
family = "knn"
params = {{ n_neighbors = [3, 9] }}
"#
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.cv.n_folds, 3);
        assert!(config.cv.shuffle);
        assert_eq!(config.datasets.len(), 1);
        assert_eq!(config.datasets[0].source.path(), Some(Path::new("data/cardio.csv")));
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.models[0].family, ModelFamily::Knn);
        assert_eq!(config.models[0].sweep().len(), 2);
    }

    #[test]
    fn test_config_exists_sees_workspace_file() {
        let dir = tempfile::tempdir().unwrap();
        let user_present = user_config_path().is_some_and(|p| p.exists());
        assert_eq!(config_exists(Some(dir.path())), user_present);

        std::fs::create_dir_all(dir.path().join(WORKSPACE_DIR)).unwrap();
        std::fs::write(workspace_config_path(dir.path()), "seed = 1\n").unwrap();
        assert!(config_exists(Some(dir.path())));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(None, Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = BenchConfig::default();
        config.cv.n_folds = 1;
        assert!(config.validate().is_err());

        let mut config = BenchConfig::default();
        config.subsample.outlier_ratio = Some(1.5);
        assert!(config.validate().is_err());

        let mut config = BenchConfig::default();
        config.datasets.push(config.datasets[0].clone());
        assert!(config.validate().unwrap_err().to_string().contains("duplicate"));

        let mut config = BenchConfig::default();
        config.models.push(ModelGrid::new(ModelFamily::Lof));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_restrict() {
        let mut config = BenchConfig::default();
        config
            .restrict(&["synthetic-20d".to_string()], &[ModelFamily::Ecod, ModelFamily::Knn])
            .unwrap();
        assert_eq!(config.datasets.len(), 1);
        let families: Vec<_> = config.models.iter().map(|g| g.family).collect();
        assert_eq!(families, vec![ModelFamily::Knn, ModelFamily::Ecod]);

        let mut config = BenchConfig::default();
        assert!(config.restrict(&["missing".to_string()], &[]).is_err());
    }
}
