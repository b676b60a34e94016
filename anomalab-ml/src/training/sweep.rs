//! Hyperparameter grids and their expansion into trial configurations.

use crate::detectors::{ModelFamily, build_detector};
use crate::error::MlError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One combination of hyperparameter values.
pub type ParamSet = BTreeMap<String, Value>;

/// The grid searched for one model family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelGrid {
    pub family: ModelFamily,
    /// Candidate values per hyperparameter. An absent table uses the family's
    /// default grid; an explicit empty table searches defaults only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<BTreeMap<String, Vec<Value>>>,
}

impl ModelGrid {
    pub fn new(family: ModelFamily) -> Self {
        Self {
            family,
            params: None,
        }
    }

    pub fn with_params(family: ModelFamily, params: BTreeMap<String, Vec<Value>>) -> Self {
        Self {
            family,
            params: Some(params),
        }
    }

    /// Grid actually searched.
    pub fn effective_params(&self) -> BTreeMap<String, Vec<Value>> {
        self.params
            .clone()
            .unwrap_or_else(|| self.family.default_grid())
    }

    pub fn sweep(&self) -> HyperparamSweep {
        HyperparamSweep::grid(self.effective_params())
    }

    /// Check that every combination of the grid builds a detector.
    pub fn validate(&self) -> Result<usize, MlError> {
        let trials = self.sweep().generate_trials()?;
        for params in &trials {
            build_detector(self.family, params, 0)?;
        }
        Ok(trials.len())
    }
}

/// Exhaustive grid sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperparamSweep {
    pub params: BTreeMap<String, Vec<Value>>,
}

impl HyperparamSweep {
    pub fn grid(params: BTreeMap<String, Vec<Value>>) -> Self {
        Self { params }
    }

    /// Number of combinations the grid expands to.
    pub fn len(&self) -> usize {
        self.params.values().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product of the grid, keys in sorted order and values in the
    /// order given, last key varying fastest. An empty grid yields a single
    /// empty combination.
    pub fn generate_trials(&self) -> Result<Vec<ParamSet>, MlError> {
        if let Some((key, _)) = self.params.iter().find(|(_, v)| v.is_empty()) {
            return Err(MlError::config(format!(
                "hyperparameter '{key}' has no candidate values"
            )));
        }
        let mut configs = vec![ParamSet::new()];
        for (key, values) in &self.params {
            let mut new_configs = Vec::with_capacity(configs.len() * values.len());
            for config in &configs {
                for value in values {
                    let mut c = config.clone();
                    c.insert(key.clone(), value.clone());
                    new_configs.push(c);
                }
            }
            configs = new_configs;
        }
        Ok(configs)
    }
}

/// Compact `k=v, k=v` rendering of a parameter set for logs and tables.
pub fn format_params(params: &ParamSet) -> String {
    if params.is_empty() {
        return "defaults".to_string();
    }
    params
        .iter()
        .map(|(k, v)| match v {
            Value::String(s) => format!("{k}={s}"),
            other => format!("{k}={other}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn grid(pairs: &[(&str, Vec<Value>)]) -> BTreeMap<String, Vec<Value>> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_grid_cartesian_product_order() {
        let sweep = HyperparamSweep::grid(grid(&[
            ("n_neighbors", vec![json!(5), json!(10)]),
            ("method", vec![json!("largest"), json!("mean")]),
        ]));
        assert_eq!(sweep.len(), 4);
        let rendered: Vec<String> = sweep
            .generate_trials()
            .unwrap()
            .iter()
            .map(format_params)
            .collect();
        assert_eq!(
            rendered,
            vec![
                "method=largest, n_neighbors=5",
                "method=largest, n_neighbors=10",
                "method=mean, n_neighbors=5",
                "method=mean, n_neighbors=10",
            ]
        );
    }

    #[test]
    fn test_empty_grid_is_single_default_trial() {
        let trials = HyperparamSweep::grid(BTreeMap::new()).generate_trials().unwrap();
        assert_eq!(trials, vec![ParamSet::new()]);
        assert_eq!(format_params(&trials[0]), "defaults");
    }

    #[test]
    fn test_key_without_values_is_error() {
        let sweep = HyperparamSweep::grid(grid(&[("n_bins", vec![])]));
        assert!(sweep.generate_trials().is_err());
    }

    #[test]
    fn test_model_grid_defaults_and_validation() {
        let g = ModelGrid::new(ModelFamily::IsolationForest);
        assert_eq!(g.validate().unwrap(), 9);

        let bad = ModelGrid::with_params(
            ModelFamily::Hbos,
            grid(&[("n_bins", vec![json!(10), json!(0)])]),
        );
        assert!(matches!(bad.validate(), Err(MlError::Config(_))));
    }

    #[test]
    fn test_model_grid_from_toml_like_json() {
        let g: ModelGrid =
            serde_json::from_str(r#"{"family": "lof", "params": {"n_neighbors": [3, 7]}}"#).unwrap();
        assert_eq!(g.family, ModelFamily::Lof);
        assert_eq!(g.validate().unwrap(), 2);

        let d: ModelGrid = serde_json::from_str(r#"{"family": "ecod"}"#).unwrap();
        assert_eq!(d.validate().unwrap(), 1);
    }
}
