//! Reproducibility tracking: environment snapshots, seed derivation, run manifests.

use crate::data::{DataSourceInfo, DatasetCatalog};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Snapshot of the machine a run executed on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub crate_version: String,
    pub platform: String,
    pub arch: String,
    pub timestamp: DateTime<Utc>,
    /// Hash of `RUST_LOG` and every `ANOMALAB_*` variable.
    pub env_vars_hash: String,
}

impl EnvironmentSnapshot {
    pub fn capture() -> Self {
        Self {
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            timestamp: Utc::now(),
            env_vars_hash: Self::compute_env_vars_hash(),
        }
    }

    fn compute_env_vars_hash() -> String {
        let vars: BTreeMap<String, String> = std::env::vars()
            .filter(|(k, _)| k == "RUST_LOG" || k.starts_with("ANOMALAB_"))
            .collect();
        let mut hasher = Sha256::new();
        for (key, value) in &vars {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Derives independent per-component seeds from one global seed.
///
/// A component's seed depends only on the global seed and its name, so
/// adding or reordering components leaves the others unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedManager {
    pub global_seed: u64,
    pub component_seeds: BTreeMap<String, u64>,
}

impl SeedManager {
    pub fn new(global_seed: u64) -> Self {
        Self {
            global_seed,
            component_seeds: BTreeMap::new(),
        }
    }

    /// Seed for `component`, remembered for the run manifest.
    pub fn get_seed(&mut self, component: &str) -> u64 {
        let global_seed = self.global_seed;
        *self
            .component_seeds
            .entry(component.to_string())
            .or_insert_with(|| derive_seed(global_seed, component))
    }
}

/// First eight bytes of `SHA-256(global_seed_le || component)`.
pub fn derive_seed(global_seed: u64, component: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(global_seed.to_le_bytes());
    hasher.update(component.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Everything needed to rerun an experiment and check it used the same inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub seed: u64,
    pub environment: EnvironmentSnapshot,
    /// Dataset name to SHA-256 of its source.
    pub dataset_hashes: BTreeMap<String, String>,
    #[serde(default)]
    pub dataset_sources: BTreeMap<String, DataSourceInfo>,
    pub component_seeds: BTreeMap<String, u64>,
    /// Effective configuration the run was started with.
    pub config: serde_json::Value,
    pub trials: usize,
    pub failed_trials: usize,
}

impl RunManifest {
    pub fn new(seed: u64, config: serde_json::Value) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            seed,
            environment: EnvironmentSnapshot::capture(),
            dataset_hashes: BTreeMap::new(),
            dataset_sources: BTreeMap::new(),
            component_seeds: BTreeMap::new(),
            config,
            trials: 0,
            failed_trials: 0,
        }
    }

    pub fn record_datasets(&mut self, catalog: &DatasetCatalog) {
        for entry in catalog.list() {
            self.dataset_hashes
                .insert(entry.name.clone(), entry.hash.clone());
            self.dataset_sources
                .insert(entry.name.clone(), entry.origin.clone());
        }
    }

    pub fn finish(&mut self, seeds: &SeedManager, trials: usize, failed_trials: usize) {
        self.component_seeds = seeds.component_seeds.clone();
        self.trials = trials;
        self.failed_trials = failed_trials;
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration, once finished.
    pub fn duration_secs(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}
