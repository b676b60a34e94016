//! Catalog of the datasets a run loaded, with content hashes for provenance.

use crate::data::dataset::{Dataset, DatasetSummary};
use crate::data::source::{DataSourceInfo, DataSourceType, DatasetSpec, load_dataset};
use crate::error::MlError;
use crate::persistence;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// A loaded dataset entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub name: String,
    pub source: DataSourceType,
    /// SHA-256 of the backing file, or of the generator parameters.
    pub hash: String,
    pub summary: DatasetSummary,
    /// Where the rows were read from, and when.
    pub origin: DataSourceInfo,
}

/// Registry of datasets used in a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetCatalog {
    pub datasets: Vec<DatasetEntry>,
}

impl DatasetCatalog {
    pub fn new() -> Self {
        Self {
            datasets: Vec::new(),
        }
    }

    /// Load every spec in order, returning the datasets and their catalog.
    pub async fn load_all(
        specs: &[DatasetSpec],
        base: &Path,
    ) -> Result<(Vec<Dataset>, Self), MlError> {
        let mut catalog = Self::new();
        let mut datasets = Vec::with_capacity(specs.len());
        for spec in specs {
            let dataset = load_dataset(spec, base).await?;
            catalog.register(spec, &dataset, base)?;
            datasets.push(dataset);
        }
        Ok((datasets, catalog))
    }

    /// Load a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self, MlError> {
        Ok(persistence::load_json(path)?.unwrap_or_default())
    }

    /// Save the catalog to a JSON file (atomic write).
    pub fn save(&self, path: &Path) -> Result<(), MlError> {
        persistence::atomic_write_json(path, self)
    }

    /// Record a loaded dataset, replacing any earlier entry with the same name.
    pub fn register(
        &mut self,
        spec: &DatasetSpec,
        dataset: &Dataset,
        base: &Path,
    ) -> Result<&DatasetEntry, MlError> {
        let hash = match spec.source.path() {
            Some(path) => hash_file(&base.join(path))?,
            None => hash_bytes(serde_json::to_string(&spec.source)?.as_bytes()),
        };
        self.datasets.retain(|d| d.name != spec.name);
        self.datasets.push(DatasetEntry {
            name: spec.name.clone(),
            source: spec.source.clone(),
            hash,
            summary: dataset.summary(),
            origin: spec.source.into_source(base).source_info(),
        });
        self.datasets
            .last()
            .ok_or_else(|| MlError::dataset("catalog entry vanished after insert"))
    }

    pub fn find(&self, name: &str) -> Option<&DatasetEntry> {
        self.datasets.iter().find(|d| d.name == name)
    }

    pub fn list(&self) -> &[DatasetEntry] {
        &self.datasets
    }
}

/// Compute SHA-256 hash of file contents.
pub fn hash_file(path: &Path) -> Result<String, MlError> {
    let content = std::fs::read(path)?;
    Ok(hash_bytes(&content))
}

/// Compute SHA-256 hash of arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
