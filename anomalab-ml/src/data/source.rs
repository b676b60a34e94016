//! Dataset sources: CSV and JSON benchmark files plus a synthetic generator.

use crate::data::dataset::{Dataset, INLIER, OUTLIER};
use crate::data::synthetic::{SyntheticConfig, make_outlier_blobs};
use crate::error::MlError;
use async_trait::async_trait;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where a dataset comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataSourceType {
    /// Delimited text: every column but the label column is a numeric feature.
    Csv {
        path: PathBuf,
        #[serde(default = "default_label_column")]
        label_column: String,
        #[serde(default = "default_delimiter")]
        delimiter: char,
        #[serde(default = "default_true")]
        has_header: bool,
    },
    /// JSON object `{ "x": [[f64]], "y": [0|1] }`.
    Json { path: PathBuf },
    /// Gaussian inlier cluster with scattered outliers.
    Synthetic(SyntheticConfig),
}

fn default_label_column() -> String {
    "label".to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_true() -> bool {
    true
}

impl DataSourceType {
    /// Backing file, if the source reads one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Csv { path, .. } | Self::Json { path } => Some(path),
            Self::Synthetic(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Csv { .. } => "csv",
            Self::Json { .. } => "json",
            Self::Synthetic(_) => "synthetic",
        }
    }

    /// Build the loader for this source. Relative paths resolve against `base`.
    pub fn into_source(&self, base: &Path) -> Box<dyn DataSource> {
        match self {
            Self::Csv {
                path,
                label_column,
                delimiter,
                has_header,
            } => Box::new(CsvSource {
                path: base.join(path),
                label_column: label_column.clone(),
                delimiter: *delimiter,
                has_header: *has_header,
            }),
            Self::Json { path } => Box::new(JsonSource {
                path: base.join(path),
            }),
            Self::Synthetic(config) => Box::new(SyntheticSource {
                config: config.clone(),
            }),
        }
    }
}

/// A named dataset entry from the benchmark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub name: String,
    pub source: DataSourceType,
}

/// Information about a data source for the run manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceInfo {
    pub source_type: String,
    pub location: String,
    pub accessed_at: chrono::DateTime<chrono::Utc>,
}

/// Trait for loading a dataset from a source.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Load and validate the dataset, naming it `name`.
    async fn load(&self, name: &str) -> Result<Dataset, MlError>;

    /// Metadata about this source.
    fn source_info(&self) -> DataSourceInfo;
}

/// Load the dataset described by `spec`, resolving relative paths against `base`.
pub async fn load_dataset(spec: &DatasetSpec, base: &Path) -> Result<Dataset, MlError> {
    let source = spec.source.into_source(base);
    let dataset = source.load(&spec.name).await?;
    tracing::debug!(
        dataset = %spec.name,
        source = spec.source.kind(),
        rows = dataset.len(),
        features = dataset.n_features(),
        outliers = dataset.n_outliers(),
        "Loaded dataset"
    );
    Ok(dataset)
}

/// Parse a label cell. Accepts `0`/`1`, `0.0`/`1.0` and `true`/`false`.
pub fn parse_label(raw: &str) -> Option<u8> {
    let s = raw.trim().trim_matches('"');
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" => return Some(OUTLIER),
        "0" | "false" => return Some(INLIER),
        _ => {}
    }
    match s.parse::<f64>() {
        Ok(v) if v == 1.0 => Some(OUTLIER),
        Ok(v) if v == 0.0 => Some(INLIER),
        _ => None,
    }
}

fn parse_feature(raw: &str, row: usize, column: &str) -> Result<f64, MlError> {
    raw.trim().trim_matches('"').parse::<f64>().map_err(|_| {
        MlError::dataset(format!(
            "non-numeric value '{raw}' in column '{column}' at data row {row}"
        ))
    })
}

// ---------------------------------------------------------------------------
// CsvSource
// ---------------------------------------------------------------------------

/// CSV file data source.
pub struct CsvSource {
    pub path: PathBuf,
    pub label_column: String,
    pub delimiter: char,
    pub has_header: bool,
}

impl CsvSource {
    fn parse(&self, name: &str, content: &[u8]) -> Result<Dataset, MlError> {
        let delimiter = u8::try_from(self.delimiter).map_err(|_| {
            MlError::invalid_input(format!("delimiter '{}' is not a single byte", self.delimiter))
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(self.has_header)
            .trim(csv::Trim::All)
            .from_reader(content);

        let header: Option<Vec<String>> = if self.has_header {
            Some(reader.headers()?.iter().map(|h| h.to_string()).collect())
        } else {
            None
        };

        let label_idx = match &header {
            Some(columns) => Some(
                columns
                    .iter()
                    .position(|c| c == &self.label_column)
                    .ok_or_else(|| {
                        MlError::dataset(format!(
                            "{name}: label column '{}' not found in {}",
                            self.label_column,
                            self.path.display()
                        ))
                    })?,
            ),
            // Without a header the label is the last column.
            None => None,
        };

        let mut values = Vec::new();
        let mut labels = Vec::new();
        let mut n_cols = None;

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            if record.iter().all(|c| c.is_empty()) {
                continue;
            }
            if record.len() < 2 {
                return Err(MlError::dataset(format!(
                    "{name}: row {row} needs at least one feature and a label"
                )));
            }
            let label_at = label_idx.unwrap_or(record.len() - 1);
            let label = parse_label(&record[label_at]).ok_or_else(|| {
                MlError::dataset(format!(
                    "{name}: label '{}' at data row {row} is not binary",
                    &record[label_at]
                ))
            })?;
            labels.push(label);

            for (col, cell) in record.iter().enumerate() {
                if col == label_at {
                    continue;
                }
                let column = header
                    .as_ref()
                    .and_then(|h| h.get(col))
                    .cloned()
                    .unwrap_or_else(|| col.to_string());
                values.push(parse_feature(cell, row, &column)?);
            }
            n_cols.get_or_insert(record.len() - 1);
        }

        let n_cols = n_cols.ok_or_else(|| {
            MlError::dataset(format!("{name}: {} has no data rows", self.path.display()))
        })?;
        let features = Array2::from_shape_vec((labels.len(), n_cols), values)?;
        Dataset::new(name, features, labels)
    }
}

#[async_trait]
impl DataSource for CsvSource {
    async fn load(&self, name: &str) -> Result<Dataset, MlError> {
        let content = tokio::fs::read(&self.path).await?;
        if content.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(MlError::dataset(format!(
                "{name}: empty CSV file {}",
                self.path.display()
            )));
        }
        self.parse(name, &content)
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "csv".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// JsonSource
// ---------------------------------------------------------------------------

/// JSON file data source with `x` (rows of features) and `y` (labels).
pub struct JsonSource {
    pub path: PathBuf,
}

#[derive(Deserialize)]
struct JsonArrays {
    x: Vec<Vec<f64>>,
    y: Vec<serde_json::Value>,
}

#[async_trait]
impl DataSource for JsonSource {
    async fn load(&self, name: &str) -> Result<Dataset, MlError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let arrays: JsonArrays = serde_json::from_str(&content)?;

        let n_cols = arrays.x.first().map(|r| r.len()).unwrap_or(0);
        if let Some(row) = arrays.x.iter().position(|r| r.len() != n_cols) {
            return Err(MlError::dataset(format!(
                "{name}: row {row} has {} features, expected {n_cols}",
                arrays.x[row].len()
            )));
        }

        let labels = arrays
            .y
            .iter()
            .enumerate()
            .map(|(row, v)| {
                let raw = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                parse_label(&raw).ok_or_else(|| {
                    MlError::dataset(format!("{name}: label {v} at row {row} is not binary"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let n_rows = arrays.x.len();
        let values: Vec<f64> = arrays.x.into_iter().flatten().collect();
        let features = Array2::from_shape_vec((n_rows, n_cols), values)?;
        Dataset::new(name, features, labels)
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "json".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// SyntheticSource
// ---------------------------------------------------------------------------

/// Generated dataset; no file involved.
pub struct SyntheticSource {
    pub config: SyntheticConfig,
}

#[async_trait]
impl DataSource for SyntheticSource {
    async fn load(&self, name: &str) -> Result<Dataset, MlError> {
        make_outlier_blobs(name, &self.config)
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "synthetic".to_string(),
            location: format!(
                "synthetic(inliers={}, outliers={}, features={}, seed={})",
                self.config.n_inliers,
                self.config.n_outliers,
                self.config.n_features,
                self.config.seed
            ),
            accessed_at: chrono::Utc::now(),
        }
    }
}
