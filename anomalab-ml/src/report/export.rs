//! Spreadsheet (CSV) and JSON exports of a finished run.

use super::pivot::{Metric, PivotTable};
use crate::config::OutputConfig;
use crate::error::MlError;
use crate::persistence;
use crate::training::{ExperimentOutcome, ExperimentRegistry};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const TRIALS_FILE: &str = "trials.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Files written by [`export_all`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportPaths {
    pub validation: PathBuf,
    pub test: PathBuf,
    pub trials: PathBuf,
    pub manifest: PathBuf,
}

impl PivotTable {
    /// Write the table as CSV: `dataset,<model labels…>,best_model`.
    ///
    /// Scores carry six decimals; a missing cell is left empty. The
    /// `best_model` column names the row maximum.
    pub fn export_csv(&self, path: &Path) -> Result<(), MlError> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec!["dataset".to_string()];
        header.extend(self.columns.iter().map(|f| f.label().to_string()));
        header.push("best_model".to_string());
        writer.write_record(&header)?;

        for (row, dataset) in self.rows.iter().enumerate() {
            let mut record = vec![dataset.clone()];
            record.extend(
                self.cells[row]
                    .iter()
                    .map(|cell| cell.map(|v| format!("{v:.6}")).unwrap_or_default()),
            );
            record.push(
                self.best_column(row)
                    .map(|col| self.columns[col].label().to_string())
                    .unwrap_or_default(),
            );
            writer.write_record(&record)?;
        }

        let bytes = writer.into_inner().map_err(|e| MlError::Io(e.into_error()))?;
        persistence::atomic_write(path, &bytes)
    }
}

/// Write both pivot spreadsheets, every trial record, and the run manifest
/// into `output.dir`.
pub fn export_all(outcome: &ExperimentOutcome, output: &OutputConfig) -> Result<ExportPaths, MlError> {
    let paths = ExportPaths {
        validation: output.dir.join(&output.validation_file),
        test: output.dir.join(&output.test_file),
        trials: output.dir.join(TRIALS_FILE),
        manifest: output.dir.join(MANIFEST_FILE),
    };

    PivotTable::from_outcome(outcome, Metric::Validation).export_csv(&paths.validation)?;
    PivotTable::from_outcome(outcome, Metric::Test).export_csv(&paths.test)?;
    ExperimentRegistry::from_outcome(outcome).save(&paths.trials)?;
    persistence::atomic_write_json(&paths.manifest, &outcome.manifest)?;

    info!(
        dir = %output.dir.display(),
        trials = outcome.records.len(),
        "Exported results"
    );
    Ok(paths)
}
