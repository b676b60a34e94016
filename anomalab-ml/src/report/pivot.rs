//! Dataset × model pivot tables of the best trial scores.

use crate::detectors::ModelFamily;
use crate::training::{BestResult, ExperimentOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which score of a best result a table shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Mean cross-validation AUC-ROC.
    Validation,
    /// Held-out test AUC-ROC of the same hyperparameters.
    Test,
}

impl Metric {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Validation => "Mean validation AUC-ROC",
            Self::Test => "Test AUC-ROC",
        }
    }

    fn pick(&self, best: &BestResult) -> f64 {
        match self {
            Self::Validation => best.validation_auc,
            Self::Test => best.test_auc,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Rows are datasets, columns model families; a cell is empty when every
/// trial of that pair failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotTable {
    pub metric: Metric,
    pub rows: Vec<String>,
    pub columns: Vec<ModelFamily>,
    pub cells: Vec<Vec<Option<f64>>>,
}

impl PivotTable {
    /// Build with rows and columns in first-seen order of `best`.
    pub fn from_best(best: &[BestResult], metric: Metric) -> Self {
        let mut rows: Vec<String> = Vec::new();
        let mut columns: Vec<ModelFamily> = Vec::new();
        for b in best {
            if !rows.contains(&b.dataset) {
                rows.push(b.dataset.clone());
            }
            if !columns.contains(&b.family) {
                columns.push(b.family);
            }
        }
        Self::with_axes(rows, columns, best, metric)
    }

    /// Build with the run's own dataset and model order, keeping rows and
    /// columns that have no completed trial.
    pub fn from_outcome(outcome: &ExperimentOutcome, metric: Metric) -> Self {
        Self::with_axes(outcome.datasets.clone(), outcome.models.clone(), &outcome.best, metric)
    }

    fn with_axes(rows: Vec<String>, columns: Vec<ModelFamily>, best: &[BestResult], metric: Metric) -> Self {
        let cells = rows
            .iter()
            .map(|dataset| {
                columns
                    .iter()
                    .map(|family| {
                        best.iter()
                            .find(|b| &b.dataset == dataset && b.family == *family)
                            .map(|b| metric.pick(b))
                    })
                    .collect()
            })
            .collect();
        Self {
            metric,
            rows,
            columns,
            cells,
        }
    }

    pub fn get(&self, dataset: &str, family: ModelFamily) -> Option<f64> {
        let row = self.rows.iter().position(|r| r == dataset)?;
        let col = self.columns.iter().position(|c| *c == family)?;
        self.cells[row][col]
    }

    /// Column index of the row maximum; ties keep the leftmost.
    pub fn best_column(&self, row: usize) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (col, value) in self.cells.get(row)?.iter().enumerate() {
            if let Some(v) = value
                && best.is_none_or(|(_, b)| *v > b)
            {
                best = Some((col, *v));
            }
        }
        best.map(|(col, _)| col)
    }

    pub fn row_max(&self, row: usize) -> Option<f64> {
        let col = self.best_column(row)?;
        self.cells[row][col]
    }

    /// Markdown table with each row's maximum in bold.
    pub fn render_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str("| Dataset |");
        for family in &self.columns {
            md.push_str(&format!(" {} |", family.label()));
        }
        md.push_str("\n|---|");
        for _ in &self.columns {
            md.push_str("---:|");
        }
        md.push('\n');

        for (row, dataset) in self.rows.iter().enumerate() {
            let best = self.best_column(row);
            md.push_str(&format!("| {dataset} |"));
            for (col, value) in self.cells[row].iter().enumerate() {
                match value {
                    Some(v) if best == Some(col) => md.push_str(&format!(" **{v:.4}** |")),
                    Some(v) => md.push_str(&format!(" {v:.4} |")),
                    None => md.push_str(" - |"),
                }
            }
            md.push('\n');
        }
        md
    }
}
