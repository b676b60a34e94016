//! Result tables and exports.

pub mod export;
pub mod pivot;

pub use export::{ExportPaths, MANIFEST_FILE, TRIALS_FILE, export_all};
pub use pivot::{Metric, PivotTable};
