//! Data pipeline: loading, cataloguing, subsampling, splitting and scaling.

pub mod dataset;
pub mod preprocess;
pub mod source;
pub mod split;
pub mod storage;
pub mod subsample;
pub mod synthetic;

pub use dataset::{Dataset, DatasetSummary, INLIER, OUTLIER};
pub use preprocess::{PreprocessConfig, StandardScaler};
pub use source::{
    CsvSource, DataSource, DataSourceInfo, DataSourceType, DatasetSpec, JsonSource,
    SyntheticSource, load_dataset,
};
pub use split::{SplitConfig, train_test_split};
pub use storage::{DatasetCatalog, DatasetEntry};
pub use subsample::{SubsampleConfig, subsample};
pub use synthetic::{SyntheticConfig, make_outlier_blobs};
