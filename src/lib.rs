// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod stages;
pub mod store;
pub mod utils;

pub use config::{
    Config, IngestConfig, PipelineConfig, ReportingConfig, SplitConfig, TrainingConfig,
};
pub use dataset::{Cell, Column, ColumnType, DataFormat, Dataset, DatasetReader};
pub use error::{PipelineError, Result};
pub use metrics::{ClassificationMetrics, ModelMetrics, RegressionMetrics};
pub use models::{FittedModel, ModelType, TaskType};
pub use pipeline::{PipelineService, RunStats, StageProgress};
pub use report::{Charts, ResultsReport};
pub use stages::{
    CleanReport, CleanRequest, CleanStrategy, IngestReport, ScaleReport, ScaleRequest,
    ScalerKind, SplitReport, SplitRequest, TrainReport,
};
pub use store::{PipelineId, PipelineStore, PipelineSummary};
pub use utils::{OperationTimer, RunTiming, Validator};
