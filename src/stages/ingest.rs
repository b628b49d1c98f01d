// file: src/stages/ingest.rs
// description: decodes an upload and snapshots the dataset description taken at creation
// reference: upload handling with size limits and content hashing

use crate::config::IngestConfig;
use crate::dataset::{Cell, ColumnType, Dataset, DatasetReader};
use crate::error::Result;
use crate::stages::StageOutput;
use crate::store::{PipelineId, RecordUpdate};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info};

const PREVIEW_ROWS: usize = 5;

/// Immutable description of the dataset as uploaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub filename: String,
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub column_types: BTreeMap<String, ColumnType>,
    pub missing_values: BTreeMap<String, usize>,
    pub numeric_columns: Vec<String>,
    pub preview: Vec<BTreeMap<String, Cell>>,
    pub content_hash: String,
}

impl DatasetInfo {
    pub fn describe(dataset: &Dataset, filename: &str, bytes: &[u8]) -> Self {
        Self {
            filename: filename.to_string(),
            rows: dataset.row_count(),
            columns: dataset.column_count(),
            column_names: dataset.column_names(),
            column_types: dataset.column_types(),
            missing_values: dataset.missing_counts(),
            numeric_columns: dataset.numeric_column_names(),
            preview: dataset.preview(PREVIEW_ROWS),
            content_hash: content_hash(bytes),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub pipeline_id: PipelineId,
    pub dataset_info: DatasetInfo,
    pub message: String,
}

impl IngestReport {
    pub fn new(pipeline_id: PipelineId, dataset_info: DatasetInfo) -> Self {
        let message = format!(
            "Dataset {} uploaded: {} rows, {} columns",
            dataset_info.filename, dataset_info.rows, dataset_info.columns
        );
        Self {
            pipeline_id,
            dataset_info,
            message,
        }
    }
}

pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Parses the payload and prepares the groups a new record starts with.
pub fn run(bytes: &[u8], filename: &str, config: &IngestConfig) -> Result<StageOutput<DatasetInfo>> {
    let dataset = DatasetReader::new(config).read(bytes, filename)?;
    let info = DatasetInfo::describe(&dataset, filename, bytes);

    info!(
        "Ingested {}: {} rows x {} columns",
        filename, info.rows, info.columns
    );
    debug!("Column types for {}: {:?}", filename, info.column_types);

    Ok(StageOutput {
        report: info.clone(),
        update: RecordUpdate {
            dataset: Some(dataset),
            dataset_info: Some(info),
            ..RecordUpdate::default()
        },
    })
}
