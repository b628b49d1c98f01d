// file: src/report/mod.rs
// description: results view assembled from a record snapshot
// reference: optional sections omitted from JSON when the stage has not run

pub mod charts;

pub use charts::{BarChart, ChartBuilder, Charts, Heatmap};

use crate::config::ReportingConfig;
use crate::error::{PipelineError, Result};
use crate::metrics::ModelMetrics;
use crate::models::{ModelType, TaskType};
use crate::stages::train::FeatureImportance;
use crate::stages::{CleaningInfo, DatasetInfo, PreprocessingInfo};
use crate::store::{PipelineId, PipelineRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitInfo {
    pub train_size: usize,
    pub test_size: usize,
    pub features: Vec<String>,
    pub target_column: String,
    pub split_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model_type: ModelType,
    pub task_type: TaskType,
    pub metrics: ModelMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_importances: Option<Vec<FeatureImportance>>,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultsReport {
    pub pipeline_id: PipelineId,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_info: Option<DatasetInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaning: Option<CleaningInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preprocessing: Option<PreprocessingInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_info: Option<SplitInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_info: Option<ModelInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charts: Option<Charts>,
}

impl ResultsReport {
    /// Never fails: whatever the record holds is reported, the rest is `None`.
    pub fn from_record(record: &PipelineRecord) -> Self {
        Self {
            pipeline_id: record.id,
            created_at: record.created_at,
            dataset_info: record.dataset_info.clone(),
            cleaning: record.cleaning.clone(),
            preprocessing: record.preprocessing.clone(),
            split_info: record.split.as_ref().map(|split| SplitInfo {
                train_size: split.train_size(),
                test_size: split.test_size(),
                features: split.feature_columns.clone(),
                target_column: split.target_column.clone(),
                split_ratio: split.ratio,
            }),
            model_info: record.training.as_ref().map(|training| ModelInfo {
                model_type: training.model_type,
                task_type: training.task_type,
                metrics: training.metrics.clone(),
                feature_importances: training.feature_importances.clone(),
                trained_at: training.trained_at,
            }),
            charts: None,
        }
    }

    pub fn with_charts(mut self, record: &PipelineRecord, config: &ReportingConfig) -> Self {
        if config.charts_enabled {
            self.charts = Some(ChartBuilder::new(config).build(record));
        }
        self
    }
}

/// Renders any report as JSON for callers that print or ship it.
pub fn render_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.map_err(|e| PipelineError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::stages::ingest;

    fn ingested() -> PipelineRecord {
        let config = Config::default_config();
        let output = ingest::run(b"a,b\n1,2\n3,4\n", "tiny.csv", &config.ingest).unwrap();
        let mut record = PipelineRecord::new(PipelineId::new());
        output.update.apply(&mut record);
        record
    }

    #[test]
    fn test_results_after_ingest_only() {
        let record = ingested();
        let report = ResultsReport::from_record(&record);

        assert!(report.dataset_info.is_some());
        assert!(report.preprocessing.is_none());
        assert!(report.split_info.is_none());
        assert!(report.model_info.is_none());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("dataset_info").is_some());
        assert!(json.get("model_info").is_none());
        assert!(json.get("charts").is_none());
    }

    #[test]
    fn test_charts_respect_config_switch() {
        let record = ingested();
        let mut config = Config::default_config().reporting;
        config.charts_enabled = false;
        let report = ResultsReport::from_record(&record).with_charts(&record, &config);
        assert!(report.charts.is_none());
    }

    #[test]
    fn test_render_json() {
        let report = ResultsReport::from_record(&ingested());
        let compact = render_json(&report, false).unwrap();
        assert!(!compact.contains('\n'));
        assert!(render_json(&report, true).unwrap().contains('\n'));

        let mut bad = std::collections::HashMap::new();
        bad.insert((1, 2), 3);
        assert!(matches!(
            render_json(&bad, false),
            Err(PipelineError::Serialization(_))
        ));
    }
}
