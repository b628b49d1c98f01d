// file: src/store/record.rs
// description: pipeline identifiers, per-pipeline records and the stage deltas merged into them
// reference: field-group records with last-write-wins merges

use crate::dataset::Dataset;
use crate::error::PipelineError;
use crate::stages::{CleaningInfo, DatasetInfo, PreprocessingInfo, SplitData, TrainingState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineId(Uuid);

impl PipelineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PipelineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ids that do not parse can never name a pipeline, so they surface as `NotFound`.
impl FromStr for PipelineId {
    type Err = PipelineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(raw.trim())
            .map(PipelineId)
            .map_err(|_| PipelineError::NotFound(raw.to_string()))
    }
}

/// Everything known about one pipeline. Field groups start empty and are
/// filled by the stages in order.
#[derive(Debug, Clone)]
pub struct PipelineRecord {
    pub id: PipelineId,
    pub created_at: DateTime<Utc>,
    pub dataset: Option<Dataset>,
    pub dataset_info: Option<DatasetInfo>,
    pub cleaning: Option<CleaningInfo>,
    pub preprocessing: Option<PreprocessingInfo>,
    pub split: Option<SplitData>,
    pub training: Option<TrainingState>,
}

impl PipelineRecord {
    pub fn new(id: PipelineId) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            dataset: None,
            dataset_info: None,
            cleaning: None,
            preprocessing: None,
            split: None,
            training: None,
        }
    }

    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            pipeline_id: self.id,
            filename: self.dataset_info.as_ref().map(|info| info.filename.clone()),
            created_at: self.created_at,
            has_split: self.split.is_some(),
            has_model: self.training.is_some(),
            busy: false,
        }
    }
}

/// The field groups one stage wants written. Absent groups are left untouched.
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub dataset: Option<Dataset>,
    pub dataset_info: Option<DatasetInfo>,
    pub cleaning: Option<CleaningInfo>,
    pub preprocessing: Option<PreprocessingInfo>,
    pub split: Option<SplitData>,
    pub training: Option<TrainingState>,
}

impl RecordUpdate {
    pub fn is_empty(&self) -> bool {
        self.dataset.is_none()
            && self.dataset_info.is_none()
            && self.cleaning.is_none()
            && self.preprocessing.is_none()
            && self.split.is_none()
            && self.training.is_none()
    }

    pub fn apply(self, record: &mut PipelineRecord) {
        if let Some(dataset) = self.dataset {
            record.dataset = Some(dataset);
        }
        if let Some(info) = self.dataset_info {
            record.dataset_info = Some(info);
        }
        if let Some(cleaning) = self.cleaning {
            record.cleaning = Some(cleaning);
        }
        if let Some(preprocessing) = self.preprocessing {
            record.preprocessing = Some(preprocessing);
        }
        if let Some(split) = self.split {
            record.split = Some(split);
        }
        if let Some(training) = self.training {
            record.training = Some(training);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub pipeline_id: PipelineId,
    pub filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub has_split: bool,
    pub has_model: bool,
    /// A stage held the record while the listing was taken; the other
    /// fields are as of its last completed merge.
    pub busy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{PreprocessingInfo, ScalerKind};

    #[test]
    fn test_pipeline_id_parse() {
        let id = PipelineId::new();
        let parsed: PipelineId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);

        let err = "not-a-uuid".parse::<PipelineId>().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_apply_only_touches_present_groups() {
        let mut record = PipelineRecord::new(PipelineId::new());
        record.dataset = Some(Dataset::default());

        let update = RecordUpdate {
            preprocessing: Some(PreprocessingInfo {
                scaler: ScalerKind::Normalize,
                columns: vec!["age".to_string()],
            }),
            ..RecordUpdate::default()
        };
        assert!(!update.is_empty());
        update.apply(&mut record);

        assert!(record.dataset.is_some());
        assert_eq!(
            record.preprocessing.as_ref().map(|p| p.scaler),
            Some(ScalerKind::Normalize)
        );
        assert!(record.training.is_none());
    }

    #[test]
    fn test_summary_flags() {
        let record = PipelineRecord::new(PipelineId::new());
        let summary = record.summary();
        assert!(!summary.has_split);
        assert!(!summary.has_model);
        assert!(summary.filename.is_none());
    }
}
