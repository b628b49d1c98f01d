// file: src/stages/train.rs
// description: fits the requested model on the stored split and scores both partitions
// reference: label encoding, fit/predict and metric evaluation per task type

use crate::config::TrainingConfig;
use crate::dataset::Cell;
use crate::error::{PipelineError, Result};
use crate::metrics::{self, ModelMetrics};
use crate::models::{FittedModel, ModelType, TaskType};
use crate::stages::{SplitData, StageOutput};
use crate::store::{PipelineId, RecordUpdate};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Result of the latest training run. The fitted model stays in memory only.
#[derive(Debug, Clone)]
pub struct TrainingState {
    pub model_type: ModelType,
    pub task_type: TaskType,
    pub model: FittedModel,
    pub metrics: ModelMetrics,
    /// Class labels in index order; `None` for regression.
    pub classes: Option<Vec<Cell>>,
    pub train_predictions: Vec<Cell>,
    pub test_predictions: Vec<Cell>,
    /// Sorted by descending importance.
    pub feature_importances: Option<Vec<FeatureImportance>>,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub model_type: ModelType,
    pub task_type: TaskType,
    pub metrics: ModelMetrics,
    pub message: String,
}

pub fn run(
    pipeline_id: &PipelineId,
    split: Option<&SplitData>,
    model_tag: &str,
    config: &TrainingConfig,
) -> Result<StageOutput<TrainReport>> {
    let split = split.ok_or_else(|| PipelineError::NoSplitYet(pipeline_id.to_string()))?;
    let model_type: ModelType = model_tag.parse()?;
    if split.x_train.is_empty() {
        return Err(PipelineError::EmptyTrainingSet(pipeline_id.to_string()));
    }

    let task_type = model_type.task_type();
    debug!(
        "Training {} on {} rows x {} features",
        model_type,
        split.train_size(),
        split.feature_columns.len()
    );

    let state = match task_type {
        TaskType::Classification => fit_classifier(model_type, split, config)?,
        TaskType::Regression => fit_regressor(model_type, split, config)?,
    };

    let message = format!(
        "Model trained successfully. Test {}: {:.4}",
        state.metrics.score_name(),
        state.metrics.test_score()
    );
    info!("{} ({})", message, model_type);

    Ok(StageOutput {
        report: TrainReport {
            model_type,
            task_type,
            metrics: state.metrics.clone(),
            message,
        },
        update: RecordUpdate {
            training: Some(state),
            ..RecordUpdate::default()
        },
    })
}

fn fit_classifier(
    model_type: ModelType,
    split: &SplitData,
    config: &TrainingConfig,
) -> Result<TrainingState> {
    let failed = |message: String| PipelineError::training(model_type.as_str(), message);

    let classes = class_labels(split.y_train.iter().chain(&split.y_test))
        .map_err(|message| failed(format!("target '{}': {}", split.target_column, message)))?;
    let encode = |cells: &[Cell]| -> Vec<usize> {
        cells
            .iter()
            .filter_map(|cell| classes.iter().position(|c| c.total_cmp(cell) == Ordering::Equal))
            .collect()
    };
    let train_truth = encode(&split.y_train);
    let test_truth = encode(&split.y_test);
    let as_targets: Vec<f64> = train_truth.iter().map(|&i| i as f64).collect();

    let model = FittedModel::fit(model_type, &split.x_train, &as_targets, classes.len(), config)?;
    let decode = |predictions: Vec<f64>| -> Vec<usize> {
        predictions.into_iter().map(|p| p as usize).collect()
    };
    let train_predicted = decode(model.predict(&split.x_train));
    let test_predicted = decode(model.predict(&split.x_test));

    let names: Vec<String> = classes.iter().map(Cell::label).collect();
    let metrics = metrics::evaluate_classification(
        &train_truth,
        &train_predicted,
        &test_truth,
        &test_predicted,
        &names,
    );

    let to_cells = |indices: &[usize]| -> Vec<Cell> {
        indices
            .iter()
            .map(|&i| classes.get(i).cloned().unwrap_or(Cell::Missing))
            .collect()
    };

    Ok(TrainingState {
        model_type,
        task_type: TaskType::Classification,
        feature_importances: importances(&model, &split.feature_columns),
        metrics: ModelMetrics::Classification(metrics),
        train_predictions: to_cells(&train_predicted),
        test_predictions: to_cells(&test_predicted),
        classes: Some(classes),
        model,
        trained_at: Utc::now(),
    })
}

fn fit_regressor(
    model_type: ModelType,
    split: &SplitData,
    config: &TrainingConfig,
) -> Result<TrainingState> {
    let numeric = |cells: &[Cell]| -> Result<Vec<f64>> {
        cells
            .iter()
            .map(|cell| {
                cell.as_number().ok_or_else(|| {
                    PipelineError::training(
                        model_type.as_str(),
                        format!(
                            "target '{}' must be numeric for regression, found '{}'",
                            split.target_column, cell
                        ),
                    )
                })
            })
            .collect()
    };
    let train_truth = numeric(&split.y_train)?;
    let test_truth = numeric(&split.y_test)?;

    let model = FittedModel::fit(model_type, &split.x_train, &train_truth, 0, config)?;
    let train_predicted = model.predict(&split.x_train);
    let test_predicted = model.predict(&split.x_test);

    let metrics =
        metrics::evaluate_regression(&train_truth, &train_predicted, &test_truth, &test_predicted);

    Ok(TrainingState {
        model_type,
        task_type: TaskType::Regression,
        feature_importances: importances(&model, &split.feature_columns),
        metrics: ModelMetrics::Regression(metrics),
        train_predictions: train_predicted.into_iter().map(Cell::Number).collect(),
        test_predictions: test_predicted.into_iter().map(Cell::Number).collect(),
        classes: None,
        model,
        trained_at: Utc::now(),
    })
}

/// Sorted distinct labels. Numbers with a fractional part mean the target is
/// continuous and cannot be used as classes.
fn class_labels<'a>(cells: impl Iterator<Item = &'a Cell>) -> std::result::Result<Vec<Cell>, String> {
    let mut labels: Vec<Cell> = Vec::new();
    for cell in cells {
        match cell {
            Cell::Missing => return Err("contains missing values".to_string()),
            Cell::Number(value) if value.fract() != 0.0 || !value.is_finite() => {
                return Err(format!(
                    "continuous values such as {} cannot be used as class labels",
                    cell
                ));
            }
            _ => labels.push(cell.clone()),
        }
    }
    labels.sort_by(|a, b| a.total_cmp(b));
    labels.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
    Ok(labels)
}

fn importances(model: &FittedModel, features: &[String]) -> Option<Vec<FeatureImportance>> {
    let values = model.feature_importances()?;
    let mut ranked: Vec<FeatureImportance> = features
        .iter()
        .zip(values)
        .map(|(feature, importance)| FeatureImportance {
            feature: feature.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    Some(ranked)
}
