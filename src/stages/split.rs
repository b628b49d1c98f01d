// file: src/stages/split.rs
// description: seeded shuffle and train/test partition of numeric features
// reference: shuffled index split with a fixed random state

use crate::config::SplitConfig;
use crate::dataset::{Cell, Dataset};
use crate::error::{PipelineError, Result};
use crate::stages::StageOutput;
use crate::store::RecordUpdate;
use crate::utils::Validator;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

fn default_ratio() -> f64 {
    0.8
}

#[derive(Debug, Clone, Deserialize)]
pub struct SplitRequest {
    #[serde(default = "default_ratio")]
    pub ratio: f64,
    pub target_column: String,
}

impl SplitRequest {
    pub fn new(target_column: impl Into<String>, ratio: f64) -> Self {
        Self {
            ratio,
            target_column: target_column.into(),
        }
    }
}

/// Materialized partitions. Missing feature cells are carried as NaN so
/// training can reject them with a precise message.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitData {
    pub x_train: Vec<Vec<f64>>,
    pub x_test: Vec<Vec<f64>>,
    pub y_train: Vec<Cell>,
    pub y_test: Vec<Cell>,
    pub feature_columns: Vec<String>,
    pub target_column: String,
    pub ratio: f64,
}

impl SplitData {
    pub fn train_size(&self) -> usize {
        self.x_train.len()
    }

    pub fn test_size(&self) -> usize {
        self.x_test.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub train_size: usize,
    pub test_size: usize,
    pub features: Vec<String>,
    pub target_column: String,
    pub ratio: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped_columns: Vec<String>,
    pub message: String,
}

pub fn run(
    dataset: &Dataset,
    request: &SplitRequest,
    config: &SplitConfig,
) -> Result<StageOutput<SplitReport>> {
    Validator::validate_split_ratio(request.ratio)?;
    let target_name = request.target_column.as_str();
    let target = dataset
        .column(target_name)
        .ok_or_else(|| PipelineError::UnknownColumn {
            missing: vec![target_name.to_string()],
            available: dataset.column_names(),
        })?;

    let (features, dropped): (Vec<_>, Vec<_>) = dataset
        .columns()
        .iter()
        .filter(|c| c.name != target_name)
        .partition(|c| c.is_numeric());
    let dropped_columns: Vec<String> = dropped.iter().map(|c| c.name.clone()).collect();
    if !dropped_columns.is_empty() {
        debug!("Dropping non-numeric features {:?}", dropped_columns);
    }
    if features.is_empty() {
        return Err(PipelineError::NoNumericFeatures(target_name.to_string()));
    }

    let mut rows: Vec<usize> = (0..dataset.row_count())
        .filter(|&row| !target.cells[row].is_missing())
        .collect();
    let excluded = dataset.row_count() - rows.len();
    if excluded > 0 {
        debug!("Excluding {} row(s) with a missing target", excluded);
    }
    if rows.len() < config.min_rows {
        return Err(PipelineError::InsufficientRows {
            required: config.min_rows,
            found: rows.len(),
        });
    }

    let mut rng = StdRng::seed_from_u64(config.random_seed);
    rows.shuffle(&mut rng);

    let n = rows.len();
    let train_size = ((request.ratio * n as f64).floor() as usize).clamp(1, n - 1);
    let (train_rows, test_rows) = rows.split_at(train_size);

    let matrix = |rows: &[usize]| -> Vec<Vec<f64>> {
        rows.iter()
            .map(|&row| {
                features
                    .iter()
                    .map(|c| c.cells[row].as_number().unwrap_or(f64::NAN))
                    .collect()
            })
            .collect()
    };
    let targets =
        |rows: &[usize]| -> Vec<Cell> { rows.iter().map(|&row| target.cells[row].clone()).collect() };

    let data = SplitData {
        x_train: matrix(train_rows),
        x_test: matrix(test_rows),
        y_train: targets(train_rows),
        y_test: targets(test_rows),
        feature_columns: features.iter().map(|c| c.name.clone()).collect(),
        target_column: target_name.to_string(),
        ratio: request.ratio,
    };

    let message = format!(
        "Data split: {} train, {} test samples",
        data.train_size(),
        data.test_size()
    );
    info!("{}", message);

    Ok(StageOutput {
        report: SplitReport {
            train_size: data.train_size(),
            test_size: data.test_size(),
            features: data.feature_columns.clone(),
            target_column: data.target_column.clone(),
            ratio: data.ratio,
            dropped_columns,
            message,
        },
        update: RecordUpdate {
            split: Some(data),
            ..RecordUpdate::default()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dataset::Column;
    use pretty_assertions::assert_eq;

    fn dataset(rows: usize) -> Dataset {
        let x: Vec<String> = (0..rows).map(|i| i.to_string()).collect();
        let label: Vec<String> = (0..rows).map(|i| (i % 2).to_string()).collect();
        let name: Vec<String> = (0..rows).map(|i| format!("row{}", i)).collect();
        Dataset::from_columns(vec![
            Column::from_raw("x".to_string(), &x, 20),
            Column::from_raw("name".to_string(), &name, 20),
            Column::from_raw("label".to_string(), &label, 20),
        ])
        .unwrap()
    }

    fn config() -> SplitConfig {
        Config::default_config().split
    }

    #[test]
    fn test_split_sizes() {
        let output = run(&dataset(100), &SplitRequest::new("label", 0.8), &config()).unwrap();
        assert_eq!(output.report.train_size, 80);
        assert_eq!(output.report.test_size, 20);
        assert_eq!(output.report.features, vec!["x"]);
        assert_eq!(output.report.dropped_columns, vec!["name"]);

        let data = output.update.split.unwrap();
        assert_eq!(data.x_train.len() + data.x_test.len(), 100);
        assert_eq!(data.y_train.len(), 80);
    }

    #[test]
    fn test_split_is_a_permutation() {
        let data = run(&dataset(50), &SplitRequest::new("label", 0.5), &config())
            .unwrap()
            .update
            .split
            .unwrap();
        let mut seen: Vec<f64> = data.x_train.iter().chain(&data.x_test).map(|r| r[0]).collect();
        seen.sort_by(f64::total_cmp);
        assert_eq!(seen, (0..50).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_reproducible() {
        let first = run(&dataset(30), &SplitRequest::new("label", 0.7), &config()).unwrap();
        let second = run(&dataset(30), &SplitRequest::new("label", 0.7), &config()).unwrap();
        assert_eq!(first.update.split, second.update.split);
    }

    #[test]
    fn test_insufficient_rows() {
        let err = run(&dataset(3), &SplitRequest::new("label", 0.8), &config()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientRows {
                required: 4,
                found: 3
            }
        ));
    }

    #[test]
    fn test_missing_targets_are_excluded() {
        let data = Dataset::from_columns(vec![
            Column::from_raw(
                "x".to_string(),
                &["1", "2", "3", "4", "5"].map(String::from),
                20,
            ),
            Column::from_raw(
                "y".to_string(),
                &["1", "", "0", "1", "0"].map(String::from),
                20,
            ),
        ])
        .unwrap();
        let output = run(&data, &SplitRequest::new("y", 0.5), &config()).unwrap();
        assert_eq!(output.report.train_size + output.report.test_size, 4);
    }

    #[test]
    fn test_small_ratio_keeps_one_training_row() {
        let output = run(&dataset(5), &SplitRequest::new("label", 0.1), &config()).unwrap();
        assert_eq!(output.report.train_size, 1);
        assert_eq!(output.report.test_size, 4);
    }

    #[test]
    fn test_precondition_errors() {
        let data = dataset(10);
        assert!(matches!(
            run(&data, &SplitRequest::new("ghost", 0.8), &config()),
            Err(PipelineError::UnknownColumn { .. })
        ));
        assert!(matches!(
            run(&data, &SplitRequest::new("label", 0.95), &config()),
            Err(PipelineError::InvalidSplitRatio(_))
        ));

        let only_target = Dataset::from_columns(vec![Column::from_raw(
            "label".to_string(),
            &["1", "0", "1", "0"].map(String::from),
            20,
        )])
        .unwrap();
        assert!(matches!(
            run(&only_target, &SplitRequest::new("label", 0.8), &config()),
            Err(PipelineError::NoNumericFeatures(_))
        ));
    }
}
