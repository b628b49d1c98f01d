// file: src/stages/scale.rs
// description: standardization and min-max normalization of numeric columns
// reference: population standard deviation (ddof = 0), constant columns map to zero

use crate::dataset::{Cell, Dataset};
use crate::error::{PipelineError, Result};
use crate::stages::StageOutput;
use crate::store::RecordUpdate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerKind {
    Standardize,
    Normalize,
}

impl ScalerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScalerKind::Standardize => "standardize",
            ScalerKind::Normalize => "normalize",
        }
    }
}

impl FromStr for ScalerKind {
    type Err = PipelineError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "standardize" | "standardization" | "standard" => Ok(ScalerKind::Standardize),
            "normalize" | "normalization" | "minmax" => Ok(ScalerKind::Normalize),
            _ => Err(PipelineError::InvalidStrategy {
                kind: "scaler",
                value: tag.to_string(),
                expected: "standardize, normalize".to_string(),
            }),
        }
    }
}

impl fmt::Display for ScalerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScaleRequest {
    pub scaler: String,
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreprocessingInfo {
    pub scaler: ScalerKind,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScaleReport {
    #[serde(flatten)]
    pub info: PreprocessingInfo,
    pub message: String,
}

pub fn run(dataset: &Dataset, request: &ScaleRequest) -> Result<StageOutput<ScaleReport>> {
    let scaler: ScalerKind = request.scaler.parse()?;

    let columns = if request.columns.is_empty() {
        let numeric = dataset.numeric_column_names();
        if numeric.is_empty() {
            return Err(PipelineError::NonNumericColumn(dataset.column_names()));
        }
        numeric
    } else {
        dataset.resolve_columns(&request.columns)?
    };

    let offenders: Vec<String> = columns
        .iter()
        .filter(|name| dataset.column(name).is_some_and(|c| !c.is_numeric()))
        .cloned()
        .collect();
    if !offenders.is_empty() {
        return Err(PipelineError::NonNumericColumn(offenders));
    }

    let mut scaled = dataset.clone();
    for name in &columns {
        if let Some(column) = scaled.column_mut(name) {
            let transform = Transform::fit(scaler, name, &column.numeric_values())?;
            for cell in column.cells.iter_mut() {
                if let Cell::Number(value) = cell {
                    *value = transform.apply(*value);
                }
            }
        }
    }

    let message = format!("Data preprocessed using {} on {} column(s)", scaler, columns.len());
    info!("{}", message);

    let info = PreprocessingInfo { scaler, columns };
    Ok(StageOutput {
        report: ScaleReport {
            info: info.clone(),
            message,
        },
        update: RecordUpdate {
            dataset: Some(scaled),
            preprocessing: Some(info),
            ..RecordUpdate::default()
        },
    })
}

/// `(x - offset) / scale`, fitted on the non-missing values of one column.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Transform {
    offset: f64,
    scale: f64,
}

impl Transform {
    fn fit(kind: ScalerKind, column: &str, values: &[f64]) -> Result<Self> {
        let failed = |message: &str| PipelineError::TransformError {
            column: column.to_string(),
            message: message.to_string(),
        };

        if values.is_empty() {
            return Err(failed("column has no values to fit"));
        }
        if values.iter().any(|v| v.is_infinite()) {
            return Err(failed("column contains infinite values"));
        }

        let n = values.len() as f64;
        let (offset, spread) = match kind {
            ScalerKind::Standardize => {
                let mean = values.iter().sum::<f64>() / n;
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                (mean, variance.sqrt())
            }
            ScalerKind::Normalize => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                (min, max - min)
            }
        };

        if !offset.is_finite() || !spread.is_finite() {
            return Err(failed("column statistics overflowed"));
        }

        Ok(Self {
            offset,
            scale: if spread > 0.0 { spread } else { 1.0 },
        })
    }

    fn apply(&self, value: f64) -> f64 {
        (value - self.offset) / self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;
    use pretty_assertions::assert_eq;

    fn dataset() -> Dataset {
        let raw = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        Dataset::from_columns(vec![
            Column::from_raw("a".to_string(), &raw(&["1", "2", "3", "4", ""]), 20),
            Column::from_raw("b".to_string(), &raw(&["5", "5", "5", "5", "5"]), 20),
            Column::from_raw("c".to_string(), &raw(&["x", "y", "x", "y", "x"]), 20),
        ])
        .unwrap()
    }

    fn request(scaler: &str, columns: &[&str]) -> ScaleRequest {
        ScaleRequest {
            scaler: scaler.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_standardize_has_zero_mean_unit_variance() {
        let output = run(&dataset(), &request("standardize", &["a"])).unwrap();
        let values = output.update.dataset.unwrap().column("a").unwrap().numeric_values();

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 1e-9);
        assert!((variance - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_cells_are_preserved() {
        let output = run(&dataset(), &request("normalize", &["a"])).unwrap();
        let scaled = output.update.dataset.unwrap();
        let cells = &scaled.column("a").unwrap().cells;
        assert_eq!(cells[0], Cell::Number(0.0));
        assert_eq!(cells[3], Cell::Number(1.0));
        assert_eq!(cells[4], Cell::Missing);
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        for scaler in ["standardize", "minmax"] {
            let output = run(&dataset(), &request(scaler, &["b"])).unwrap();
            let values = output.update.dataset.unwrap().column("b").unwrap().numeric_values();
            assert!(values.iter().all(|v| *v == 0.0));
        }
    }

    #[test]
    fn test_empty_selection_means_all_numeric() {
        let output = run(&dataset(), &request("standardization", &[])).unwrap();
        assert_eq!(output.report.info.columns, vec!["a", "b"]);
        assert_eq!(output.report.info.scaler, ScalerKind::Standardize);
    }

    #[test]
    fn test_non_numeric_column_rejected() {
        let err = run(&dataset(), &request("normalize", &["a", "c"])).unwrap_err();
        match err {
            PipelineError::NonNumericColumn(columns) => assert_eq!(columns, vec!["c"]),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_infinite_value_is_transform_error() {
        let data = Dataset::from_columns(vec![Column::from_raw(
            "x".to_string(),
            &["1".to_string(), "inf".to_string()],
            20,
        )])
        .unwrap();
        let err = run(&data, &request("standardize", &[])).unwrap_err();
        assert!(matches!(err, PipelineError::TransformError { .. }));
    }

    #[test]
    fn test_unknown_scaler() {
        let err = run(&dataset(), &request("robust", &[])).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidStrategy { .. }));
    }
}
