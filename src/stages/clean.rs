// file: src/stages/clean.rs
// description: missing-value handling strategies applied to the working dataset
// reference: mean/median/mode imputation, forward fill with backward fallback, row and column drops

use crate::dataset::{Cell, Column, Dataset};
use crate::error::{PipelineError, Result};
use crate::stages::StageOutput;
use crate::store::RecordUpdate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

const UNKNOWN_FILL: &str = "Unknown";
const MISSING_FILL: &str = "Missing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanStrategy {
    DropRows,
    DropColumns,
    Mean,
    Median,
    Mode,
    ForwardFill,
    Constant,
}

impl CleanStrategy {
    pub const ALL: [CleanStrategy; 7] = [
        CleanStrategy::DropRows,
        CleanStrategy::DropColumns,
        CleanStrategy::Mean,
        CleanStrategy::Median,
        CleanStrategy::Mode,
        CleanStrategy::ForwardFill,
        CleanStrategy::Constant,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CleanStrategy::DropRows => "drop_rows",
            CleanStrategy::DropColumns => "drop_columns",
            CleanStrategy::Mean => "mean",
            CleanStrategy::Median => "median",
            CleanStrategy::Mode => "mode",
            CleanStrategy::ForwardFill => "forward_fill",
            CleanStrategy::Constant => "constant",
        }
    }
}

impl FromStr for CleanStrategy {
    type Err = PipelineError;

    fn from_str(tag: &str) -> Result<Self> {
        let normalized = tag.trim().to_ascii_lowercase();
        CleanStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| PipelineError::InvalidStrategy {
                kind: "cleaning strategy",
                value: tag.to_string(),
                expected: CleanStrategy::ALL
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

impl fmt::Display for CleanStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CleanRequest {
    pub strategy: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub fill_value: Option<String>,
}

/// Metadata of the last clean applied to a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningInfo {
    pub strategy: CleanStrategy,
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_value: Option<String>,
    pub missing_before: BTreeMap<String, usize>,
    pub missing_after: BTreeMap<String, usize>,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_after: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanReport {
    #[serde(flatten)]
    pub info: CleaningInfo,
    pub message: String,
}

pub fn run(dataset: &Dataset, request: &CleanRequest) -> Result<StageOutput<CleanReport>> {
    let strategy: CleanStrategy = request.strategy.parse()?;
    let columns = dataset.resolve_columns(&request.columns)?;

    let missing_before = dataset.missing_counts();
    let rows_before = dataset.row_count();
    let mut cleaned = dataset.clone();

    let total_before: usize = columns.iter().map(|c| missing_before[c]).sum();
    if total_before == 0 {
        debug!("Nothing to clean in {:?}", columns);
    } else {
        apply(&mut cleaned, strategy, &columns, request.fill_value.as_deref());
    }

    let missing_after = cleaned.missing_counts();
    let total_after: usize = missing_after.values().sum();
    let info = CleaningInfo {
        strategy,
        columns,
        fill_value: request.fill_value.clone(),
        missing_before,
        missing_after,
        rows_before,
        rows_after: cleaned.row_count(),
        columns_after: cleaned.column_names(),
    };

    let message = format!(
        "Applied {} to {} column(s): {} missing value(s) before, {} after, {} of {} rows kept",
        strategy,
        info.columns.len(),
        total_before,
        total_after,
        info.rows_after,
        info.rows_before
    );
    info!("{}", message);

    Ok(StageOutput {
        report: CleanReport {
            info: info.clone(),
            message,
        },
        update: RecordUpdate {
            dataset: Some(cleaned),
            cleaning: Some(info),
            ..RecordUpdate::default()
        },
    })
}

fn apply(dataset: &mut Dataset, strategy: CleanStrategy, columns: &[String], fill: Option<&str>) {
    match strategy {
        CleanStrategy::DropRows => {
            let keep: Vec<bool> = (0..dataset.row_count())
                .map(|row| {
                    columns.iter().all(|name| {
                        dataset
                            .column(name)
                            .is_some_and(|c| !c.cells[row].is_missing())
                    })
                })
                .collect();
            dataset.retain_rows(&keep);
        }
        CleanStrategy::DropColumns => {
            let doomed: Vec<String> = columns
                .iter()
                .filter(|name| dataset.column(name).is_some_and(Column::has_missing))
                .cloned()
                .collect();
            dataset.remove_columns(&doomed);
        }
        _ => {
            for name in columns {
                if let Some(column) = dataset.column_mut(name) {
                    fill_column(column, strategy, fill);
                }
            }
        }
    }
}

fn fill_column(column: &mut Column, strategy: CleanStrategy, literal: Option<&str>) {
    if !column.has_missing() {
        return;
    }

    let replacement = match strategy {
        CleanStrategy::Mean if column.is_numeric() => mean(&column.numeric_values()).map(Cell::Number),
        CleanStrategy::Median if column.is_numeric() => {
            median(&column.numeric_values()).map(Cell::Number)
        }
        CleanStrategy::Mean | CleanStrategy::Median => {
            Some(mode(&column.cells).unwrap_or_else(|| Cell::Text(UNKNOWN_FILL.to_string())))
        }
        CleanStrategy::Mode => Some(mode(&column.cells).unwrap_or_else(|| {
            if column.is_numeric() {
                Cell::Number(0.0)
            } else {
                Cell::Text(UNKNOWN_FILL.to_string())
            }
        })),
        CleanStrategy::Constant => Some(if column.is_numeric() {
            Cell::Number(
                literal
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .filter(|v| !v.is_nan())
                    .unwrap_or(0.0),
            )
        } else {
            Cell::Text(literal.unwrap_or(MISSING_FILL).to_string())
        }),
        CleanStrategy::ForwardFill => {
            forward_fill(&mut column.cells);
            None
        }
        CleanStrategy::DropRows | CleanStrategy::DropColumns => None,
    };

    if let Some(value) = replacement {
        for cell in column.cells.iter_mut().filter(|c| c.is_missing()) {
            *cell = value.clone();
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Most frequent non-missing value; ties go to the smallest.
fn mode(cells: &[Cell]) -> Option<Cell> {
    let mut present: Vec<&Cell> = cells.iter().filter(|c| !c.is_missing()).collect();
    present.sort_by(|a, b| a.total_cmp(b));

    let mut best: Option<(&Cell, usize)> = None;
    let mut run_start = 0;
    for i in 1..=present.len() {
        let run_ended = i == present.len() || present[i].total_cmp(present[run_start]).is_ne();
        if run_ended {
            let count = i - run_start;
            if best.is_none_or(|(_, top)| count > top) {
                best = Some((present[run_start], count));
            }
            run_start = i;
        }
    }
    best.map(|(cell, _)| cell.clone())
}

/// Carries the last value down; gaps before the first value take the next one.
fn forward_fill(cells: &mut [Cell]) {
    let mut last: Option<Cell> = None;
    for cell in cells.iter_mut() {
        if cell.is_missing() {
            if let Some(value) = &last {
                *cell = value.clone();
            }
        } else {
            last = Some(cell.clone());
        }
    }

    let mut next: Option<Cell> = None;
    for cell in cells.iter_mut().rev() {
        if cell.is_missing() {
            if let Some(value) = &next {
                *cell = value.clone();
            }
        } else {
            next = Some(cell.clone());
        }
    }
}
