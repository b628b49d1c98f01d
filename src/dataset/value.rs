// file: src/dataset/value.rs
// description: typed cell values, column type tags and missing-value detection
// reference: pandas-style NA token handling for delimited text

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

lazy_static! {
    static ref MISSING_TOKENS: HashSet<&'static str> = [
        "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "#N/A",
        "#NA", "<NA>",
    ]
    .into_iter()
    .collect();
}

pub fn is_missing_token(raw: &str) -> bool {
    MISSING_TOKENS.contains(raw.trim())
}

/// A single dataset value. Serializes as JSON `null`, a number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Missing,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if is_missing_token(trimmed) {
            return Cell::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if !value.is_nan() => Cell::Number(value),
            _ => Cell::Text(trimmed.to_string()),
        }
    }

    pub fn text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if is_missing_token(trimmed) {
            Cell::Missing
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Display form used for class labels and text conversion.
    pub fn label(&self) -> String {
        match self {
            Cell::Missing => String::new(),
            Cell::Number(value) => format_number(*value),
            Cell::Text(text) => text.clone(),
        }
    }

    /// Missing < numbers < text; numbers by value, text lexicographically.
    pub fn total_cmp(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Missing, Cell::Missing) => Ordering::Equal,
            (Cell::Missing, _) => Ordering::Less,
            (_, Cell::Missing) => Ordering::Greater,
            (Cell::Number(a), Cell::Number(b)) => a.total_cmp(b),
            (Cell::Number(_), Cell::Text(_)) => Ordering::Less,
            (Cell::Text(_), Cell::Number(_)) => Ordering::Greater,
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => write!(f, "NaN"),
            other => write!(f, "{}", other.label()),
        }
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numeric,
    Text,
    Categorical,
}

impl ColumnType {
    pub fn is_numeric(self) -> bool {
        self == ColumnType::Numeric
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Text => "text",
            ColumnType::Categorical => "categorical",
        }
    }

    /// Tag for a column already known to hold only text and missing cells.
    pub fn infer_non_numeric(cells: &[Cell], categorical_max_unique: usize) -> Self {
        let values: Vec<&str> = cells
            .iter()
            .filter_map(|cell| match cell {
                Cell::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();

        if !values.is_empty()
            && values
                .iter()
                .all(|v| v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false"))
        {
            return ColumnType::Categorical;
        }

        let distinct: HashSet<&str> = values.iter().copied().collect();
        if !distinct.is_empty()
            && distinct.len() <= categorical_max_unique
            && distinct.len() * 2 <= values.len()
        {
            ColumnType::Categorical
        } else {
            ColumnType::Text
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
