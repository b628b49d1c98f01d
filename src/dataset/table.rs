// file: src/dataset/table.rs
// description: in-memory column store shared by every pipeline stage
// reference: column-oriented dataframe layout

use crate::dataset::value::{Cell, ColumnType};
use crate::error::{PipelineError, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
    pub cells: Vec<Cell>,
}

impl Column {
    /// Builds a column from raw text fields. The column is numeric only when
    /// every non-missing field parses as a number; otherwise the original
    /// text is kept verbatim.
    pub fn from_raw(name: String, raw: &[String], categorical_max_unique: usize) -> Self {
        let parsed: Vec<Cell> = raw.iter().map(|field| Cell::parse(field)).collect();
        if parsed.iter().all(|cell| !matches!(cell, Cell::Text(_))) {
            return Self {
                name,
                kind: ColumnType::Numeric,
                cells: parsed,
            };
        }

        let cells: Vec<Cell> = raw.iter().map(|field| Cell::text(field)).collect();
        let kind = ColumnType::infer_non_numeric(&cells, categorical_max_unique);
        Self { name, kind, cells }
    }

    /// Builds a column from already-typed cells (spreadsheet input). Mixed
    /// columns are coerced to text.
    pub fn from_cells(name: String, cells: Vec<Cell>, categorical_max_unique: usize) -> Self {
        if cells.iter().all(|cell| !matches!(cell, Cell::Text(_))) {
            return Self {
                name,
                kind: ColumnType::Numeric,
                cells,
            };
        }

        let cells: Vec<Cell> = cells
            .into_iter()
            .map(|cell| match cell {
                Cell::Number(value) => Cell::Text(Cell::Number(value).label()),
                other => other,
            })
            .collect();
        let kind = ColumnType::infer_non_numeric(&cells, categorical_max_unique);
        Self { name, kind, cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn is_numeric(&self) -> bool {
        self.kind.is_numeric()
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_missing()).count()
    }

    pub fn has_missing(&self) -> bool {
        self.cells.iter().any(Cell::is_missing)
    }

    /// Non-missing numeric values in row order.
    pub fn numeric_values(&self) -> Vec<f64> {
        self.cells.iter().filter_map(Cell::as_number).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    pub fn from_columns(columns: Vec<Column>) -> std::result::Result<Self, String> {
        let rows = columns.first().map(Column::len).unwrap_or(0);

        if let Some(ragged) = columns.iter().find(|column| column.len() != rows) {
            return Err(format!(
                "column '{}' has {} values, expected {}",
                ragged.name,
                ragged.len(),
                rows
            ));
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(format!("duplicate column name '{}'", column.name));
            }
        }

        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn numeric_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn column_types(&self) -> BTreeMap<String, ColumnType> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.kind))
            .collect()
    }

    pub fn missing_counts(&self) -> BTreeMap<String, usize> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.missing_count()))
            .collect()
    }

    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(Column::missing_count).sum()
    }

    /// First `n` rows keyed by column name.
    pub fn preview(&self, n: usize) -> Vec<BTreeMap<String, Cell>> {
        (0..self.rows.min(n))
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| (c.name.clone(), c.cells[row].clone()))
                    .collect()
            })
            .collect()
    }

    /// Resolves a user column selection; an empty selection means every column.
    pub fn resolve_columns(&self, selection: &[String]) -> Result<Vec<String>> {
        if selection.is_empty() {
            return Ok(self.column_names());
        }

        let missing: Vec<String> = selection
            .iter()
            .filter(|name| !self.contains(name))
            .cloned()
            .collect();

        if !missing.is_empty() {
            return Err(PipelineError::UnknownColumn {
                missing,
                available: self.column_names(),
            });
        }

        let mut seen = HashSet::new();
        Ok(selection
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect())
    }

    /// Keeps the rows whose flag is `true`. `keep` must have one flag per row.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.rows);
        for column in &mut self.columns {
            let mut flags = keep.iter();
            column.cells.retain(|_| *flags.next().unwrap_or(&false));
        }
        self.rows = keep.iter().filter(|flag| **flag).count();
    }

    pub fn remove_columns(&mut self, names: &[String]) {
        self.columns.retain(|c| !names.contains(&c.name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn sample() -> Dataset {
        Dataset::from_columns(vec![
            Column::from_raw("age".to_string(), &raw(&["31", "", "45"]), 20),
            Column::from_raw("city".to_string(), &raw(&["Oslo", "Lima", "NA"]), 20),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_raw_infers_numeric() {
        let column = Column::from_raw("x".to_string(), &raw(&["1", "2.5", ""]), 20);
        assert_eq!(column.kind, ColumnType::Numeric);
        assert_eq!(column.missing_count(), 1);
        assert_eq!(column.numeric_values(), vec![1.0, 2.5]);
    }

    #[test]
    fn test_from_raw_keeps_text_verbatim_in_mixed_column() {
        let column = Column::from_raw("code".to_string(), &raw(&["007", "abc"]), 20);
        assert_eq!(column.cells[0], Cell::Text("007".to_string()));
        assert!(!column.is_numeric());
    }

    #[test]
    fn test_from_columns_rejects_ragged_and_duplicates() {
        let ragged = Dataset::from_columns(vec![
            Column::from_raw("a".to_string(), &raw(&["1", "2"]), 20),
            Column::from_raw("b".to_string(), &raw(&["1"]), 20),
        ]);
        assert!(ragged.is_err());

        let duplicate = Dataset::from_columns(vec![
            Column::from_raw("a".to_string(), &raw(&["1"]), 20),
            Column::from_raw("a".to_string(), &raw(&["2"]), 20),
        ]);
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_resolve_columns() {
        let dataset = sample();
        assert_eq!(dataset.resolve_columns(&[]).unwrap(), vec!["age", "city"]);

        let err = dataset
            .resolve_columns(&["ghost".to_string()])
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownColumn { .. }));
    }

    #[test]
    fn test_retain_rows_keeps_columns_aligned() {
        let mut dataset = sample();
        dataset.retain_rows(&[true, false, true]);
        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.column("age").unwrap().cells.len(), 2);
        assert_eq!(dataset.column("city").unwrap().cells[1], Cell::Missing);
    }

    #[test]
    fn test_missing_counts_and_preview() {
        let dataset = sample();
        assert_eq!(dataset.missing_counts()["age"], 1);
        assert_eq!(dataset.total_missing(), 2);
        let preview = dataset.preview(5);
        assert_eq!(preview.len(), 3);
        assert_eq!(preview[0]["city"], Cell::Text("Oslo".to_string()));
    }
}
