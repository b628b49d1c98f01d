// file: src/dataset/reader.rs
// description: decodes uploaded delimited-text and spreadsheet payloads into datasets
// reference: https://docs.rs/csv, https://docs.rs/calamine

use crate::config::IngestConfig;
use crate::dataset::table::{Column, Dataset};
use crate::dataset::value::Cell;
use crate::error::{PipelineError, Result};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Delimited(u8),
    Spreadsheet,
}

impl DataFormat {
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(DataFormat::Delimited(b',')),
            Some("tsv") => Ok(DataFormat::Delimited(b'\t')),
            Some("xlsx") | Some("xls") | Some("xlsm") | Some("ods") => Ok(DataFormat::Spreadsheet),
            _ => Err(PipelineError::UnsupportedFormat {
                filename: filename.to_string(),
            }),
        }
    }
}

pub struct DatasetReader<'a> {
    config: &'a IngestConfig,
}

impl<'a> DatasetReader<'a> {
    pub fn new(config: &'a IngestConfig) -> Self {
        Self { config }
    }

    pub fn read(&self, bytes: &[u8], filename: &str) -> Result<Dataset> {
        let format = DataFormat::from_filename(filename)?;

        if bytes.len() > self.config.max_upload_bytes {
            return Err(PipelineError::LimitExceeded(format!(
                "{} is {} bytes, maximum is {}",
                filename,
                bytes.len(),
                self.config.max_upload_bytes
            )));
        }

        let (headers, columns) = match format {
            DataFormat::Delimited(delimiter) => self.read_delimited(bytes, filename, delimiter)?,
            DataFormat::Spreadsheet => self.read_spreadsheet(bytes, filename)?,
        };

        debug!(
            "Decoded {} with {} columns ({:?})",
            filename,
            headers.len(),
            format
        );

        let dataset = Dataset::from_columns(columns).map_err(|message| {
            PipelineError::MalformedInput {
                filename: filename.to_string(),
                message,
            }
        })?;

        if dataset.row_count() == 0 {
            return Err(PipelineError::EmptyDataset(filename.to_string()));
        }

        Ok(dataset)
    }

    fn read_delimited(
        &self,
        bytes: &[u8],
        filename: &str,
        delimiter: u8,
    ) -> Result<(Vec<String>, Vec<Column>)> {
        let malformed = |message: String| PipelineError::MalformedInput {
            filename: filename.to_string(),
            message,
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| malformed(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        if headers.is_empty() {
            return Err(malformed("no columns to parse".to_string()));
        }

        let headers = repair_headers(headers);
        self.check_columns(headers.len(), filename)?;

        let mut raw_columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| malformed(e.to_string()))?;
            self.check_rows(index + 1, filename)?;
            for (column, field) in raw_columns.iter_mut().zip(record.iter()) {
                column.push(field.to_string());
            }
        }

        let columns = headers
            .iter()
            .zip(raw_columns.iter())
            .map(|(name, raw)| {
                Column::from_raw(name.clone(), raw, self.config.categorical_max_unique)
            })
            .collect();

        Ok((headers, columns))
    }

    fn read_spreadsheet(&self, bytes: &[u8], filename: &str) -> Result<(Vec<String>, Vec<Column>)> {
        let malformed = |message: String| PipelineError::MalformedInput {
            filename: filename.to_string(),
            message,
        };

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| malformed(e.to_string()))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| malformed("workbook has no worksheets".to_string()))?
            .map_err(|e| malformed(e.to_string()))?;

        let mut rows = range.rows();
        let header_row = rows
            .next()
            .ok_or_else(|| malformed("no columns to parse".to_string()))?;

        let headers = repair_headers(
            header_row
                .iter()
                .map(|cell| match cell {
                    Data::Empty => String::new(),
                    other => sheet_cell(other).label(),
                })
                .collect(),
        );
        self.check_columns(headers.len(), filename)?;

        let mut typed_columns: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
        for (index, row) in rows.enumerate() {
            self.check_rows(index + 1, filename)?;
            for (position, column) in typed_columns.iter_mut().enumerate() {
                column.push(row.get(position).map(sheet_cell).unwrap_or(Cell::Missing));
            }
        }

        let columns = headers
            .iter()
            .zip(typed_columns)
            .map(|(name, cells)| {
                Column::from_cells(name.clone(), cells, self.config.categorical_max_unique)
            })
            .collect();

        Ok((headers, columns))
    }

    fn check_columns(&self, count: usize, filename: &str) -> Result<()> {
        if count > self.config.max_columns {
            return Err(PipelineError::LimitExceeded(format!(
                "{} has {} columns, maximum is {}",
                filename, count, self.config.max_columns
            )));
        }
        Ok(())
    }

    fn check_rows(&self, count: usize, filename: &str) -> Result<()> {
        if count > self.config.max_rows {
            return Err(PipelineError::LimitExceeded(format!(
                "{} has more than {} rows",
                filename, self.config.max_rows
            )));
        }
        Ok(())
    }
}

fn sheet_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Missing,
        Data::Int(value) => Cell::Number(*value as f64),
        Data::Float(value) if value.is_nan() => Cell::Missing,
        Data::Float(value) => Cell::Number(*value),
        Data::String(text) => Cell::text(text),
        Data::Bool(flag) => Cell::Text(if *flag { "True" } else { "False" }.to_string()),
        other => Cell::text(&other.to_string()),
    }
}

/// Blank headers become `Unnamed: <i>`; repeated names get `.1`, `.2`, ... suffixes.
fn repair_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(index, header)| {
            let base = if header.trim().is_empty() {
                format!("Unnamed: {}", index)
            } else {
                header.trim().to_string()
            };

            let mut name = base.clone();
            let mut suffix = 1;
            while seen.contains(&name) {
                name = format!("{}.{}", base, suffix);
                suffix += 1;
            }
            seen.insert(name.clone());
            name
        })
        .collect()
}
