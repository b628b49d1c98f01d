// file: src/utils/validation.rs
// description: request validation helpers shared by stages and the cli
// reference: input validation patterns

use crate::dataset::DataFormat;
use crate::error::{PipelineError, Result};
use std::io;
use std::path::Path;

pub const MIN_SPLIT_RATIO: f64 = 0.1;
pub const MAX_SPLIT_RATIO: f64 = 0.9;

pub struct Validator;

impl Validator {
    pub fn validate_split_ratio(ratio: f64) -> Result<()> {
        if !(MIN_SPLIT_RATIO..=MAX_SPLIT_RATIO).contains(&ratio) {
            return Err(PipelineError::InvalidSplitRatio(ratio));
        }
        Ok(())
    }

    /// Checks an input path before its bytes are read for ingest.
    pub fn validate_input_file(path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(PipelineError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Input file not found: {}", path.display()),
            )));
        }

        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        DataFormat::from_filename(filename)?;
        Ok(())
    }

    /// Splits a comma-separated column list, dropping blanks.
    pub fn parse_column_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_validate_split_ratio() {
        assert!(Validator::validate_split_ratio(0.8).is_ok());
        assert!(Validator::validate_split_ratio(0.1).is_ok());
        assert!(Validator::validate_split_ratio(0.9).is_ok());
        assert!(Validator::validate_split_ratio(0.05).is_err());
        assert!(Validator::validate_split_ratio(1.0).is_err());
        assert!(Validator::validate_split_ratio(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_input_file() {
        let temp = TempDir::new().unwrap();
        let csv = temp.path().join("data.csv");
        fs::write(&csv, "a\n1\n").unwrap();
        let notes = temp.path().join("notes.txt");
        fs::write(&notes, "hello").unwrap();

        assert!(Validator::validate_input_file(&csv).is_ok());
        assert!(matches!(
            Validator::validate_input_file(&notes),
            Err(PipelineError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            Validator::validate_input_file(&temp.path().join("missing.csv")),
            Err(PipelineError::Io(_))
        ));
    }

    #[test]
    fn test_parse_column_list() {
        assert_eq!(
            Validator::parse_column_list(" age, income ,,city "),
            vec!["age", "income", "city"]
        );
        assert!(Validator::parse_column_list("").is_empty());
    }
}
