// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Pipeline {0} not found")]
    NotFound(String),

    #[error("Unsupported file format for {filename}. Please upload CSV, TSV or Excel files")]
    UnsupportedFormat { filename: String },

    #[error("Failed to parse {filename}: {message}")]
    MalformedInput { filename: String, message: String },

    #[error("Dataset {0} contains no rows")]
    EmptyDataset(String),

    #[error("Upload limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Unknown column(s) {missing:?}. Available columns: {available:?}")]
    UnknownColumn {
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("Column(s) {0:?} are not numeric")]
    NonNumericColumn(Vec<String>),

    #[error("Invalid {kind} '{value}'. Expected one of: {expected}")]
    InvalidStrategy {
        kind: &'static str,
        value: String,
        expected: String,
    },

    #[error("Split ratio {0} is outside [0.1, 0.9]")]
    InvalidSplitRatio(f64),

    #[error("No numeric feature columns remain after removing target '{0}'")]
    NoNumericFeatures(String),

    #[error("Need at least {required} rows to split, found {found}")]
    InsufficientRows { required: usize, found: usize },

    #[error("Data must be split before training pipeline {0}")]
    NoSplitYet(String),

    #[error("Training partition of pipeline {0} is empty")]
    EmptyTrainingSet(String),

    #[error("Training {model} failed: {message}")]
    TrainingFailed { model: String, message: String },

    #[error("Scaling column '{column}' failed: {message}")]
    TransformError { column: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PipelineError {
    /// `true` for the failures an API layer reports as "not found"; every
    /// other variant is a bad request.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PipelineError::NotFound(_))
    }

    pub fn training(model: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::TrainingFailed {
            model: model.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(PipelineError::NotFound("abc".to_string()).is_not_found());
        assert!(!PipelineError::NoSplitYet("abc".to_string()).is_not_found());
        assert!(!PipelineError::InvalidSplitRatio(0.95).is_not_found());
    }

    #[test]
    fn test_unknown_column_message_lists_available() {
        let err = PipelineError::UnknownColumn {
            missing: vec!["ghost".to_string()],
            available: vec!["age".to_string(), "income".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("ghost"));
        assert!(message.contains("income"));
    }
}
