// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{PipelineError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub ingest: IngestConfig,
    pub split: SplitConfig,
    pub training: TrainingConfig,
    pub reporting: ReportingConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    pub max_upload_bytes: usize,
    pub max_rows: usize,
    pub max_columns: usize,
    /// Non-numeric columns with at most this many distinct values are tagged categorical.
    pub categorical_max_unique: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SplitConfig {
    pub random_seed: u64,
    pub min_rows: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrainingConfig {
    pub random_seed: u64,
    pub n_estimators: usize,
    #[serde(default)]
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub logistic_max_iter: usize,
    pub logistic_learning_rate: f64,
    pub logistic_c: f64,
    pub ridge_alpha: f64,
    pub lasso_alpha: f64,
    pub lasso_max_iter: usize,
    pub lasso_tolerance: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportingConfig {
    pub charts_enabled: bool,
    pub top_features: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub parallel_workers: usize,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TABFLOW")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            ingest: IngestConfig {
                max_upload_bytes: 50 * 1024 * 1024,
                max_rows: 1_000_000,
                max_columns: 1_000,
                categorical_max_unique: 20,
            },
            split: SplitConfig {
                random_seed: 42,
                min_rows: 4,
            },
            training: TrainingConfig {
                random_seed: 42,
                n_estimators: 100,
                max_depth: None,
                min_samples_split: 2,
                logistic_max_iter: 1000,
                logistic_learning_rate: 0.5,
                logistic_c: 1.0,
                ridge_alpha: 1.0,
                lasso_alpha: 1.0,
                lasso_max_iter: 1000,
                lasso_tolerance: 1e-4,
            },
            reporting: ReportingConfig {
                charts_enabled: true,
                top_features: 10,
            },
            pipeline: PipelineConfig {
                parallel_workers: 4,
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.parallel_workers == 0 {
            return Err(PipelineError::Config(
                "parallel_workers must be greater than 0".to_string(),
            ));
        }

        if self.split.min_rows < 4 {
            return Err(PipelineError::Config(
                "split.min_rows must be at least 4 to leave rows on both sides".to_string(),
            ));
        }

        if self.training.n_estimators == 0 {
            return Err(PipelineError::Config(
                "training.n_estimators must be greater than 0".to_string(),
            ));
        }

        if self.training.min_samples_split < 2 {
            return Err(PipelineError::Config(
                "training.min_samples_split must be at least 2".to_string(),
            ));
        }

        if self.training.logistic_c <= 0.0 || self.training.logistic_learning_rate <= 0.0 {
            return Err(PipelineError::Config(
                "logistic_c and logistic_learning_rate must be positive".to_string(),
            ));
        }

        if self.training.ridge_alpha < 0.0 || self.training.lasso_alpha < 0.0 {
            return Err(PipelineError::Config(
                "regularization strengths cannot be negative".to_string(),
            ));
        }

        if self.ingest.max_upload_bytes == 0 || self.ingest.max_rows == 0 {
            return Err(PipelineError::Config(
                "ingest limits must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
