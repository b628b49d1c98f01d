// file: src/models/mod.rs
// description: model type tags, task types and the fitted-model handle
// reference: estimator registry keyed by model tag

pub mod forest;
pub mod linear;
pub mod logistic;
pub mod tree;

pub use forest::RandomForest;
pub use linear::LinearModel;
pub use logistic::LogisticRegression;
pub use tree::{Criterion, DecisionTree, TreeParams};

use crate::config::TrainingConfig;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Classification,
    Regression,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Classification => f.write_str("classification"),
            TaskType::Regression => f.write_str("regression"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    LogisticRegression,
    DecisionTreeClassifier,
    RandomForestClassifier,
    LinearRegression,
    Ridge,
    Lasso,
    DecisionTreeRegressor,
    RandomForestRegressor,
}

impl ModelType {
    pub const ALL: [ModelType; 8] = [
        ModelType::LogisticRegression,
        ModelType::DecisionTreeClassifier,
        ModelType::RandomForestClassifier,
        ModelType::LinearRegression,
        ModelType::Ridge,
        ModelType::Lasso,
        ModelType::DecisionTreeRegressor,
        ModelType::RandomForestRegressor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelType::LogisticRegression => "logistic_regression",
            ModelType::DecisionTreeClassifier => "decision_tree_classifier",
            ModelType::RandomForestClassifier => "random_forest_classifier",
            ModelType::LinearRegression => "linear_regression",
            ModelType::Ridge => "ridge",
            ModelType::Lasso => "lasso",
            ModelType::DecisionTreeRegressor => "decision_tree_regressor",
            ModelType::RandomForestRegressor => "random_forest_regressor",
        }
    }

    /// Fixed mapping; the task is never chosen independently of the model.
    pub fn task_type(self) -> TaskType {
        match self {
            ModelType::LogisticRegression
            | ModelType::DecisionTreeClassifier
            | ModelType::RandomForestClassifier => TaskType::Classification,
            ModelType::LinearRegression
            | ModelType::Ridge
            | ModelType::Lasso
            | ModelType::DecisionTreeRegressor
            | ModelType::RandomForestRegressor => TaskType::Regression,
        }
    }

    fn expected() -> String {
        ModelType::ALL
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for ModelType {
    type Err = PipelineError;

    fn from_str(tag: &str) -> Result<Self> {
        let normalized = tag.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "logistic_regression" => Ok(ModelType::LogisticRegression),
            "decision_tree_classifier" | "decision_tree" => Ok(ModelType::DecisionTreeClassifier),
            "random_forest_classifier" | "random_forest" => Ok(ModelType::RandomForestClassifier),
            "linear_regression" => Ok(ModelType::LinearRegression),
            "ridge" => Ok(ModelType::Ridge),
            "lasso" => Ok(ModelType::Lasso),
            "decision_tree_regressor" => Ok(ModelType::DecisionTreeRegressor),
            "random_forest_regressor" => Ok(ModelType::RandomForestRegressor),
            _ => Err(PipelineError::InvalidStrategy {
                kind: "model type",
                value: tag.to_string(),
                expected: ModelType::expected(),
            }),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fitted estimator owned by a single pipeline record. Classification
/// models predict class indices encoded as `f64`.
#[derive(Debug, Clone)]
pub enum FittedModel {
    Logistic(LogisticRegression),
    Linear(LinearModel),
    Tree(DecisionTree),
    Forest(RandomForest),
}

impl FittedModel {
    /// `targets` holds class indices for classification and raw values for
    /// regression; `n_classes` is ignored for regression.
    pub fn fit(
        model_type: ModelType,
        features: &[Vec<f64>],
        targets: &[f64],
        n_classes: usize,
        config: &TrainingConfig,
    ) -> Result<Self> {
        let failed = |message: String| PipelineError::training(model_type.as_str(), message);

        if features.is_empty() {
            return Err(failed("training partition is empty".to_string()));
        }
        if features.len() != targets.len() {
            return Err(failed(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }
        if features.iter().flatten().any(|v| !v.is_finite()) {
            return Err(failed(
                "input contains NaN or infinite feature values; clean the dataset first"
                    .to_string(),
            ));
        }
        if targets.iter().any(|v| !v.is_finite()) {
            return Err(failed("target contains NaN or infinite values".to_string()));
        }

        let tree_params = TreeParams {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            max_features: None,
        };

        let model = match model_type {
            ModelType::LogisticRegression => FittedModel::Logistic(
                LogisticRegression::fit(
                    features,
                    targets,
                    n_classes,
                    config.logistic_c,
                    config.logistic_learning_rate,
                    config.logistic_max_iter,
                )
                .map_err(&failed)?,
            ),
            ModelType::LinearRegression => {
                FittedModel::Linear(LinearModel::fit_ols(features, targets).map_err(&failed)?)
            }
            ModelType::Ridge => FittedModel::Linear(
                LinearModel::fit_ridge(features, targets, config.ridge_alpha).map_err(&failed)?,
            ),
            ModelType::Lasso => FittedModel::Linear(
                LinearModel::fit_lasso(
                    features,
                    targets,
                    config.lasso_alpha,
                    config.lasso_max_iter,
                    config.lasso_tolerance,
                )
                .map_err(&failed)?,
            ),
            ModelType::DecisionTreeClassifier => FittedModel::Tree(
                DecisionTree::fit(
                    features,
                    targets,
                    Criterion::Gini { n_classes },
                    &tree_params,
                    config.random_seed,
                )
                .map_err(&failed)?,
            ),
            ModelType::DecisionTreeRegressor => FittedModel::Tree(
                DecisionTree::fit(
                    features,
                    targets,
                    Criterion::Mse,
                    &tree_params,
                    config.random_seed,
                )
                .map_err(&failed)?,
            ),
            ModelType::RandomForestClassifier => FittedModel::Forest(
                RandomForest::fit(
                    features,
                    targets,
                    Criterion::Gini { n_classes },
                    &tree_params,
                    config.n_estimators,
                    config.random_seed,
                )
                .map_err(&failed)?,
            ),
            ModelType::RandomForestRegressor => FittedModel::Forest(
                RandomForest::fit(
                    features,
                    targets,
                    Criterion::Mse,
                    &tree_params,
                    config.n_estimators,
                    config.random_seed,
                )
                .map_err(&failed)?,
            ),
        };

        Ok(model)
    }

    pub fn predict(&self, features: &[Vec<f64>]) -> Vec<f64> {
        match self {
            FittedModel::Logistic(model) => model.predict(features),
            FittedModel::Linear(model) => model.predict(features),
            FittedModel::Tree(model) => model.predict(features),
            FittedModel::Forest(model) => model.predict(features),
        }
    }

    /// Impurity-based importances; only tree ensembles and single trees expose them.
    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        match self {
            FittedModel::Tree(model) => Some(model.feature_importances().to_vec()),
            FittedModel::Forest(model) => Some(model.feature_importances()),
            FittedModel::Logistic(_) | FittedModel::Linear(_) => None,
        }
    }
}
