// file: src/metrics/mod.rs
// description: metric sets computed after training, with logged zero fallbacks
// reference: internal module structure

pub mod classification;
pub mod regression;

pub use classification::ClassificationMetrics;
pub use regression::RegressionMetrics;

use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModelMetrics {
    Classification(ClassificationMetrics),
    Regression(RegressionMetrics),
}

impl ModelMetrics {
    /// Headline test score: accuracy for classifiers, R² for regressors.
    pub fn test_score(&self) -> f64 {
        match self {
            ModelMetrics::Classification(m) => m.test_accuracy,
            ModelMetrics::Regression(m) => m.test_r2,
        }
    }

    pub fn train_score(&self) -> f64 {
        match self {
            ModelMetrics::Classification(m) => m.train_accuracy,
            ModelMetrics::Regression(m) => m.train_r2,
        }
    }

    pub fn score_name(&self) -> &'static str {
        match self {
            ModelMetrics::Classification(_) => "accuracy",
            ModelMetrics::Regression(_) => "R²",
        }
    }

    /// Named scalar values in display order.
    pub fn scalars(&self) -> Vec<(&'static str, f64)> {
        match self {
            ModelMetrics::Classification(m) => vec![
                ("train_accuracy", m.train_accuracy),
                ("test_accuracy", m.test_accuracy),
                ("precision", m.precision),
                ("recall", m.recall),
                ("f1_score", m.f1_score),
            ],
            ModelMetrics::Regression(m) => vec![
                ("train_r2", m.train_r2),
                ("test_r2", m.test_r2),
                ("mae", m.mae),
                ("mse", m.mse),
                ("rmse", m.rmse),
            ],
        }
    }
}

fn or_zero(name: &str, value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => {
            warn!("Metric {} could not be computed, reporting 0", name);
            0.0
        }
    }
}

/// Class indices in, labels are the display names of those indices.
pub fn evaluate_classification(
    train_truth: &[usize],
    train_predicted: &[usize],
    test_truth: &[usize],
    test_predicted: &[usize],
    class_names: &[String],
) -> ClassificationMetrics {
    let scores = classification::weighted_scores(test_truth, test_predicted);
    let observed = classification::observed_labels(test_truth, test_predicted);

    ClassificationMetrics {
        train_accuracy: or_zero(
            "train_accuracy",
            classification::accuracy(train_truth, train_predicted),
        ),
        test_accuracy: or_zero(
            "test_accuracy",
            classification::accuracy(test_truth, test_predicted),
        ),
        precision: or_zero("precision", scores.map(|s| s.precision)),
        recall: or_zero("recall", scores.map(|s| s.recall)),
        f1_score: or_zero("f1_score", scores.map(|s| s.f1)),
        confusion_matrix: classification::confusion_matrix(test_truth, test_predicted, &observed),
        labels: observed
            .iter()
            .map(|&i| class_names.get(i).cloned().unwrap_or_else(|| i.to_string()))
            .collect(),
    }
}

pub fn evaluate_regression(
    train_truth: &[f64],
    train_predicted: &[f64],
    test_truth: &[f64],
    test_predicted: &[f64],
) -> RegressionMetrics {
    let mse = regression::mean_squared_error(test_truth, test_predicted);
    RegressionMetrics {
        train_r2: or_zero("train_r2", regression::r2_score(train_truth, train_predicted)),
        test_r2: or_zero("test_r2", regression::r2_score(test_truth, test_predicted)),
        mae: or_zero(
            "mae",
            regression::mean_absolute_error(test_truth, test_predicted),
        ),
        mse: or_zero("mse", mse),
        rmse: or_zero("rmse", mse.map(f64::sqrt)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_labels_follow_observed_classes() {
        let names = vec!["cat".to_string(), "dog".to_string(), "emu".to_string()];
        let metrics = evaluate_classification(&[0, 1], &[0, 1], &[0, 2, 2], &[0, 2, 0], &names);
        assert_eq!(metrics.labels, vec!["cat", "emu"]);
        assert_eq!(metrics.confusion_matrix, vec![vec![1, 0], vec![1, 1]]);
        assert_eq!(metrics.train_accuracy, 1.0);
        assert!((metrics.test_accuracy - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_partition_degrades_to_zero() {
        let metrics = evaluate_regression(&[1.0, 2.0], &[1.0, 2.0], &[], &[]);
        assert_eq!(metrics.train_r2, 1.0);
        assert_eq!(metrics.test_r2, 0.0);
        assert_eq!(metrics.rmse, 0.0);
    }

    #[test]
    fn test_scalars_and_headline() {
        let metrics = ModelMetrics::Regression(evaluate_regression(
            &[1.0, 2.0, 3.0],
            &[1.0, 2.0, 3.0],
            &[1.0, 3.0],
            &[1.0, 3.0],
        ));
        assert_eq!(metrics.test_score(), 1.0);
        assert_eq!(metrics.score_name(), "R²");
        assert_eq!(metrics.scalars().len(), 5);
    }
}
