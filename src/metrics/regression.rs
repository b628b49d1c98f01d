// file: src/metrics/regression.rs
// description: coefficient of determination and error magnitudes for regressors

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionMetrics {
    pub train_r2: f64,
    pub test_r2: f64,
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
}

/// With zero target variance a perfect fit scores 1 and anything else 0.
pub fn r2_score(truth: &[f64], predicted: &[f64]) -> Option<f64> {
    if truth.is_empty() || truth.len() != predicted.len() {
        return None;
    }
    let mean = truth.iter().sum::<f64>() / truth.len() as f64;
    let residual: f64 = truth.iter().zip(predicted).map(|(t, p)| (t - p).powi(2)).sum();
    let total: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();

    if total == 0.0 {
        return Some(if residual == 0.0 { 1.0 } else { 0.0 });
    }
    Some(1.0 - residual / total)
}

pub fn mean_absolute_error(truth: &[f64], predicted: &[f64]) -> Option<f64> {
    if truth.is_empty() || truth.len() != predicted.len() {
        return None;
    }
    Some(truth.iter().zip(predicted).map(|(t, p)| (t - p).abs()).sum::<f64>() / truth.len() as f64)
}

pub fn mean_squared_error(truth: &[f64], predicted: &[f64]) -> Option<f64> {
    if truth.is_empty() || truth.len() != predicted.len() {
        return None;
    }
    Some(truth.iter().zip(predicted).map(|(t, p)| (t - p).powi(2)).sum::<f64>() / truth.len() as f64)
}
