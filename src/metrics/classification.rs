// file: src/metrics/classification.rs
// description: accuracy, support-weighted precision/recall/F1 and the confusion matrix
// reference: weighted averaging over observed labels with zero_division = 0

use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationMetrics {
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub confusion_matrix: Vec<Vec<usize>>,
    /// Row/column order of `confusion_matrix`.
    pub labels: Vec<String>,
}

pub fn accuracy(truth: &[usize], predicted: &[usize]) -> Option<f64> {
    if truth.is_empty() || truth.len() != predicted.len() {
        return None;
    }
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    Some(correct as f64 / truth.len() as f64)
}

/// Rows are true labels, columns predicted labels, both in `labels` order.
pub fn confusion_matrix(truth: &[usize], predicted: &[usize], labels: &[usize]) -> Vec<Vec<usize>> {
    let mut matrix = vec![vec![0; labels.len()]; labels.len()];
    for (t, p) in truth.iter().zip(predicted) {
        if let (Some(row), Some(col)) = (
            labels.iter().position(|l| l == t),
            labels.iter().position(|l| l == p),
        ) {
            matrix[row][col] += 1;
        }
    }
    matrix
}

/// Sorted union of the labels seen in either sequence.
pub fn observed_labels(truth: &[usize], predicted: &[usize]) -> Vec<usize> {
    truth
        .iter()
        .chain(predicted)
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Per-label scores averaged with the label's true support as weight.
/// Labels never predicted score 0 precision instead of failing.
pub fn weighted_scores(truth: &[usize], predicted: &[usize]) -> Option<WeightedScores> {
    if truth.is_empty() || truth.len() != predicted.len() {
        return None;
    }

    let labels = observed_labels(truth, predicted);
    let matrix = confusion_matrix(truth, predicted, &labels);
    let total = truth.len() as f64;

    let mut scores = WeightedScores {
        precision: 0.0,
        recall: 0.0,
        f1: 0.0,
    };

    for (i, row) in matrix.iter().enumerate() {
        let support: usize = row.iter().sum();
        if support == 0 {
            continue;
        }
        let true_positive = row[i] as f64;
        let predicted_count: usize = matrix.iter().map(|r| r[i]).sum();

        let precision = ratio(true_positive, predicted_count as f64);
        let recall = ratio(true_positive, support as f64);
        let f1 = ratio(2.0 * precision * recall, precision + recall);

        let weight = support as f64 / total;
        scores.precision += weight * precision;
        scores.recall += weight * recall;
        scores.f1 += weight * f1;
    }

    Some(scores)
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
