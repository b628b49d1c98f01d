// file: src/models/forest.rs
// description: bagged ensemble of CART trees with per-split feature subsampling
// reference: bootstrap aggregation, majority vote for classes and mean for values

use crate::models::tree::{Criterion, DecisionTree, TreeParams, majority};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    criterion: Criterion,
    n_features: usize,
}

impl RandomForest {
    pub fn fit(
        features: &[Vec<f64>],
        targets: &[f64],
        criterion: Criterion,
        params: &TreeParams,
        n_estimators: usize,
        seed: u64,
    ) -> Result<Self, String> {
        if n_estimators == 0 {
            return Err("n_estimators must be at least 1".to_string());
        }

        let n = features.len();
        let n_features = features.first().map(Vec::len).unwrap_or(0);
        let max_features = match criterion {
            Criterion::Gini { .. } => ((n_features as f64).sqrt() as usize).max(1),
            Criterion::Mse => n_features,
        };
        let tree_params = TreeParams {
            max_features: Some(max_features),
            ..params.clone()
        };

        let mut rng = StdRng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(n_estimators);
        for _ in 0..n_estimators {
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            trees.push(DecisionTree::fit_on(
                features,
                targets,
                sample,
                criterion,
                &tree_params,
                &mut rng,
            )?);
        }

        Ok(Self {
            trees,
            criterion,
            n_features,
        })
    }

    pub fn predict(&self, features: &[Vec<f64>]) -> Vec<f64> {
        features
            .iter()
            .map(|row| match self.criterion {
                Criterion::Gini { n_classes } => {
                    let mut votes = vec![0usize; n_classes];
                    for tree in &self.trees {
                        votes[tree.predict_row(row) as usize] += 1;
                    }
                    majority(&votes) as f64
                }
                Criterion::Mse => {
                    self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
                        / self.trees.len() as f64
                }
            })
            .collect()
    }

    /// Mean of the per-tree importances, renormalized to sum to one.
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut importances = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (total, value) in importances.iter_mut().zip(tree.feature_importances()) {
                *total += value;
            }
        }
        let sum: f64 = importances.iter().sum();
        if sum > 0.0 {
            for value in importances.iter_mut() {
                *value /= sum;
            }
        }
        importances
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> TreeParams {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
        }
    }

    fn three_class_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features: Vec<Vec<f64>> = (0..200)
            .map(|i| {
                let class = i % 3;
                vec![class as f64 * 10.0 + (i % 7) as f64 * 0.3, (i % 5) as f64]
            })
            .collect();
        let targets = (0..200).map(|i| (i % 3) as f64).collect();
        (features, targets)
    }

    #[test]
    fn test_forest_classifier_separates_three_classes() {
        let (features, targets) = three_class_data();
        let forest = RandomForest::fit(
            &features,
            &targets,
            Criterion::Gini { n_classes: 3 },
            &params(),
            25,
            42,
        )
        .unwrap();

        assert_eq!(forest.len(), 25);
        let predictions = forest.predict(&features);
        let correct = predictions
            .iter()
            .zip(&targets)
            .filter(|(p, t)| p == t)
            .count();
        assert!(correct >= 190);
        assert!(predictions.iter().all(|p| [0.0, 1.0, 2.0].contains(p)));
    }

    #[test]
    fn test_forest_is_deterministic_for_a_seed() {
        let (features, targets) = three_class_data();
        let fit = |seed| {
            RandomForest::fit(&features, &targets, Criterion::Mse, &params(), 10, seed)
                .unwrap()
                .predict(&features)
        };
        assert_eq!(fit(7), fit(7));
    }

    #[test]
    fn test_importances_are_normalized() {
        let (features, targets) = three_class_data();
        let forest =
            RandomForest::fit(&features, &targets, Criterion::Mse, &params(), 10, 42).unwrap();
        let importances = forest.feature_importances();
        assert_eq!(importances.len(), 2);
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_zero_estimators_rejected() {
        let (features, targets) = three_class_data();
        assert!(RandomForest::fit(&features, &targets, Criterion::Mse, &params(), 0, 42).is_err());
    }
}
