// file: src/models/tree.rs
// description: CART decision tree for classification (gini) and regression (squared error)
// reference: greedy binary splitting on midpoint thresholds

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;

/// Hard ceiling on recursion, independent of the configured `max_depth`.
const DEPTH_LIMIT: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Criterion {
    Gini { n_classes: usize },
    Mse,
}

#[derive(Debug, Clone)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Features considered per split; `None` means all of them.
    pub max_features: Option<usize>,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

impl DecisionTree {
    pub fn fit(
        features: &[Vec<f64>],
        targets: &[f64],
        criterion: Criterion,
        params: &TreeParams,
        seed: u64,
    ) -> Result<Self, String> {
        let mut rng = StdRng::seed_from_u64(seed);
        let indices: Vec<usize> = (0..features.len()).collect();
        Self::fit_on(features, targets, indices, criterion, params, &mut rng)
    }

    /// Grows a tree on a subset of rows (with repetition for bootstrap samples).
    pub(crate) fn fit_on(
        features: &[Vec<f64>],
        targets: &[f64],
        indices: Vec<usize>,
        criterion: Criterion,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Result<Self, String> {
        if indices.is_empty() {
            return Err("cannot grow a tree without samples".to_string());
        }
        if let Criterion::Gini { n_classes } = criterion {
            if n_classes == 0 || targets.iter().any(|t| *t as usize >= n_classes) {
                return Err("class index out of range".to_string());
            }
        }

        let n_features = features.first().map(Vec::len).unwrap_or(0);
        let mut builder = Builder {
            features,
            targets,
            criterion,
            params,
            rng,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        builder.grow(indices, 0);

        let Builder {
            nodes,
            mut importances,
            ..
        } = builder;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for value in importances.iter_mut() {
                *value /= total;
            }
        }

        Ok(Self { nodes, importances })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut position = 0;
        loop {
            match &self.nodes[position] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    position = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn predict(&self, features: &[Vec<f64>]) -> Vec<f64> {
        features.iter().map(|row| self.predict_row(row)).collect()
    }

    /// Normalized impurity decrease per feature; all zeros for a single-leaf tree.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], position: usize) -> usize {
            match &nodes[position] {
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }
}

struct Builder<'a> {
    features: &'a [Vec<f64>],
    targets: &'a [f64],
    criterion: Criterion,
    params: &'a TreeParams,
    rng: &'a mut StdRng,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl Builder<'_> {
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let position = self.nodes.len();
        self.nodes.push(Node::Leaf(self.leaf_value(&indices)));

        let impurity = self.impurity(&indices);
        let max_depth = self.params.max_depth.unwrap_or(usize::MAX).min(DEPTH_LIMIT);
        if depth >= max_depth
            || indices.len() < self.params.min_samples_split
            || impurity <= f64::EPSILON
        {
            return position;
        }

        let Some(best) = self.best_split(&indices, impurity) else {
            return position;
        };

        self.importances[best.feature] += best.gain;
        let left = self.grow(best.left, depth + 1);
        let right = self.grow(best.right, depth + 1);
        self.nodes[position] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        position
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let n_features = self.importances.len();
        match self.params.max_features {
            Some(k) if k > 0 && k < n_features => {
                let mut chosen = index::sample(&mut *self.rng, n_features, k).into_vec();
                chosen.sort_unstable();
                chosen
            }
            _ => (0..n_features).collect(),
        }
    }

    fn best_split(&mut self, indices: &[usize], impurity: f64) -> Option<BestSplit> {
        let n = indices.len() as f64;
        let mut best: Option<(usize, f64, f64)> = None;

        for feature in self.candidate_features() {
            let mut order = indices.to_vec();
            order.sort_by(|&a, &b| self.features[a][feature].total_cmp(&self.features[b][feature]));

            let mut stats = SplitStats::new(self.criterion, self.targets, &order);
            for i in 0..order.len() - 1 {
                stats.move_left(self.targets[order[i]]);

                let here = self.features[order[i]][feature];
                let next = self.features[order[i + 1]][feature];
                if here == next {
                    continue;
                }

                let (left_impurity, right_impurity) = stats.impurities();
                let left_n = (i + 1) as f64;
                let right_n = n - left_n;
                let gain = n * impurity - left_n * left_impurity - right_n * right_impurity;

                if gain > 1e-12 && best.is_none_or(|(_, _, g)| gain > g) {
                    let threshold = here + (next - here) / 2.0;
                    // Adjacent floats can collapse the midpoint onto `next`.
                    let threshold = if threshold >= next { here } else { threshold };
                    best = Some((feature, threshold, gain));
                }
            }
        }

        let (feature, threshold, gain) = best?;
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.features[i][feature] <= threshold);

        Some(BestSplit {
            feature,
            threshold,
            gain,
            left,
            right,
        })
    }

    fn leaf_value(&self, indices: &[usize]) -> f64 {
        match self.criterion {
            Criterion::Gini { n_classes } => {
                let mut counts = vec![0usize; n_classes];
                for &i in indices {
                    counts[self.targets[i] as usize] += 1;
                }
                majority(&counts) as f64
            }
            Criterion::Mse => {
                indices.iter().map(|&i| self.targets[i]).sum::<f64>() / indices.len() as f64
            }
        }
    }

    fn impurity(&self, indices: &[usize]) -> f64 {
        let stats = SplitStats::new(self.criterion, self.targets, indices);
        stats.impurities().1
    }
}

/// Running sufficient statistics for both sides of a candidate split.
enum SplitStats {
    Gini {
        left: Vec<f64>,
        right: Vec<f64>,
        left_n: f64,
        right_n: f64,
    },
    Mse {
        left_sum: f64,
        left_sq: f64,
        left_n: f64,
        right_sum: f64,
        right_sq: f64,
        right_n: f64,
    },
}

impl SplitStats {
    fn new(criterion: Criterion, targets: &[f64], indices: &[usize]) -> Self {
        match criterion {
            Criterion::Gini { n_classes } => {
                let mut right = vec![0.0; n_classes];
                for &i in indices {
                    right[targets[i] as usize] += 1.0;
                }
                SplitStats::Gini {
                    left: vec![0.0; n_classes],
                    right,
                    left_n: 0.0,
                    right_n: indices.len() as f64,
                }
            }
            Criterion::Mse => {
                let right_sum = indices.iter().map(|&i| targets[i]).sum();
                let right_sq = indices.iter().map(|&i| targets[i] * targets[i]).sum();
                SplitStats::Mse {
                    left_sum: 0.0,
                    left_sq: 0.0,
                    left_n: 0.0,
                    right_sum,
                    right_sq,
                    right_n: indices.len() as f64,
                }
            }
        }
    }

    fn move_left(&mut self, target: f64) {
        match self {
            SplitStats::Gini {
                left,
                right,
                left_n,
                right_n,
            } => {
                let class = target as usize;
                left[class] += 1.0;
                right[class] -= 1.0;
                *left_n += 1.0;
                *right_n -= 1.0;
            }
            SplitStats::Mse {
                left_sum,
                left_sq,
                left_n,
                right_sum,
                right_sq,
                right_n,
            } => {
                *left_sum += target;
                *left_sq += target * target;
                *left_n += 1.0;
                *right_sum -= target;
                *right_sq -= target * target;
                *right_n -= 1.0;
            }
        }
    }

    fn impurities(&self) -> (f64, f64) {
        match self {
            SplitStats::Gini {
                left,
                right,
                left_n,
                right_n,
            } => (gini(left, *left_n), gini(right, *right_n)),
            SplitStats::Mse {
                left_sum,
                left_sq,
                left_n,
                right_sum,
                right_sq,
                right_n,
            } => (
                variance(*left_sum, *left_sq, *left_n),
                variance(*right_sum, *right_sq, *right_n),
            ),
        }
    }
}

fn gini(counts: &[f64], n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / n) * (c / n)).sum::<f64>()
}

fn variance(sum: f64, sum_sq: f64, n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

/// Index of the largest count; ties go to the smallest index.
pub(crate) fn majority(counts: &[usize]) -> usize {
    counts
        .iter()
        .enumerate()
        .fold((0, 0), |best, (class, &count)| {
            if count > best.1 { (class, count) } else { best }
        })
        .0
}
