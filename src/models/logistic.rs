// file: src/models/logistic.rs
// description: multinomial logistic regression trained by full-batch gradient descent
// reference: softmax cross-entropy with L2 penalty (inverse strength C)

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl LogisticRegression {
    /// Features are standardized internally so a fixed learning rate
    /// behaves the same regardless of column magnitudes.
    pub fn fit(
        features: &[Vec<f64>],
        targets: &[f64],
        n_classes: usize,
        c: f64,
        learning_rate: f64,
        max_iter: usize,
    ) -> Result<Self, String> {
        let distinct = {
            let mut seen = vec![false; n_classes];
            for &t in targets {
                if let Some(flag) = seen.get_mut(t as usize) {
                    *flag = true;
                }
            }
            seen.iter().filter(|f| **f).count()
        };
        if distinct < 2 {
            return Err(format!(
                "needs samples of at least 2 classes in the training data, found {}",
                distinct
            ));
        }

        let n = features.len();
        let p = features.first().map(Vec::len).unwrap_or(0);
        let (means, scales) = standardization(features);
        let x: Vec<Vec<f64>> = features
            .iter()
            .map(|row| standardize_row(row, &means, &scales))
            .collect();

        let mut weights = vec![vec![0.0; p]; n_classes];
        let mut bias = vec![0.0; n_classes];
        let penalty = 1.0 / (c * n as f64);

        for _ in 0..max_iter {
            let mut grad_w = vec![vec![0.0; p]; n_classes];
            let mut grad_b = vec![0.0; n_classes];

            for (row, &target) in x.iter().zip(targets) {
                let probabilities = softmax(&weights, &bias, row);
                for (k, probability) in probabilities.iter().enumerate() {
                    let error = probability - if k == target as usize { 1.0 } else { 0.0 };
                    grad_b[k] += error;
                    for (g, v) in grad_w[k].iter_mut().zip(row) {
                        *g += error * v;
                    }
                }
            }

            for k in 0..n_classes {
                bias[k] -= learning_rate * grad_b[k] / n as f64;
                for j in 0..p {
                    let gradient = grad_w[k][j] / n as f64 + penalty * weights[k][j];
                    weights[k][j] -= learning_rate * gradient;
                }
            }
        }

        if weights.iter().flatten().chain(&bias).any(|v| !v.is_finite()) {
            return Err("gradient descent diverged".to_string());
        }

        Ok(Self {
            weights,
            bias,
            means,
            scales,
        })
    }

    pub fn predict_proba(&self, features: &[Vec<f64>]) -> Vec<Vec<f64>> {
        features
            .iter()
            .map(|row| {
                let row = standardize_row(row, &self.means, &self.scales);
                softmax(&self.weights, &self.bias, &row)
            })
            .collect()
    }

    pub fn predict(&self, features: &[Vec<f64>]) -> Vec<f64> {
        self.predict_proba(features)
            .into_iter()
            .map(|probabilities| {
                probabilities
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (k, &p)| {
                        if p > best.1 { (k, p) } else { best }
                    })
                    .0 as f64
            })
            .collect()
    }
}

fn standardization(features: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
    let n = features.len() as f64;
    let p = features.first().map(Vec::len).unwrap_or(0);
    let mut means = vec![0.0; p];
    let mut scales = vec![0.0; p];

    for row in features {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v / n;
        }
    }
    for row in features {
        for ((s, v), m) in scales.iter_mut().zip(row).zip(&means) {
            *s += (v - m) * (v - m) / n;
        }
    }
    for s in scales.iter_mut() {
        *s = if *s > 0.0 { s.sqrt() } else { 1.0 };
    }

    (means, scales)
}

fn standardize_row(row: &[f64], means: &[f64], scales: &[f64]) -> Vec<f64> {
    row.iter()
        .zip(means)
        .zip(scales)
        .map(|((v, m), s)| (v - m) / s)
        .collect()
}

fn softmax(weights: &[Vec<f64>], bias: &[f64], row: &[f64]) -> Vec<f64> {
    let logits: Vec<f64> = weights
        .iter()
        .zip(bias)
        .map(|(w, b)| b + w.iter().zip(row).map(|(wi, xi)| wi * xi).sum::<f64>())
        .collect();
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
