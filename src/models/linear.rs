// file: src/models/linear.rs
// description: least-squares, ridge and lasso regression on centered features
// reference: closed-form normal equations and cyclic coordinate descent

#[derive(Debug, Clone)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

struct Centered {
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
    x_mean: Vec<f64>,
    y_mean: f64,
}

fn center(features: &[Vec<f64>], targets: &[f64]) -> Centered {
    let n = features.len() as f64;
    let p = features.first().map(Vec::len).unwrap_or(0);

    let mut x_mean = vec![0.0; p];
    for row in features {
        for (mean, value) in x_mean.iter_mut().zip(row) {
            *mean += value / n;
        }
    }
    let y_mean = targets.iter().sum::<f64>() / n;

    let x = features
        .iter()
        .map(|row| row.iter().zip(&x_mean).map(|(v, m)| v - m).collect())
        .collect();
    let y = targets.iter().map(|v| v - y_mean).collect();

    Centered {
        x,
        y,
        x_mean,
        y_mean,
    }
}

impl LinearModel {
    pub fn fit_ols(features: &[Vec<f64>], targets: &[f64]) -> Result<Self, String> {
        Self::fit_penalized(features, targets, 0.0)
    }

    pub fn fit_ridge(features: &[Vec<f64>], targets: &[f64], alpha: f64) -> Result<Self, String> {
        Self::fit_penalized(features, targets, alpha)
    }

    /// Solves `(XᵀX + αI) w = Xᵀy` on centered data; the intercept is not penalized.
    fn fit_penalized(features: &[Vec<f64>], targets: &[f64], alpha: f64) -> Result<Self, String> {
        let data = center(features, targets);
        let p = data.x_mean.len();

        let mut gram = vec![vec![0.0; p]; p];
        let mut moment = vec![0.0; p];
        for (row, y) in data.x.iter().zip(&data.y) {
            for i in 0..p {
                moment[i] += row[i] * y;
                for j in i..p {
                    gram[i][j] += row[i] * row[j];
                }
            }
        }
        for i in 0..p {
            for j in 0..i {
                gram[i][j] = gram[j][i];
            }
        }

        // Rank-deficient designs (duplicated or constant columns) still get a
        // minimum-norm-like answer instead of a singular system.
        let scale = (0..p).map(|i| gram[i][i]).fold(0.0_f64, f64::max).max(1.0);
        let jitter = scale * 1e-10;
        for (i, row) in gram.iter_mut().enumerate() {
            row[i] += alpha + jitter;
        }

        let coefficients = solve(gram, moment)
            .ok_or_else(|| "normal equations are singular".to_string())?;
        let intercept = data.y_mean
            - coefficients
                .iter()
                .zip(&data.x_mean)
                .map(|(w, m)| w * m)
                .sum::<f64>();

        Ok(Self {
            coefficients,
            intercept,
        })
    }

    /// Minimizes `(1/2n)‖y - Xw‖² + α‖w‖₁` by cyclic coordinate descent.
    pub fn fit_lasso(
        features: &[Vec<f64>],
        targets: &[f64],
        alpha: f64,
        max_iter: usize,
        tolerance: f64,
    ) -> Result<Self, String> {
        let data = center(features, targets);
        let n = data.x.len() as f64;
        let p = data.x_mean.len();

        let column_norms: Vec<f64> = (0..p)
            .map(|j| data.x.iter().map(|row| row[j] * row[j]).sum::<f64>() / n)
            .collect();

        let mut weights = vec![0.0; p];
        let mut residual = data.y.clone();

        for _ in 0..max_iter {
            let mut max_change: f64 = 0.0;
            let mut max_weight: f64 = 0.0;

            for j in 0..p {
                if column_norms[j] == 0.0 {
                    continue;
                }
                let old = weights[j];
                let rho = data
                    .x
                    .iter()
                    .zip(&residual)
                    .map(|(row, r)| row[j] * (r + row[j] * old))
                    .sum::<f64>()
                    / n;
                let new = soft_threshold(rho, alpha) / column_norms[j];

                if new != old {
                    let delta = new - old;
                    for (r, row) in residual.iter_mut().zip(&data.x) {
                        *r -= row[j] * delta;
                    }
                    weights[j] = new;
                }

                max_change = max_change.max((new - old).abs());
                max_weight = max_weight.max(new.abs());
            }

            if max_change <= tolerance * max_weight.max(1.0) {
                break;
            }
        }

        if weights.iter().any(|w| !w.is_finite()) {
            return Err("coordinate descent diverged".to_string());
        }

        let intercept = data.y_mean
            - weights
                .iter()
                .zip(&data.x_mean)
                .map(|(w, m)| w * m)
                .sum::<f64>();

        Ok(Self {
            coefficients: weights,
            intercept,
        })
    }

    pub fn predict(&self, features: &[Vec<f64>]) -> Vec<f64> {
        features
            .iter()
            .map(|row| {
                self.intercept
                    + row
                        .iter()
                        .zip(&self.coefficients)
                        .map(|(v, w)| v * w)
                        .sum::<f64>()
            })
            .collect()
    }
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Gaussian elimination with partial pivoting.
pub(crate) fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    x.iter().all(|v| v.is_finite()).then_some(x)
}
