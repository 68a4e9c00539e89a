use serde::{Deserialize, Serialize};

use crate::error::FormError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitSummary {
    pub feature_names: Vec<String>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    pub r_squared: f64,
    pub samples: usize,
    pub ridge_lambda: f64,
}

impl FitSummary {
    pub fn predict(&self, features: &[f64]) -> Result<f64, FormError> {
        if features.len() != self.coefficients.len() {
            return Err(FormError::DimensionMismatch {
                expected: self.coefficients.len(),
                got: features.len(),
            });
        }
        let dot: f64 = self
            .coefficients
            .iter()
            .zip(features)
            .map(|(c, x)| c * x)
            .sum();
        Ok(self.intercept + dot)
    }
}

/// In-place per-column z-scoring; returns (mean, std) per column so new
/// samples can be transformed the same way. Constant columns are left at 0.
pub fn standardize_rows(rows: &mut [Vec<f64>]) -> Vec<(f64, f64)> {
    let Some(width) = rows.first().map(|r| r.len()) else {
        return Vec::new();
    };
    let n = rows.len() as f64;

    let mut params = Vec::with_capacity(width);
    for col in 0..width {
        let mean = rows.iter().map(|r| r[col]).sum::<f64>() / n;
        let variance = rows.iter().map(|r| (r[col] - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        params.push((mean, std));
        for row in rows.iter_mut() {
            row[col] = if std <= f64::EPSILON {
                0.0
            } else {
                (row[col] - mean) / std
            };
        }
    }
    params
}

/// Least squares through the normal equations, solved by Cholesky. A
/// `ridge_lambda` of 0 is plain OLS; anything larger shrinks the slope
/// coefficients (the intercept is never penalized).
pub fn fit(
    rows: &[Vec<f64>],
    targets: &[f64],
    feature_names: &[&str],
    ridge_lambda: f64,
) -> Result<FitSummary, FormError> {
    if rows.len() != targets.len() {
        return Err(FormError::DimensionMismatch {
            expected: rows.len(),
            got: targets.len(),
        });
    }
    if rows.is_empty() {
        return Err(FormError::InvalidConfig {
            reason: "cannot fit on an empty sample".to_string(),
        });
    }
    if !ridge_lambda.is_finite() || ridge_lambda < 0.0 {
        return Err(FormError::InvalidConfig {
            reason: format!("ridge lambda must be >= 0, got {ridge_lambda}"),
        });
    }

    let k = feature_names.len();
    let dim = k + 1;

    let mut xtx = vec![vec![0.0f64; dim]; dim];
    let mut xty = vec![0.0f64; dim];
    for (row, &y) in rows.iter().zip(targets) {
        if row.len() != k {
            return Err(FormError::DimensionMismatch {
                expected: k,
                got: row.len(),
            });
        }
        for i in 0..dim {
            let xi = if i == 0 { 1.0 } else { row[i - 1] };
            xty[i] += xi * y;
            for j in i..dim {
                let xj = if j == 0 { 1.0 } else { row[j - 1] };
                xtx[i][j] += xi * xj;
            }
        }
    }
    for i in 0..dim {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }
    for (i, diag_row) in xtx.iter_mut().enumerate() {
        diag_row[i] += 1e-10;
        if i > 0 {
            diag_row[i] += ridge_lambda;
        }
    }

    let beta = cholesky_solve(&xtx, &xty)?;
    let intercept = beta[0];
    let coefficients = beta[1..].to_vec();

    let mut ss_res = 0.0;
    let mean_y = targets.iter().sum::<f64>() / targets.len() as f64;
    let mut ss_tot = 0.0;
    for (row, &y) in rows.iter().zip(targets) {
        let pred = intercept
            + coefficients
                .iter()
                .zip(row)
                .map(|(c, x)| c * x)
                .sum::<f64>();
        ss_res += (y - pred).powi(2);
        ss_tot += (y - mean_y).powi(2);
    }
    let r_squared = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    };

    Ok(FitSummary {
        feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
        intercept,
        coefficients,
        r_squared,
        samples: rows.len(),
        ridge_lambda,
    })
}

fn cholesky_solve(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>, FormError> {
    let n = a.len();
    let mut l = vec![vec![0.0f64; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[i][k] * l[j][k];
            }
            if i == j {
                let diag = a[i][i] - sum;
                if diag <= 0.0 {
                    return Err(FormError::SingularSystem);
                }
                l[i][j] = diag.sqrt();
            } else {
                l[i][j] = (a[i][j] - sum) / l[j][j];
            }
        }
    }

    // Forward then backward substitution.
    let mut z = vec![0.0f64; n];
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[i][j] * z[j];
        }
        z[i] = (b[i] - sum) / l[i][i];
    }
    let mut x = vec![0.0f64; n];
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[j][i] * x[j];
        }
        x[i] = (z[i] - sum) / l[i][i];
    }
    Ok(x)
}
