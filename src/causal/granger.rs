//! Lag-regression Granger causality.
//!
//! For a source X and target Y at lag L, two least-squares models predict
//! `Y[t]`:
//!
//! - restricted: `Y[t-1..=t-L]` and an intercept
//! - unrestricted: `Y[t-1..=t-L]`, `X[t-1..=t-L]` and an intercept
//!
//! The score is the fraction of the restricted model's mean squared residual
//! removed by adding the source lags. An F-test on the residual sums gives a
//! p-value alongside it.

use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use tracing::trace;

use crate::config::defaults::SINGULAR_PIVOT;
use crate::config::CausalityConfig;
use crate::types::{DirectionalScore, GrangerResult, EPSILON};

#[derive(Debug, Clone, Copy)]
pub struct GrangerAnalyzer {
    lag: usize,
}

impl GrangerAnalyzer {
    pub fn new(lag: usize) -> Self {
        Self { lag: lag.max(1) }
    }

    pub fn from_config(config: &CausalityConfig) -> Self {
        Self::new(config.granger_lag)
    }

    pub fn lag(&self) -> usize {
        self.lag
    }

    /// Both directions between `x` and `y`, computed independently.
    pub fn analyze(&self, x: &[f64], y: &[f64]) -> GrangerResult {
        GrangerResult {
            x_to_y: compute_causality(x, y, self.lag),
            y_to_x: compute_causality(y, x, self.lag),
        }
    }
}

/// Does `source` Granger-cause `target` at `lag`?
///
/// Returns [`DirectionalScore::ZERO`] when fewer than `2·lag + 2` regression
/// rows exist or either normal-equation system is singular.
pub fn compute_causality(source: &[f64], target: &[f64], lag: usize) -> DirectionalScore {
    let lag = lag.max(1);
    let n = source.len().min(target.len());
    if n <= lag {
        return DirectionalScore::ZERO;
    }
    let rows = n - lag;
    if rows < 2 * lag + 2 {
        return DirectionalScore::ZERO;
    }

    let response: Vec<f64> = target[lag..n].to_vec();
    let restricted = design_matrix(target, None, lag, n);
    let unrestricted = design_matrix(target, Some(source), lag, n);

    let (Some(rss_r), Some(rss_u)) = (
        residual_sum_of_squares(&restricted, &response),
        residual_sum_of_squares(&unrestricted, &response),
    ) else {
        trace!(lag, rows, "Granger normal equations singular");
        return DirectionalScore::ZERO;
    };

    let mse_r = rss_r / rows as f64;
    let mse_u = rss_u / rows as f64;
    let improvement_ratio = if mse_r < EPSILON {
        0.0
    } else {
        ((mse_r - mse_u) / mse_r).max(0.0)
    };

    let df1 = lag as f64;
    let df2 = (rows - 2 * lag - 1) as f64;
    let f_statistic = ((rss_r - rss_u).max(0.0) / df1) / (rss_u / df2);
    let p_value = f_test_p_value(f_statistic, df1, df2);

    DirectionalScore {
        improvement_ratio,
        f_statistic: if f_statistic.is_finite() { f_statistic } else { 0.0 },
        p_value,
    }
}

/// Upper-tail probability of `F(df1, df2)`; 1.0 when undefined.
fn f_test_p_value(f_statistic: f64, df1: f64, df2: f64) -> f64 {
    if !f_statistic.is_finite() || df1 <= 0.0 || df2 <= 0.0 {
        return 1.0;
    }
    match FisherSnedecor::new(df1, df2) {
        Ok(dist) => (1.0 - dist.cdf(f_statistic)).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}

/// Row-major design matrix with an intercept in the last column.
fn design_matrix(target: &[f64], source: Option<&[f64]>, lag: usize, n: usize) -> Vec<Vec<f64>> {
    (lag..n)
        .map(|t| {
            let mut row: Vec<f64> = (1..=lag).map(|k| target[t - k]).collect();
            if let Some(source) = source {
                row.extend((1..=lag).map(|k| source[t - k]));
            }
            row.push(1.0);
            row
        })
        .collect()
}

/// Fit OLS through the normal equations and return the residual sum of
/// squares, or `None` for a singular system.
fn residual_sum_of_squares(design: &[Vec<f64>], response: &[f64]) -> Option<f64> {
    let p = design.first().map_or(0, Vec::len);
    let mut xtx = vec![vec![0.0; p]; p];
    let mut xty = vec![0.0; p];
    for (row, y) in design.iter().zip(response) {
        for i in 0..p {
            xty[i] += row[i] * y;
            for j in i..p {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..p {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }

    let beta = solve(xtx, xty)?;
    let rss = design
        .iter()
        .zip(response)
        .map(|(row, y)| {
            let fitted: f64 = row.iter().zip(&beta).map(|(a, b)| a * b).sum();
            (y - fitted).powi(2)
        })
        .sum();
    Some(rss)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < SINGULAR_PIVOT {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
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
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
