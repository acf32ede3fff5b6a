//! Segment cost functions for PELT.
//!
//! A [`CostFunction`] is fit once per series and yields a [`FittedCost`]
//! that answers `compute_error(start, end)` in O(1). The fitted state owns
//! everything it needs, so it cannot be queried against a different series
//! than the one it was built from.

use rayon::prelude::*;
use tracing::debug;

use crate::config::defaults::L2_NEGATIVE_TOLERANCE;
use crate::processing::stats::median_in_place;
use crate::types::EPSILON;

/// Segment-error oracle strategy.
pub trait CostFunction {
    type Fitted: FittedCost;

    /// Smallest segment length this cost is meaningful for.
    fn minimum_size(&self) -> usize;

    /// One-time precomputation over `signal`.
    fn fit(&self, signal: &[f64]) -> Self::Fitted;
}

/// Per-series fitted state of a [`CostFunction`].
pub trait FittedCost {
    /// Cost of treating `[start, end)` as one homogeneous segment.
    fn compute_error(&self, start: usize, end: usize) -> f64;

    /// Length of the series this state was fit on.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// L2
// ============================================================================

/// Sum of squared deviations from the segment mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct L2Cost;

/// Prefix sums of `x` and `x²`.
#[derive(Debug, Clone)]
pub struct FittedL2 {
    prefix: Vec<f64>,
    prefix_sq: Vec<f64>,
}

impl CostFunction for L2Cost {
    type Fitted = FittedL2;

    fn minimum_size(&self) -> usize {
        2
    }

    fn fit(&self, signal: &[f64]) -> FittedL2 {
        let mut prefix = Vec::with_capacity(signal.len() + 1);
        let mut prefix_sq = Vec::with_capacity(signal.len() + 1);
        prefix.push(0.0);
        prefix_sq.push(0.0);
        let (mut s, mut sq) = (0.0, 0.0);
        for &x in signal {
            s += x;
            sq += x * x;
            prefix.push(s);
            prefix_sq.push(sq);
        }
        FittedL2 { prefix, prefix_sq }
    }
}

impl FittedCost for FittedL2 {
    fn compute_error(&self, start: usize, end: usize) -> f64 {
        let end = end.min(self.len());
        if end <= start {
            return 0.0;
        }
        let len = (end - start) as f64;
        let sum = self.prefix[end] - self.prefix[start];
        let sum_sq = self.prefix_sq[end] - self.prefix_sq[start];
        let err = sum_sq - sum * sum / len;
        if err < 0.0 && err >= -L2_NEGATIVE_TOLERANCE {
            0.0
        } else {
            err
        }
    }

    fn len(&self) -> usize {
        self.prefix.len() - 1
    }
}

// ============================================================================
// RBF kernel
// ============================================================================

/// Gaussian-kernel cost with median-heuristic bandwidth.
///
/// Fitting is O(n²) in time and memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct RbfKernelCost;

/// 2D prefix sum of the kernel matrix, row-major with stride `n + 1`.
#[derive(Debug, Clone)]
pub struct FittedRbf {
    n: usize,
    prefix: Vec<f64>,
    bandwidth: f64,
}

impl FittedRbf {
    /// Fitted `σ²`.
    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    fn block_sum(&self, start: usize, end: usize) -> f64 {
        let w = self.n + 1;
        self.prefix[end * w + end] - self.prefix[start * w + end] - self.prefix[end * w + start]
            + self.prefix[start * w + start]
    }
}

/// Median of all pairwise squared distances, 1.0 when it is (near) zero.
fn median_bandwidth(signal: &[f64]) -> f64 {
    let n = signal.len();
    let mut dists: Vec<f64> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            let xi = signal[i];
            signal[i + 1..].iter().map(move |xj| (xi - xj).powi(2))
        })
        .collect();
    let med = median_in_place(&mut dists);
    if med < EPSILON {
        1.0
    } else {
        med
    }
}

impl CostFunction for RbfKernelCost {
    type Fitted = FittedRbf;

    fn minimum_size(&self) -> usize {
        2
    }

    fn fit(&self, signal: &[f64]) -> FittedRbf {
        let n = signal.len();
        let bandwidth = median_bandwidth(signal);
        let gamma = 1.0 / (2.0 * bandwidth);

        // Rows are independent: each task reads the shared signal and writes
        // only its own row.
        let mut kernel = vec![0.0; n * n];
        kernel
            .par_chunks_mut(n.max(1))
            .enumerate()
            .for_each(|(i, row)| {
                let xi = signal[i];
                for (j, k) in row.iter_mut().enumerate() {
                    *k = if i == j {
                        1.0
                    } else {
                        (-(xi - signal[j]).powi(2) * gamma).exp()
                    };
                }
            });

        let w = n + 1;
        let mut prefix = vec![0.0; w * w];
        for r in 0..n {
            for c in 0..n {
                prefix[(r + 1) * w + (c + 1)] = kernel[r * n + c] + prefix[r * w + (c + 1)]
                    + prefix[(r + 1) * w + c]
                    - prefix[r * w + c];
            }
        }

        debug!(n, bandwidth, "RBF kernel cost fitted");
        FittedRbf {
            n,
            prefix,
            bandwidth,
        }
    }
}

impl FittedCost for FittedRbf {
    fn compute_error(&self, start: usize, end: usize) -> f64 {
        let end = end.min(self.n);
        if end <= start {
            return 0.0;
        }
        let len = (end - start) as f64;
        let cost = len - self.block_sum(start, end) / len;
        cost.max(0.0)
    }

    fn len(&self) -> usize {
        self.n
    }
}
