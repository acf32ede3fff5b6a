//! Convergent cross mapping.
//!
//! If X drives Y, the state of X is recoverable from the delay embedding of
//! Y. For growing library sizes, X at each held-out time is predicted from
//! the nearest neighbours of Y's embedded state; the score is the best
//! Pearson correlation between predicted and actual X.

use tracing::trace;

use crate::config::defaults::{
    CCM_HOLDOUT_RESERVE, CCM_LIBRARY_STEPS, CCM_MAX_LIBRARY, CCM_MIN_EXTRA_SAMPLES, CCM_MIN_LIBRARY,
};
use crate::config::CausalityConfig;
use crate::processing::stats::{pearson, z_score};
use crate::types::EPSILON;

/// Takens embedding: vector `i` is `[s[i], s[i+τ], …]` with `dim` entries,
/// anchored at time `i + (dim-1)·τ`.
#[derive(Debug, Clone)]
pub struct Embedding {
    vectors: Vec<Vec<f64>>,
    span: usize,
}

impl Embedding {
    pub fn new(series: &[f64], dim: usize, delay: usize) -> Self {
        let span = dim.saturating_sub(1) * delay;
        let count = series.len().saturating_sub(span);
        let vectors = (0..count)
            .map(|i| (0..dim).map(|k| series[i + k * delay]).collect())
            .collect();
        Self { vectors, span }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Time index of vector `i`.
    pub fn anchor(&self, i: usize) -> usize {
        i + self.span
    }

    pub fn vector(&self, i: usize) -> &[f64] {
        &self.vectors[i]
    }
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[derive(Debug, Clone, Copy)]
pub struct CcmAnalyzer {
    embedding_dim: usize,
    delay: usize,
}

impl CcmAnalyzer {
    pub fn new(embedding_dim: usize, delay: usize) -> Self {
        Self {
            embedding_dim: embedding_dim.max(1),
            delay: delay.max(1),
        }
    }

    pub fn from_config(config: &CausalityConfig) -> Self {
        Self::new(config.ccm_embedding_dim, config.ccm_delay)
    }

    /// Fewest samples for which [`cross_map`](Self::cross_map) runs.
    pub fn min_samples(&self) -> usize {
        (self.embedding_dim - 1) * self.delay + CCM_MIN_EXTRA_SAMPLES
    }

    /// Library sizes to try for `vectors` embedded states.
    pub fn library_sizes(&self, vectors: usize) -> Vec<usize> {
        let lo = CCM_MIN_LIBRARY.max(self.embedding_dim + 2);
        let hi = CCM_MAX_LIBRARY.min(vectors.saturating_sub(CCM_HOLDOUT_RESERVE));
        if hi < lo {
            return Vec::new();
        }
        if hi == lo {
            return vec![lo];
        }
        let step = ((hi - lo) / (CCM_LIBRARY_STEPS - 1)).max(1);
        let mut sizes: Vec<usize> = (lo..=hi).step_by(step).collect();
        if sizes.last() != Some(&hi) {
            sizes.push(hi);
        }
        sizes
    }

    /// Evidence that `source` causally drives `target`, in `[0, 1]`.
    ///
    /// Returns exactly 0.0 for series shorter than [`min_samples`](Self::min_samples).
    pub fn cross_map(&self, source: &[f64], target: &[f64]) -> f64 {
        let n = source.len().min(target.len());
        if n < self.min_samples() {
            return 0.0;
        }
        let source = z_score(&source[..n]);
        let target = z_score(&target[..n]);

        let manifold = Embedding::new(&target, self.embedding_dim, self.delay);
        let neighbours = self.embedding_dim + 1;

        let mut best = 0.0_f64;
        for library in self.library_sizes(manifold.len()) {
            if library < neighbours {
                continue;
            }
            let rho = self.skill(&manifold, &source, library, neighbours);
            trace!(library, rho, "CCM library evaluated");
            best = best.max(rho);
        }
        best
    }

    /// Cross-map correlation using the first `library` states as library and
    /// every later state as prediction target.
    fn skill(&self, manifold: &Embedding, source: &[f64], library: usize, k: usize) -> f64 {
        let mut predicted = Vec::with_capacity(manifold.len() - library);
        let mut actual = Vec::with_capacity(manifold.len() - library);
        let mut dists: Vec<(f64, usize)> = Vec::with_capacity(library);

        for query in library..manifold.len() {
            dists.clear();
            dists.extend(
                (0..library).map(|i| (distance(manifold.vector(query), manifold.vector(i)), i)),
            );
            dists.select_nth_unstable_by(k - 1, |a, b| a.0.total_cmp(&b.0));
            let nearest = &mut dists[..k];
            nearest.sort_by(|a, b| a.0.total_cmp(&b.0));

            let d_min = nearest[0].0.max(EPSILON);
            let weights: Vec<f64> = nearest.iter().map(|(d, _)| (-d / d_min).exp()).collect();
            let total: f64 = weights.iter().sum();
            if total < f64::MIN_POSITIVE {
                continue;
            }
            let estimate = nearest
                .iter()
                .zip(&weights)
                .map(|((_, i), w)| w * source[manifold.anchor(*i)])
                .sum::<f64>()
                / total;

            predicted.push(estimate);
            actual.push(source[manifold.anchor(query)]);
        }

        pearson(&predicted, &actual)
    }
}
