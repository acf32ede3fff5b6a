//! Signal preprocessing: Hampel outlier replacement followed by z-score
//! normalization.

use super::stats::{median_in_place, z_score};
use crate::config::{defaults::MAD_SCALE, PreprocessConfig};
use crate::types::EPSILON;

/// Hampel filter + z-score normalizer.
#[derive(Debug, Clone, Copy)]
pub struct SignalPreprocessor {
    window_size: usize,
    sigma: f64,
}

impl SignalPreprocessor {
    pub fn new(window_size: usize, sigma: f64) -> Self {
        Self { window_size, sigma }
    }

    pub fn from_config(config: &PreprocessConfig) -> Self {
        Self::new(config.hampel_window, config.hampel_sigma)
    }

    /// Clean and normalize `values`. Always returns a sequence of the same length.
    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        z_score(&hampel_filter(values, self.window_size, self.sigma))
    }
}

/// Replace samples further than `sigma` robust deviations from their window
/// median with that median.
///
/// The window is centred on each sample, forced to an odd width, and
/// truncated at the series ends. Medians are always taken over the original
/// input, never over already-replaced samples.
pub fn hampel_filter(values: &[f64], window_size: usize, sigma: f64) -> Vec<f64> {
    let n = values.len();
    let width = if window_size % 2 == 0 {
        window_size + 1
    } else {
        window_size
    };
    let half = width / 2;

    let mut out = values.to_vec();
    let mut window: Vec<f64> = Vec::with_capacity(width);
    let mut deviations: Vec<f64> = Vec::with_capacity(width);

    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(n);

        window.clear();
        window.extend_from_slice(&values[lo..hi]);
        let med = median_in_place(&mut window);

        deviations.clear();
        deviations.extend(values[lo..hi].iter().map(|v| (v - med).abs()));
        let mad = median_in_place(&mut deviations);

        let threshold = sigma * MAD_SCALE * (mad + EPSILON);
        if (values[i] - med).abs() > threshold {
            out[i] = med;
        }
    }

    out
}
