//! Segment shape fingerprints.
//!
//! Each segment is resampled onto a fixed 32-point grid over normalized time,
//! z-scored and rounded to one decimal, so segments of different durations
//! with the same shape produce identical vectors.

use super::stats::z_score;
use crate::types::{HashVector, SegmentBoundary, HASH_LENGTH};

/// Computes [`HashVector`]s for segments of a normalized signal.
#[derive(Debug, Clone, Copy)]
pub struct PatternHasher {
    /// Segments no longer than this get a degenerate (constant) fingerprint
    min_segment_length: usize,
}

impl PatternHasher {
    pub fn new(min_segment_length: usize) -> Self {
        Self { min_segment_length }
    }

    pub fn compute_hash_vector(&self, signal: &[f64], boundary: &SegmentBoundary) -> HashVector {
        let end = boundary.end.min(signal.len());
        let start = boundary.start.min(end);
        let seg = &signal[start..end];

        if seg.is_empty() {
            return [0.0; HASH_LENGTH];
        }
        if seg.len() <= self.min_segment_length || seg.len() < 2 {
            return [seg[0]; HASH_LENGTH];
        }

        let last = (seg.len() - 1) as f64;
        let resampled: Vec<f64> = (0..HASH_LENGTH)
            .map(|j| {
                let pos = (j as f64 / (HASH_LENGTH - 1) as f64 * last).clamp(0.0, last);
                let lo = pos.floor() as usize;
                let hi = (lo + 1).min(seg.len() - 1);
                let frac = pos - lo as f64;
                seg[lo] + (seg[hi] - seg[lo]) * frac
            })
            .collect();

        let mut out = [0.0; HASH_LENGTH];
        for (slot, v) in out.iter_mut().zip(z_score(&resampled)) {
            *slot = round_tenth(v);
        }
        out
    }
}

fn round_tenth(v: f64) -> f64 {
    let r = (v * 10.0).round() / 10.0;
    // Collapse -0.0 so identical shapes compare and key identically
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

/// Integer key for exact-match counting of fingerprints.
pub fn hash_key(vector: &HashVector) -> [i64; HASH_LENGTH] {
    let mut key = [0_i64; HASH_LENGTH];
    for (k, v) in key.iter_mut().zip(vector) {
        *k = (v * 10.0).round() as i64;
    }
    key
}
