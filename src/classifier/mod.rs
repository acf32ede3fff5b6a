//! Segment classification
//!
//! - `model`: JSON decision-forest loading and inference
//! - `SegmentClassifier`: labels boundaries, merges equal-label neighbours and
//!   fingerprints the merged segments

mod model;

pub use model::{DecisionForest, ModelError, RawForest, RawTree, LEAF};

use tracing::debug;

use crate::processing::{FeatureExtractor, PatternHasher};
use crate::types::{SegmentBoundary, SegmentClassification, SegmentLabel};

/// Labels the segments of one normalized signal with a shared forest.
#[derive(Debug, Clone, Copy)]
pub struct SegmentClassifier<'m> {
    model: &'m DecisionForest,
    hasher: PatternHasher,
}

impl<'m> SegmentClassifier<'m> {
    /// `min_segment_length` is handed to the [`PatternHasher`].
    pub fn new(model: &'m DecisionForest, min_segment_length: usize) -> Self {
        Self {
            model,
            hasher: PatternHasher::new(min_segment_length),
        }
    }

    pub fn model(&self) -> &DecisionForest {
        self.model
    }

    /// Classify contiguous `boundaries` of `signal`.
    ///
    /// Adjacent segments with equal predicted labels are merged, then
    /// features and fingerprints are recomputed over the merged extents, so
    /// no two neighbours in the output share a label.
    pub fn classify_segments(
        &self,
        signal: &[f64],
        boundaries: &[SegmentBoundary],
    ) -> Vec<SegmentClassification> {
        if boundaries.is_empty() {
            return Vec::new();
        }

        let labels: Vec<SegmentLabel> = FeatureExtractor::extract_all(signal, boundaries)
            .iter()
            .map(|f| self.model.predict_label(f))
            .collect();

        let merged = merge_adjacent(boundaries, &labels);
        debug!(
            segments = boundaries.len(),
            merged = merged.len(),
            "Segments classified"
        );

        let merged_bounds: Vec<SegmentBoundary> = merged.iter().map(|(b, _)| *b).collect();
        let features = FeatureExtractor::extract_all(signal, &merged_bounds);

        merged
            .into_iter()
            .zip(features)
            .map(|((boundary, label), features)| SegmentClassification {
                boundary,
                label,
                features,
                hash_vector: self.hasher.compute_hash_vector(signal, &boundary),
            })
            .collect()
    }
}

/// Collapse runs of equal labels into single boundaries spanning the run.
pub fn merge_adjacent(
    boundaries: &[SegmentBoundary],
    labels: &[SegmentLabel],
) -> Vec<(SegmentBoundary, SegmentLabel)> {
    let mut merged: Vec<(SegmentBoundary, SegmentLabel)> = Vec::with_capacity(boundaries.len());
    for (boundary, label) in boundaries.iter().zip(labels) {
        match merged.last_mut() {
            Some((prev, prev_label)) if prev_label == label => *prev = prev.union(boundary),
            _ => merged.push((*boundary, *label)),
        }
    }
    merged
}
