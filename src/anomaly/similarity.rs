//! Similarity of a new anomaly to stored historical anomalies.

use std::collections::HashMap;

use crate::config::defaults::HASH_COMPONENT_TOLERANCE;
use crate::config::{SimilarityWeights, TuningProfile};
use crate::types::{HistoricalAnomalyRecord, SegmentClassification, SimilarityCandidate, EPSILON};

/// `1 - differing / length`, where components further apart than the
/// tolerance (or present on one side only) differ.
pub fn hash_similarity(a: &[f64], b: &[f64]) -> f64 {
    let len = a.len().max(b.len());
    if len == 0 {
        return 0.0;
    }
    let differing = (0..len)
        .filter(|&i| match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) => (x - y).abs() > HASH_COMPONENT_TOLERANCE,
            _ => true,
        })
        .count();
    1.0 - differing as f64 / len as f64
}

/// Cosine similarity over the keys present in both maps; 0.0 with no shared
/// keys or a zero vector.
pub fn cosine_similarity(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    // Sorted so the float sums do not depend on hash order
    let mut shared: Vec<&String> = a.keys().filter(|k| b.contains_key(*k)).collect();
    shared.sort();

    let (mut dot, mut norm_a, mut norm_b) = (0.0, 0.0, 0.0);
    for key in shared {
        let (x, y) = (a[key], b[key]);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < EPSILON {
        0.0
    } else {
        dot / denom
    }
}

/// `1 - |a - b| / max(a, b)`, 0.0 when both are zero.
pub fn duration_similarity(a: f64, b: f64) -> f64 {
    let max = a.max(b);
    if max < EPSILON {
        return 0.0;
    }
    1.0 - (a - b).abs() / max
}

#[derive(Debug, Clone, Copy)]
pub struct HistoricalSimilarityScorer {
    weights: SimilarityWeights,
}

impl Default for HistoricalSimilarityScorer {
    fn default() -> Self {
        Self::new(SimilarityWeights::default())
    }
}

impl HistoricalSimilarityScorer {
    pub fn new(weights: SimilarityWeights) -> Self {
        Self { weights }
    }

    pub fn from_profile(profile: &TuningProfile) -> Self {
        Self::new(profile.similarity_weights)
    }

    /// Score one record against a query anomaly.
    pub fn score(
        &self,
        hash_vector: &[f64],
        features: &HashMap<String, f64>,
        duration: f64,
        record: &HistoricalAnomalyRecord,
    ) -> SimilarityCandidate {
        let hash = hash_similarity(hash_vector, &record.hash_vector);
        let feature = cosine_similarity(features, &record.features);
        let dur = duration_similarity(duration, record.duration());
        SimilarityCandidate {
            record: record.clone(),
            score: self.weights.hash * hash
                + self.weights.feature * feature
                + self.weights.duration * dur,
            hash_similarity: hash,
            feature_similarity: feature,
            duration_similarity: dur,
        }
    }

    /// Records scoring at least `threshold`, in input order.
    pub fn find_similar(
        &self,
        hash_vector: &[f64],
        features: &HashMap<String, f64>,
        duration: f64,
        records: &[HistoricalAnomalyRecord],
        threshold: f64,
    ) -> Vec<SimilarityCandidate> {
        records
            .iter()
            .map(|r| self.score(hash_vector, features, duration, r))
            .filter(|c| c.score >= threshold)
            .collect()
    }

    /// [`find_similar`](Self::find_similar) for a classified segment.
    pub fn find_similar_to_segment(
        &self,
        segment: &SegmentClassification,
        records: &[HistoricalAnomalyRecord],
        threshold: f64,
    ) -> Vec<SimilarityCandidate> {
        self.find_similar(
            &segment.hash_vector,
            &segment.features.to_map(),
            segment.features.duration,
            records,
            threshold,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SegmentBoundary, SegmentLabel};
    use chrono::Utc;

    fn record(hash: Vec<f64>, features: &[(&str, f64)]) -> HistoricalAnomalyRecord {
        HistoricalAnomalyRecord {
            parameter: "egt".into(),
            boundary: SegmentBoundary::new(100, 141),
            label: SegmentLabel::SpikeHigh,
            hash_vector: hash,
            features: features.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
            created_at: Utc::now(),
        }
    }

    fn ramp_hash() -> Vec<f64> {
        (0..32).map(|i| f64::from(i) / 10.0 - 1.6).collect()
    }

    #[test]
    fn self_comparison_scores_one() {
        let r = record(ramp_hash(), &[("duration", 40.0), ("mean", 1.2), ("range", 3.0)]);
        let scored = HistoricalSimilarityScorer::default().score(
            &r.hash_vector,
            &r.features,
            r.duration(),
            &r,
        );
        assert!((scored.score - 1.0).abs() < 1e-9, "{}", scored.score);
    }

    #[test]
    fn hash_similarity_counts_differences() {
        let a = ramp_hash();
        let mut b = a.clone();
        b[0] += 0.0005;
        b[1] += 0.5;
        b[2] -= 0.1;
        assert!((hash_similarity(&a, &b) - (1.0 - 2.0 / 32.0)).abs() < 1e-12);
        // Length mismatch counts the missing tail as different
        assert!((hash_similarity(&a, &a[..16]) - 0.5).abs() < 1e-12);
        assert_eq!(hash_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn cosine_uses_shared_keys_only() {
        let a: HashMap<String, f64> =
            [("mean".to_string(), 1.0), ("std".to_string(), 0.0)].into();
        let b: HashMap<String, f64> =
            [("mean".to_string(), 5.0), ("slope".to_string(), 9.0)].into();
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-12);
        let c: HashMap<String, f64> = [("energy".to_string(), 1.0)].into();
        assert_eq!(cosine_similarity(&a, &c), 0.0);
    }

    #[test]
    fn duration_similarity_edges() {
        assert_eq!(duration_similarity(0.0, 0.0), 0.0);
        assert!((duration_similarity(50.0, 100.0) - 0.5).abs() < 1e-12);
        assert_eq!(duration_similarity(30.0, 30.0), 1.0);
    }

    #[test]
    fn threshold_filters_and_keeps_order() {
        let query = record(ramp_hash(), &[("duration", 40.0), ("mean", 1.0)]);
        let mut far_hash = ramp_hash();
        far_hash.iter_mut().take(20).for_each(|v| *v += 1.0);
        let records = vec![
            record(ramp_hash(), &[("duration", 40.0), ("mean", 1.0)]),
            record(far_hash, &[("duration", 40.0), ("mean", 1.0)]),
            record(ramp_hash(), &[("duration", 20.0), ("mean", 1.0)]),
        ];
        let found = HistoricalSimilarityScorer::default().find_similar(
            &query.hash_vector,
            &query.features,
            40.0,
            &records,
            0.8,
        );
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].record.features["duration"], 40.0);
        assert_eq!(found[1].record.features["duration"], 20.0);
        assert!(found[0].score > found[1].score);
    }

    #[test]
    fn weights_come_from_profile() {
        let profile = TuningProfile {
            similarity_weights: SimilarityWeights {
                hash: 0.0,
                feature: 0.0,
                duration: 1.0,
            },
            ..TuningProfile::cruising()
        };
        let r = record(vec![9.0; 32], &[("duration", 10.0)]);
        let scored = HistoricalSimilarityScorer::from_profile(&profile).score(
            &ramp_hash(),
            &HashMap::new(),
            10.0,
            &r,
        );
        assert_eq!(scored.score, 1.0);
        assert_eq!(scored.hash_similarity, 0.0);
    }
}
