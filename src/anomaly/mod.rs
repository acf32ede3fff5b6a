//! Anomaly candidate selection and historical similarity
//!
//! - `AnomalyDetector`: rare-label, size and pattern-support filtering of
//!   classified segments, followed by temporal de-duplication
//! - `similarity`: weighted comparison of an anomaly against stored ones

mod similarity;

pub use similarity::{
    cosine_similarity, duration_similarity, hash_similarity, HistoricalSimilarityScorer,
};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::config::TuningProfile;
use crate::processing::hash_key;
use crate::types::{SegmentClassification, SegmentLabel, TimeSeries, HASH_LENGTH};

/// Occurrence count and covered samples of one label.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LabelStats {
    pub count: usize,
    pub samples: usize,
    /// Share of the analysed span covered by this label
    pub time_share: f64,
}

/// Per-label statistics over a contiguous segment list.
pub fn label_stats(segments: &[SegmentClassification]) -> BTreeMap<SegmentLabel, LabelStats> {
    let total: usize = segments.iter().map(|s| s.boundary.len()).sum();
    let mut stats: BTreeMap<SegmentLabel, LabelStats> = BTreeMap::new();
    for seg in segments {
        let entry = stats.entry(seg.label).or_default();
        entry.count += 1;
        entry.samples += seg.boundary.len();
    }
    for entry in stats.values_mut() {
        entry.time_share = if total == 0 {
            0.0
        } else {
            entry.samples as f64 / total as f64
        };
    }
    stats
}

/// Number of other segments sharing each segment's exact fingerprint.
pub fn pattern_support(segments: &[SegmentClassification]) -> Vec<usize> {
    let keys: Vec<[i64; HASH_LENGTH]> = segments
        .iter()
        .map(|s| hash_key(&s.hash_vector))
        .collect();
    let mut occurrences: HashMap<&[i64; HASH_LENGTH], usize> = HashMap::new();
    for key in &keys {
        *occurrences.entry(key).or_default() += 1;
    }
    keys.iter()
        .map(|k| occurrences.get(k).copied().unwrap_or(1) - 1)
        .collect()
}

/// Selects anomalous segments under one tuning profile.
#[derive(Debug, Clone, Copy)]
pub struct AnomalyDetector<'p> {
    profile: &'p TuningProfile,
}

impl<'p> AnomalyDetector<'p> {
    pub fn new(profile: &'p TuningProfile) -> Self {
        Self { profile }
    }

    /// Non-baseline labels that are infrequent or cover little of the span.
    pub fn rare_labels(&self, segments: &[SegmentClassification]) -> BTreeSet<SegmentLabel> {
        label_stats(segments)
            .into_iter()
            .filter(|(label, s)| {
                !label.is_baseline()
                    && (s.count <= self.profile.rare_label_max_count
                        || s.time_share <= self.profile.rare_label_max_time_fraction)
            })
            .map(|(label, _)| label)
            .collect()
    }

    /// Indices (ascending, unique) of anomalous `segments`.
    ///
    /// `series` supplies the time axis for de-duplication; segment
    /// boundaries index into it.
    pub fn detect(&self, series: &TimeSeries, segments: &[SegmentClassification]) -> Vec<usize> {
        let rare = self.rare_labels(segments);
        let support = pattern_support(segments);

        let mut candidates: Vec<(f64, usize)> = segments
            .iter()
            .enumerate()
            .filter(|(i, s)| {
                let f = &s.features;
                f.duration >= self.profile.min_segment_duration
                    && f.range >= self.profile.min_segment_range
                    && support[*i] < self.profile.pattern_support_threshold
                    && (rare.contains(&s.label) || !s.label.is_baseline())
            })
            .map(|(i, s)| (series.midpoint_time(&s.boundary), i))
            .collect();

        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut kept = Vec::with_capacity(candidates.len());
        let mut last_mid: Option<f64> = None;
        for (mid, i) in &candidates {
            if last_mid.map_or(true, |m| mid - m >= self.profile.min_gap_seconds) {
                kept.push(*i);
                last_mid = Some(*mid);
            }
        }
        kept.sort_unstable();
        kept.dedup();

        debug!(
            segments = segments.len(),
            rare_labels = rare.len(),
            candidates = candidates.len(),
            kept = kept.len(),
            "Anomaly selection complete"
        );
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SegmentBoundary, SegmentFeatures};

    fn seg(
        start: usize,
        end: usize,
        label: SegmentLabel,
        range: f64,
        shape: f64,
    ) -> SegmentClassification {
        let mut hash_vector = [0.0; HASH_LENGTH];
        hash_vector[0] = shape;
        SegmentClassification {
            boundary: SegmentBoundary::new(start, end),
            label,
            features: SegmentFeatures {
                duration: (end - start - 1) as f64,
                range,
                ..SegmentFeatures::default()
            },
            hash_vector,
        }
    }

    fn profile() -> TuningProfile {
        TuningProfile {
            rare_label_max_count: 1,
            rare_label_max_time_fraction: 0.05,
            min_segment_duration: 10.0,
            min_segment_range: 0.5,
            pattern_support_threshold: 2,
            min_gap_seconds: 100.0,
            ..TuningProfile::full_flight()
        }
    }

    #[test]
    fn label_stats_counts_and_shares() {
        let segments = vec![
            seg(0, 50, SegmentLabel::Steady, 0.1, 0.0),
            seg(50, 75, SegmentLabel::SpikeHigh, 2.0, 1.0),
            seg(75, 100, SegmentLabel::Steady, 0.1, 0.0),
        ];
        let stats = label_stats(&segments);
        assert_eq!(stats[&SegmentLabel::Steady].count, 2);
        assert_eq!(stats[&SegmentLabel::Steady].samples, 75);
        assert!((stats[&SegmentLabel::SpikeHigh].time_share - 0.25).abs() < 1e-12);
    }

    #[test]
    fn baseline_labels_are_never_rare() {
        let p = profile();
        let segments = vec![
            seg(0, 500, SegmentLabel::Steady, 0.1, 0.0),
            seg(500, 510, SegmentLabel::PatternOK, 0.1, 0.5),
            seg(510, 530, SegmentLabel::SpikeLow, 1.0, 1.0),
        ];
        let rare = AnomalyDetector::new(&p).rare_labels(&segments);
        assert_eq!(rare.into_iter().collect::<Vec<_>>(), vec![SegmentLabel::SpikeLow]);
    }

    #[test]
    fn pattern_support_counts_duplicates() {
        let segments = vec![
            seg(0, 10, SegmentLabel::Oscillation, 1.0, 1.0),
            seg(10, 20, SegmentLabel::Oscillation, 1.0, 1.0),
            seg(20, 30, SegmentLabel::Oscillation, 1.0, 2.0),
            seg(30, 40, SegmentLabel::Oscillation, 1.0, 1.0),
        ];
        assert_eq!(pattern_support(&segments), vec![2, 2, 0, 2]);
    }

    #[test]
    fn filters_small_flat_and_common_segments() {
        let p = profile();
        let segments = vec![
            seg(0, 200, SegmentLabel::Steady, 0.1, 0.0),
            // too short
            seg(200, 205, SegmentLabel::SpikeHigh, 3.0, 1.0),
            seg(205, 400, SegmentLabel::Steady, 0.1, 0.0),
            // too flat
            seg(400, 450, SegmentLabel::RampUp, 0.2, 2.0),
            // kept
            seg(450, 500, SegmentLabel::SpikeHigh, 3.0, 3.0),
            seg(500, 800, SegmentLabel::Steady, 0.1, 0.0),
            // repeated shape: support 2 >= threshold
            seg(800, 850, SegmentLabel::Oscillation, 1.0, 4.0),
            seg(850, 900, SegmentLabel::Oscillation, 1.0, 4.0),
            seg(900, 950, SegmentLabel::Oscillation, 1.0, 4.0),
        ];
        let series = TimeSeries::from_values(vec![0.0; 950]);
        let found = AnomalyDetector::new(&p).detect(&series, &segments);
        assert_eq!(found, vec![4]);
    }

    #[test]
    fn nearby_candidates_are_deduplicated() {
        let p = profile();
        let segments = vec![
            seg(0, 20, SegmentLabel::SpikeHigh, 2.0, 1.0),
            seg(20, 40, SegmentLabel::SpikeLow, 2.0, 2.0),
            seg(40, 300, SegmentLabel::Steady, 0.1, 0.0),
            seg(300, 320, SegmentLabel::AboveBound, 2.0, 3.0),
        ];
        let series = TimeSeries::from_values(vec![0.0; 320]);
        let found = AnomalyDetector::new(&p).detect(&series, &segments);
        // midpoints 9.5, 29.5, 309.5: the second is within 100 s of the first
        assert_eq!(found, vec![0, 3]);
    }

    #[test]
    fn dedup_uses_caller_time_axis() {
        let p = profile();
        let segments = vec![
            seg(0, 20, SegmentLabel::SpikeHigh, 2.0, 1.0),
            seg(20, 40, SegmentLabel::SpikeLow, 2.0, 2.0),
        ];
        // 10 s sampling: midpoints 95 s and 295 s
        let time: Vec<f64> = (0..40).map(|i| f64::from(i) * 10.0).collect();
        let series = TimeSeries::new(time, vec![0.0; 40]).unwrap();
        let found = AnomalyDetector::new(&p).detect(&series, &segments);
        assert_eq!(found, vec![0, 1]);
    }

    #[test]
    fn empty_input() {
        let p = profile();
        let series = TimeSeries::from_values(Vec::new());
        assert!(AnomalyDetector::new(&p).detect(&series, &[]).is_empty());
    }
}
