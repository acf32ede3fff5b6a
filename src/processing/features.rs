//! Segment feature extraction and breakpoint → boundary conversion.

use super::stats::mean;
use crate::config::defaults::{EXTREMUM_PROMINENCE, EXTREMUM_SPACING_FRACTION};
use crate::types::{SegmentBoundary, SegmentFeatures};

/// Computes [`SegmentFeatures`] over one boundary of a normalized signal.
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Extract features for `[boundary.start, boundary.end)` of `signal`.
    ///
    /// The boundary is clamped to the signal; an empty range yields default
    /// (all-zero) features carrying the supplied neighbour means.
    pub fn extract(
        signal: &[f64],
        boundary: &SegmentBoundary,
        prev_mean: f64,
        next_mean: f64,
    ) -> SegmentFeatures {
        let end = boundary.end.min(signal.len());
        let start = boundary.start.min(end);
        let seg = &signal[start..end];
        if seg.is_empty() {
            return SegmentFeatures {
                prev_mean,
                next_mean,
                ..SegmentFeatures::default()
            };
        }

        let len = seg.len();
        let duration = (len - 1) as f64;
        let m = mean(seg);
        let std = (seg.iter().map(|v| (v - m).powi(2)).sum::<f64>() / len as f64).sqrt();
        let min = seg.iter().copied().fold(f64::INFINITY, f64::min);
        let max = seg.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let energy = seg.iter().map(|v| v * v).sum::<f64>();
        let slope = if len > 1 {
            (seg[len - 1] - seg[0]) / duration
        } else {
            0.0
        };
        let (peak_count, trough_count) = count_extrema(seg);

        SegmentFeatures {
            duration,
            mean: m,
            std,
            min,
            max,
            range: max - min,
            energy,
            slope,
            peak_count,
            trough_count,
            prev_mean,
            next_mean,
        }
    }

    /// Extract features for a contiguous boundary list, wiring each segment's
    /// neighbour means. The first and last segments use their own mean for the
    /// missing neighbour.
    pub fn extract_all(signal: &[f64], boundaries: &[SegmentBoundary]) -> Vec<SegmentFeatures> {
        let means: Vec<f64> = boundaries
            .iter()
            .map(|b| {
                let end = b.end.min(signal.len());
                mean(&signal[b.start.min(end)..end])
            })
            .collect();

        boundaries
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let prev = if i > 0 { means[i - 1] } else { means[i] };
                let next = means.get(i + 1).copied().unwrap_or(means[i]);
                Self::extract(signal, b, prev, next)
            })
            .collect()
    }
}

/// Count peaks and troughs that are strict local extrema, prominent by at
/// least [`EXTREMUM_PROMINENCE`] over their neighbours' midpoint, and spaced
/// at least `max(floor(0.05 * len), 1)` samples from the previous accepted
/// extremum of either kind.
fn count_extrema(seg: &[f64]) -> (usize, usize) {
    let len = seg.len();
    if len < 3 {
        return (0, 0);
    }
    let spacing = ((EXTREMUM_SPACING_FRACTION * len as f64).floor() as usize).max(1);

    let mut peaks = 0;
    let mut troughs = 0;
    let mut last_extremum: Option<usize> = None;

    for i in 1..len - 1 {
        let (prev, cur, next) = (seg[i - 1], seg[i], seg[i + 1]);
        let prominent = (cur - 0.5 * (prev + next)).abs() >= EXTREMUM_PROMINENCE;
        if !prominent || last_extremum.is_some_and(|e| i - e < spacing) {
            continue;
        }
        if cur > prev && cur > next {
            peaks += 1;
            last_extremum = Some(i);
        } else if cur < prev && cur < next {
            troughs += 1;
            last_extremum = Some(i);
        }
    }

    (peaks, troughs)
}

/// Convert an ascending breakpoint list into contiguous boundaries over
/// `[0, sample_count)`.
///
/// A breakpoint that would close a segment of length <= 1 is skipped, so its
/// samples join the following segment; a trailing stub is folded into the
/// last segment. Fewer than 2 samples yield no boundaries.
pub fn build_segments_from_points(
    breakpoints: &[usize],
    sample_count: usize,
) -> Vec<SegmentBoundary> {
    let mut segments = Vec::new();
    if sample_count < 2 {
        return segments;
    }

    let mut start = 0;
    for &bp in breakpoints {
        let bp = bp.min(sample_count);
        if bp <= start || bp - start <= 1 {
            continue;
        }
        segments.push(SegmentBoundary::new(start, bp));
        start = bp;
    }

    if start < sample_count {
        match segments.last_mut() {
            Some(last) if sample_count - start <= 1 => last.end = sample_count,
            _ => segments.push(SegmentBoundary::new(start, sample_count)),
        }
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exhaustive(segments: &[SegmentBoundary], n: usize) {
        assert_eq!(segments.first().map(|s| s.start), Some(0));
        assert_eq!(segments.last().map(|s| s.end), Some(n));
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        for s in segments {
            assert!(s.len() > 1, "segment {s:?} too short");
        }
    }

    #[test]
    fn basic_statistics() {
        let signal = [0.0, 1.0, 2.0, 3.0, 4.0];
        let f = FeatureExtractor::extract(&signal, &SegmentBoundary::new(0, 5), -1.0, 9.0);
        assert_eq!(f.duration, 4.0);
        assert_eq!(f.mean, 2.0);
        assert_eq!(f.min, 0.0);
        assert_eq!(f.max, 4.0);
        assert_eq!(f.range, 4.0);
        assert_eq!(f.energy, 30.0);
        assert_eq!(f.slope, 1.0);
        assert!((f.std - 2.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!((f.prev_mean, f.next_mean), (-1.0, 9.0));
    }

    #[test]
    fn single_sample_has_zero_slope() {
        let f = FeatureExtractor::extract(&[3.0], &SegmentBoundary::new(0, 1), 0.0, 0.0);
        assert_eq!(f.duration, 0.0);
        assert_eq!(f.slope, 0.0);
    }

    #[test]
    fn counts_prominent_peaks_and_troughs() {
        // Alternating ±1 with a prominent peak every 4 samples
        let signal: Vec<f64> = (0..40)
            .map(|i| match i % 4 {
                1 => 1.0,
                3 => -1.0,
                _ => 0.0,
            })
            .collect();
        let f = FeatureExtractor::extract(&signal, &SegmentBoundary::new(0, 40), 0.0, 0.0);
        assert_eq!(f.peak_count, 10);
        assert_eq!(f.trough_count, 9);
    }

    #[test]
    fn small_wiggles_are_not_extrema() {
        let signal: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 0.0 } else { 0.2 }).collect();
        let f = FeatureExtractor::extract(&signal, &SegmentBoundary::new(0, 40), 0.0, 0.0);
        assert_eq!((f.peak_count, f.trough_count), (0, 0));
    }

    #[test]
    fn spacing_suppresses_close_peaks() {
        // 100 samples -> spacing 5; extremum every sample, peaks and troughs alternate
        let signal: Vec<f64> = (0..100).map(|i| if i % 2 == 1 { 1.0 } else { 0.0 }).collect();
        let f = FeatureExtractor::extract(&signal, &SegmentBoundary::new(0, 100), 0.0, 0.0);
        assert_eq!((f.peak_count, f.trough_count), (10, 10));
    }

    #[test]
    fn trough_right_after_peak_shares_spacing() {
        let mut signal = vec![0.0; 100];
        signal[10] = 2.0;
        signal[12] = -2.0;
        signal[30] = -2.0;
        let f = FeatureExtractor::extract(&signal, &SegmentBoundary::new(0, 100), 0.0, 0.0);
        assert_eq!((f.peak_count, f.trough_count), (1, 1));
    }

    #[test]
    fn extract_all_wires_neighbour_means() {
        let signal = [0.0, 0.0, 0.0, 5.0, 5.0, 5.0, 1.0, 1.0];
        let bounds = build_segments_from_points(&[3, 6, 8], signal.len());
        let feats = FeatureExtractor::extract_all(&signal, &bounds);
        assert_eq!(feats.len(), 3);
        assert_eq!(feats[0].prev_mean, 0.0);
        assert_eq!(feats[0].next_mean, 5.0);
        assert_eq!(feats[1].prev_mean, 0.0);
        assert_eq!(feats[1].next_mean, 1.0);
        assert_eq!(feats[2].next_mean, 1.0);
    }

    #[test]
    fn segments_are_contiguous_and_exhaustive() {
        let segments = build_segments_from_points(&[10, 25, 60, 100], 100);
        assert_eq!(segments.len(), 4);
        assert_exhaustive(&segments, 100);
    }

    #[test]
    fn short_segments_are_absorbed() {
        let segments = build_segments_from_points(&[1, 10, 11, 50, 99, 100], 100);
        assert_exhaustive(&segments, 100);
        assert_eq!(
            segments,
            vec![
                SegmentBoundary::new(0, 10),
                SegmentBoundary::new(10, 50),
                SegmentBoundary::new(50, 100),
            ]
        );
    }

    #[test]
    fn breakpoints_not_reaching_end_are_completed() {
        let segments = build_segments_from_points(&[40], 100);
        assert_exhaustive(&segments, 100);
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn tiny_inputs() {
        assert!(build_segments_from_points(&[1], 1).is_empty());
        assert_eq!(
            build_segments_from_points(&[2], 2),
            vec![SegmentBoundary::new(0, 2)]
        );
    }
}
