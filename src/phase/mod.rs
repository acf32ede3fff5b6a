//! Flight phase detection
//!
//! Heuristic search over the merged, classified segments of a full flight for
//! the end of takeoff and the start of landing. The cruise reference is the
//! longest stable segment in the middle of the flight; takeoff ends at the
//! first early stable segment that has climbed most of the way to it, and
//! landing starts where the last long stable segment hands over to a descent.
//!
//! Inconsistent results (missing indices, or landing not clearly after
//! takeoff) fall back to fixed fractions of the flight length.

use tracing::{debug, warn};

use crate::config::PhaseConfig;
use crate::processing::stats::median;
use crate::types::{FlightPhaseIndexes, SegmentClassification, SegmentLabel, EPSILON};

/// Mean and standard deviation of the cruise reference segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CruiseStats {
    pub mean: f64,
    pub std: f64,
}

/// Slope limits derived from the flight's median absolute slope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlopeThresholds {
    pub stable: f64,
    pub climb: f64,
    pub descent: f64,
}

impl SlopeThresholds {
    pub fn from_segments(segments: &[SegmentClassification], config: &PhaseConfig) -> Self {
        let abs_slopes: Vec<f64> = segments.iter().map(|s| s.features.slope.abs()).collect();
        let median_abs = median(&abs_slopes);
        let stable = (median_abs * config.stable_slope_factor).max(EPSILON);
        let climb = (median_abs * config.climb_slope_factor).max(stable * 2.0);
        Self {
            stable,
            climb,
            descent: climb,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FlightPhaseDetector<'c> {
    config: &'c PhaseConfig,
}

impl<'c> FlightPhaseDetector<'c> {
    pub fn new(config: &'c PhaseConfig) -> Self {
        Self { config }
    }

    /// Detect takeoff-end and landing-start over `segments`, which must be
    /// contiguous and ordered. Always returns `landing_start > takeoff_end`.
    pub fn detect(&self, segments: &[SegmentClassification]) -> FlightPhaseIndexes {
        let Some(last) = segments.last() else {
            return self.fallback(0, "no segments");
        };
        let flight_end = last.boundary.end;

        let cruise = self.cruise_stats(segments, flight_end);
        let baseline = segments[0].features.mean;
        let slopes = SlopeThresholds::from_segments(segments, self.config);

        let takeoff = self.takeoff_end(segments, flight_end, cruise, baseline, &slopes);
        let landing = self.landing_start(segments, flight_end, cruise, &slopes);

        debug!(
            flight_end,
            ?cruise,
            ?takeoff,
            ?landing,
            stable_slope = slopes.stable,
            climb_slope = slopes.climb,
            "Phase candidates"
        );

        match (takeoff, landing) {
            (Some(takeoff_end), Some(landing_start))
                if landing_start > takeoff_end + self.config.min_phase_gap =>
            {
                FlightPhaseIndexes {
                    takeoff_end,
                    landing_start,
                    fallback: false,
                }
            }
            (Some(_), Some(_)) => self.fallback(flight_end, "takeoff and landing too close"),
            (None, _) => self.fallback(flight_end, "no takeoff end found"),
            (_, None) => self.fallback(flight_end, "no landing start found"),
        }
    }

    /// Longest stable segment overlapping the middle window, if any.
    pub fn cruise_stats(
        &self,
        segments: &[SegmentClassification],
        flight_end: usize,
    ) -> Option<CruiseStats> {
        let lo = self.config.cruise_window_start * flight_end as f64;
        let hi = self.config.cruise_window_end * flight_end as f64;

        let mut best: Option<&SegmentClassification> = None;
        for seg in segments {
            let overlaps = (seg.boundary.start as f64) <= hi && (seg.boundary.end as f64) >= lo;
            if !seg.label.is_stable() || !overlaps {
                continue;
            }
            if best.map_or(true, |b| seg.features.duration > b.features.duration) {
                best = Some(seg);
            }
        }

        best.map(|s| CruiseStats {
            mean: s.features.mean,
            std: s.features.std,
        })
    }

    fn takeoff_end(
        &self,
        segments: &[SegmentClassification],
        flight_end: usize,
        cruise: Option<CruiseStats>,
        baseline: f64,
        slopes: &SlopeThresholds,
    ) -> Option<usize> {
        let limit = self.config.takeoff_search_fraction * flight_end as f64;
        let early = || segments.iter().filter(move |s| s.boundary.start as f64 <= limit);

        if let Some(cruise) = cruise {
            let tolerance = self.config.cruise_std_tolerance * cruise.std.max(EPSILON);
            let rise = cruise.mean - baseline;
            let found = early().find(|s| {
                let f = &s.features;
                let risen = rise.abs() < EPSILON
                    || (f.mean - baseline) / rise >= self.config.takeoff_rise_fraction;
                s.label.is_stable()
                    && f.duration >= self.config.min_takeoff_stable_duration
                    && f.slope.abs() <= slopes.stable
                    && (f.mean - cruise.mean).abs() <= tolerance
                    && risen
            });
            if let Some(seg) = found {
                return Some(seg.boundary.start);
            }
        }

        strongest(early().filter(|s| s.features.slope > 0.0)).map(|s| s.boundary.end)
    }

    /// Start of landing, or `None` when no long stable segment ends in the
    /// late window.
    fn landing_start(
        &self,
        segments: &[SegmentClassification],
        flight_end: usize,
        cruise: Option<CruiseStats>,
        slopes: &SlopeThresholds,
    ) -> Option<usize> {
        let limit = self.config.landing_search_fraction * flight_end as f64;
        let (i, stable) = segments.iter().enumerate().rev().find(|(_, s)| {
            s.boundary.end as f64 >= limit
                && s.label.is_stable()
                && s.features.duration >= self.config.min_cruise_stable_duration
                && s.features.slope.abs() <= slopes.stable
        })?;

        let Some(next) = segments.get(i + 1) else {
            return Some(stable.boundary.end);
        };
        let dropped = cruise.is_some_and(|c| {
            next.features.mean <= c.mean - self.config.descent_drop_std * c.std.max(EPSILON)
        });
        let descending = next.label == SegmentLabel::RampDown
            || next.features.slope <= -slopes.descent
            || dropped;
        Some(if descending {
            next.boundary.start
        } else {
            stable.boundary.end
        })
    }

    /// Fixed-fraction indices, widened to keep landing strictly after takeoff.
    fn fallback(&self, flight_end: usize, reason: &str) -> FlightPhaseIndexes {
        let at = |fraction: f64| (fraction * flight_end as f64).floor() as usize;
        let takeoff_end = at(self.config.fallback_takeoff_fraction);
        let landing_start = at(self.config.fallback_landing_fraction).max(takeoff_end + 1);
        warn!(
            flight_end,
            takeoff_end, landing_start, reason, "Phase detection fell back to fixed fractions"
        );
        FlightPhaseIndexes {
            takeoff_end,
            landing_start,
            fallback: true,
        }
    }
}

/// Segment with the greatest `|slope| × duration × range`, first on ties.
fn strongest<'a>(
    segments: impl Iterator<Item = &'a SegmentClassification>,
) -> Option<&'a SegmentClassification> {
    let mut best: Option<(&SegmentClassification, f64)> = None;
    for seg in segments {
        let f = &seg.features;
        let score = f.slope.abs() * f.duration * f.range;
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((seg, score));
        }
    }
    best.map(|(seg, _)| seg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SegmentBoundary, SegmentFeatures, HASH_LENGTH};

    fn seg(
        start: usize,
        end: usize,
        label: SegmentLabel,
        mean: f64,
        std: f64,
        slope: f64,
    ) -> SegmentClassification {
        let duration = (end - start - 1) as f64;
        let range = (slope * duration).abs().max(std * 2.0);
        SegmentClassification {
            boundary: SegmentBoundary::new(start, end),
            label,
            features: SegmentFeatures {
                duration,
                mean,
                std,
                range,
                slope,
                ..SegmentFeatures::default()
            },
            hash_vector: [0.0; HASH_LENGTH],
        }
    }

    /// ground → climb → cruise → descent → ground over 3000 samples
    fn typical_flight() -> Vec<SegmentClassification> {
        vec![
            seg(0, 200, SegmentLabel::Steady, -1.5, 0.02, 0.0),
            seg(200, 500, SegmentLabel::RampUp, -0.5, 0.6, 0.01),
            seg(500, 2400, SegmentLabel::Steady, 0.8, 0.05, 0.0),
            seg(2400, 2800, SegmentLabel::RampDown, -0.3, 0.6, -0.008),
            seg(2800, 3000, SegmentLabel::Steady, -1.5, 0.02, 0.0),
        ]
    }

    #[test]
    fn detects_typical_flight() {
        let config = PhaseConfig::default();
        let phases = FlightPhaseDetector::new(&config).detect(&typical_flight());
        assert!(!phases.fallback);
        assert_eq!(phases.takeoff_end, 500);
        assert_eq!(phases.landing_start, 2400);
    }

    #[test]
    fn cruise_is_longest_stable_mid_segment() {
        let config = PhaseConfig::default();
        let stats = FlightPhaseDetector::new(&config)
            .cruise_stats(&typical_flight(), 3000)
            .unwrap();
        assert_eq!(stats.mean, 0.8);
        assert_eq!(stats.std, 0.05);
    }

    #[test]
    fn landing_uses_stable_end_without_descent() {
        let config = PhaseConfig::default();
        let mut flight = typical_flight();
        // Segment after cruise neither ramps down nor drops
        flight[3] = seg(2400, 2800, SegmentLabel::Oscillation, 0.8, 0.3, 0.0);
        flight[4] = seg(2800, 3000, SegmentLabel::SpikeHigh, 1.5, 0.3, 0.0);
        let phases = FlightPhaseDetector::new(&config).detect(&flight);
        assert_eq!(phases.landing_start, 2400);

        // Short cruise in the late window: landing starts at its end
        let flight = vec![
            seg(0, 200, SegmentLabel::Steady, -1.5, 0.02, 0.0),
            seg(200, 500, SegmentLabel::RampUp, -0.5, 0.6, 0.01),
            seg(500, 2300, SegmentLabel::Steady, 0.8, 0.05, 0.0),
            seg(2300, 3000, SegmentLabel::Oscillation, 0.8, 0.3, 0.0),
        ];
        let phases = FlightPhaseDetector::new(&config).detect(&flight);
        assert_eq!(phases.landing_start, 2300);
    }

    #[test]
    fn takeoff_falls_back_to_strongest_climb() {
        let config = PhaseConfig::default();
        let flight = vec![
            seg(0, 100, SegmentLabel::RampUp, -1.0, 0.3, 0.005),
            seg(100, 400, SegmentLabel::RampUp, 0.0, 0.6, 0.01),
            // Too short to qualify as a stable takeoff end
            seg(400, 480, SegmentLabel::Steady, 0.8, 0.05, 0.0),
            seg(480, 1850, SegmentLabel::Oscillation, 0.8, 0.4, 0.0),
            seg(1850, 2500, SegmentLabel::Steady, 0.8, 0.05, 0.0),
            seg(2500, 3000, SegmentLabel::RampDown, -0.5, 0.6, -0.008),
        ];
        let phases = FlightPhaseDetector::new(&config).detect(&flight);
        assert!(!phases.fallback);
        assert_eq!(phases.takeoff_end, 400);
        assert_eq!(phases.landing_start, 2500);
    }

    #[test]
    fn missing_late_stable_segment_falls_back_to_fractions() {
        let config = PhaseConfig::default();
        let flight = vec![
            seg(0, 200, SegmentLabel::Steady, -1.5, 0.02, 0.0),
            seg(200, 500, SegmentLabel::RampUp, -0.5, 0.6, 0.01),
            seg(500, 2000, SegmentLabel::Steady, 0.8, 0.05, 0.0),
            // Descent starts before the late window; nothing stable after it
            seg(2000, 2500, SegmentLabel::RampDown, -0.3, 0.6, -0.008),
            seg(2500, 3000, SegmentLabel::Oscillation, -1.5, 0.4, 0.0),
        ];
        let phases = FlightPhaseDetector::new(&config).detect(&flight);
        assert!(phases.fallback);
        assert_eq!((phases.takeoff_end, phases.landing_start), (600, 2400));
    }

    #[test]
    fn close_indices_fall_back_to_fractions() {
        let config = PhaseConfig {
            min_phase_gap: 5000,
            ..PhaseConfig::default()
        };
        let phases = FlightPhaseDetector::new(&config).detect(&typical_flight());
        assert!(phases.fallback);
        assert_eq!(phases.takeoff_end, 600);
        assert_eq!(phases.landing_start, 2400);
    }

    #[test]
    fn no_segments_or_flat_flight_fall_back() {
        let config = PhaseConfig::default();
        let detector = FlightPhaseDetector::new(&config);

        let empty = detector.detect(&[]);
        assert!(empty.fallback);
        assert!(empty.landing_start > empty.takeoff_end);

        // Too short for a landing-side stable segment
        let flat = detector.detect(&[seg(0, 100, SegmentLabel::Steady, 0.0, 0.0, 0.0)]);
        assert!(flat.fallback);
        assert_eq!((flat.takeoff_end, flat.landing_start), (20, 80));
    }

    #[test]
    fn slope_thresholds_floor() {
        let config = PhaseConfig::default();
        let flat = [seg(0, 10, SegmentLabel::Steady, 0.0, 0.0, 0.0)];
        let t = SlopeThresholds::from_segments(&flat, &config);
        assert_eq!(t.stable, EPSILON);
        assert_eq!(t.climb, 2.0 * EPSILON);
    }
}
