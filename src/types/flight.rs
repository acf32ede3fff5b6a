//! Flight-level types: phases, tuning categories, historical anomalies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::{SegmentBoundary, SegmentLabel};

/// Takeoff-end and landing-start sample indices for one flight.
///
/// `landing_start > takeoff_end` always holds; the detector falls back to
/// fixed fractions of the flight length when detection cannot guarantee it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightPhaseIndexes {
    pub takeoff_end: usize,
    pub landing_start: usize,
    /// True when the fractional fallback replaced detected indices
    #[serde(default)]
    pub fallback: bool,
}

impl FlightPhaseIndexes {
    /// Sample ranges of takeoff, cruise and landing over a flight of `len` samples.
    pub fn phase_ranges(&self, len: usize) -> [(FlightPhase, SegmentBoundary); 3] {
        let takeoff_end = self.takeoff_end.min(len);
        let landing_start = self.landing_start.clamp(takeoff_end, len);
        [
            (FlightPhase::Takeoff, SegmentBoundary::new(0, takeoff_end)),
            (
                FlightPhase::Cruise,
                SegmentBoundary::new(takeoff_end, landing_start),
            ),
            (FlightPhase::Landing, SegmentBoundary::new(landing_start, len)),
        ]
    }
}

/// One of the three flight phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightPhase {
    Takeoff,
    Cruise,
    Landing,
}

impl FlightPhase {
    /// Tuning category used when re-segmenting this phase.
    pub const fn category(&self) -> PhaseCategory {
        match self {
            Self::Takeoff | Self::Landing => PhaseCategory::TakeoffLanding,
            Self::Cruise => PhaseCategory::Cruising,
        }
    }
}

impl fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Takeoff => write!(f, "takeoff"),
            Self::Cruise => write!(f, "cruise"),
            Self::Landing => write!(f, "landing"),
        }
    }
}

/// Key used to look up a tuning profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseCategory {
    TakeoffLanding,
    Cruising,
    FullFlight,
}

impl fmt::Display for PhaseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TakeoffLanding => write!(f, "takeoff_landing"),
            Self::Cruising => write!(f, "cruising"),
            Self::FullFlight => write!(f, "full_flight"),
        }
    }
}

/// Anomaly stored by a previous analysis, supplied read-only by the storage
/// layer already filtered by parameter and label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalAnomalyRecord {
    pub parameter: String,
    pub boundary: SegmentBoundary,
    pub label: SegmentLabel,
    pub hash_vector: Vec<f64>,
    #[serde(default)]
    pub features: HashMap<String, f64>,
    pub created_at: DateTime<Utc>,
}

impl HistoricalAnomalyRecord {
    /// Stored duration feature, or the boundary span when it is absent.
    pub fn duration(&self) -> f64 {
        self.features
            .get("duration")
            .copied()
            .unwrap_or_else(|| self.boundary.len().saturating_sub(1) as f64)
    }
}

/// Historical record that scored at or above the caller's threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityCandidate {
    pub record: HistoricalAnomalyRecord,
    pub score: f64,
    pub hash_similarity: f64,
    pub feature_similarity: f64,
    pub duration_similarity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_ranges_cover_flight() {
        let phases = FlightPhaseIndexes {
            takeoff_end: 20,
            landing_start: 80,
            fallback: false,
        };
        let ranges = phases.phase_ranges(100);
        assert_eq!(ranges[0].1, SegmentBoundary::new(0, 20));
        assert_eq!(ranges[1].1, SegmentBoundary::new(20, 80));
        assert_eq!(ranges[2].1, SegmentBoundary::new(80, 100));
    }

    #[test]
    fn phase_ranges_clamp_to_length() {
        let phases = FlightPhaseIndexes {
            takeoff_end: 50,
            landing_start: 200,
            fallback: false,
        };
        let ranges = phases.phase_ranges(60);
        assert_eq!(ranges[1].1, SegmentBoundary::new(50, 60));
        assert!(ranges[2].1.is_empty());
    }

    #[test]
    fn record_duration_falls_back_to_boundary() {
        let record = HistoricalAnomalyRecord {
            parameter: "egt".into(),
            boundary: SegmentBoundary::new(10, 21),
            label: SegmentLabel::SpikeHigh,
            hash_vector: vec![0.0; 32],
            features: HashMap::new(),
            created_at: Utc::now(),
        };
        assert!((record.duration() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn phase_categories() {
        assert_eq!(FlightPhase::Takeoff.category(), PhaseCategory::TakeoffLanding);
        assert_eq!(FlightPhase::Cruise.category(), PhaseCategory::Cruising);
        assert_eq!(PhaseCategory::FullFlight.to_string(), "full_flight");
    }
}
