//! Segment-level types: boundaries, features, labels and classifications.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Number of components in a segment shape fingerprint.
pub const HASH_LENGTH: usize = 32;

/// Fixed-length, length-independent shape fingerprint of one segment.
pub type HashVector = [f64; HASH_LENGTH];

/// Half-open index range `[start, end)` over one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentBoundary {
    pub start: usize,
    pub end: usize,
}

impl SegmentBoundary {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Midpoint in index units.
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.start + self.end) as f64
    }

    /// Shift both ends by `offset` (used when mapping phase-local boundaries
    /// back into flight coordinates).
    pub const fn offset(&self, offset: usize) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }

    /// Union of two adjacent boundaries.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Behaviour label assigned to a segment by the decision forest.
///
/// The set is closed; labels coming from a model file that do not match one
/// of these names map to [`SegmentLabel::Unclassified`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SegmentLabel {
    PatternOK,
    Steady,
    Neutral,
    RampUp,
    RampDown,
    SpikeHigh,
    SpikeLow,
    Oscillation,
    AboveBound,
    BelowBound,
    Unclassified,
}

impl SegmentLabel {
    pub const ALL: [Self; 11] = [
        Self::PatternOK,
        Self::Steady,
        Self::Neutral,
        Self::RampUp,
        Self::RampDown,
        Self::SpikeHigh,
        Self::SpikeLow,
        Self::Oscillation,
        Self::AboveBound,
        Self::BelowBound,
        Self::Unclassified,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PatternOK => "PatternOK",
            Self::Steady => "Steady",
            Self::Neutral => "Neutral",
            Self::RampUp => "RampUp",
            Self::RampDown => "RampDown",
            Self::SpikeHigh => "SpikeHigh",
            Self::SpikeLow => "SpikeLow",
            Self::Oscillation => "Oscillation",
            Self::AboveBound => "AboveBound",
            Self::BelowBound => "BelowBound",
            Self::Unclassified => "Unclassified",
        }
    }

    /// Parse a label string emitted by the model.
    ///
    /// Matching is exact first, then case-insensitive. Anything else is a
    /// classification miss and becomes `Unclassified`.
    pub fn from_model_label(raw: &str) -> Self {
        let trimmed = raw.trim();
        Self::ALL
            .iter()
            .find(|l| l.as_str() == trimmed)
            .or_else(|| {
                Self::ALL
                    .iter()
                    .find(|l| l.as_str().eq_ignore_ascii_case(trimmed))
            })
            .copied()
            .unwrap_or(Self::Unclassified)
    }

    /// Labels that describe normal behaviour and are never anomalies.
    pub const fn is_baseline(&self) -> bool {
        matches!(self, Self::PatternOK | Self::Steady | Self::Neutral)
    }

    /// Labels the phase detector treats as level flight / stable plateau.
    pub const fn is_stable(&self) -> bool {
        matches!(self, Self::Steady | Self::Neutral)
    }
}

impl fmt::Display for SegmentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature names in the order the extractor reports them.
pub const FEATURE_NAMES: [&str; 12] = [
    "duration",
    "mean",
    "std",
    "min",
    "max",
    "range",
    "energy",
    "slope",
    "peak_count",
    "trough_count",
    "prev_mean",
    "next_mean",
];

/// Per-segment statistics in the normalized signal domain.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SegmentFeatures {
    /// `(end - 1) - start`, in samples
    pub duration: f64,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    /// Sum of squares over the segment
    pub energy: f64,
    pub slope: f64,
    pub peak_count: usize,
    pub trough_count: usize,
    pub prev_mean: f64,
    pub next_mean: f64,
}

impl SegmentFeatures {
    /// Look up a feature by name. Accepts the camelCase spellings found in
    /// exported model files as well.
    pub fn value(&self, name: &str) -> Option<f64> {
        let v = match canonical_feature_name(name)? {
            "duration" => self.duration,
            "mean" => self.mean,
            "std" => self.std,
            "min" => self.min,
            "max" => self.max,
            "range" => self.range,
            "energy" => self.energy,
            "slope" => self.slope,
            "peak_count" => self.peak_count as f64,
            "trough_count" => self.trough_count as f64,
            "prev_mean" => self.prev_mean,
            "next_mean" => self.next_mean,
            _ => return None,
        };
        Some(v)
    }

    /// Name → value map, as stored alongside historical anomalies.
    pub fn to_map(&self) -> HashMap<String, f64> {
        FEATURE_NAMES
            .iter()
            .filter_map(|name| self.value(name).map(|v| ((*name).to_string(), v)))
            .collect()
    }
}

/// Map a feature name to the canonical snake_case form, if it is known.
pub fn canonical_feature_name(name: &str) -> Option<&'static str> {
    let folded: String = name
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    FEATURE_NAMES
        .iter()
        .find(|n| n.replace('_', "") == folded)
        .copied()
}

/// Output of classification for one (possibly merged) segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentClassification {
    pub boundary: SegmentBoundary,
    pub label: SegmentLabel,
    pub features: SegmentFeatures,
    pub hash_vector: HashVector,
}
