//! Core data model shared by every analysis stage.
//!
//! - `series`: borrowed input series (`TimeSeries`)
//! - `segment`: boundaries, features, labels, shape fingerprints
//! - `flight`: phase indexes, tuning categories, historical anomaly records
//! - `causality`: pairwise causal scoring results

mod causality;
mod flight;
mod segment;
mod series;

pub use causality::{
    CausalityMethod, CausalityResult, CausalitySelection, DirectionalScore, FieldRelationship,
    GrangerResult, Relationship,
};
pub use flight::{
    FlightPhase, FlightPhaseIndexes, HistoricalAnomalyRecord, PhaseCategory, SimilarityCandidate,
};
pub use segment::{
    canonical_feature_name, HashVector, SegmentBoundary, SegmentClassification, SegmentFeatures,
    SegmentLabel, FEATURE_NAMES, HASH_LENGTH,
};
pub use series::{SeriesError, TimeSeries};

/// Guard used wherever a spread or norm ends up in a denominator.
pub const EPSILON: f64 = 1e-9;
