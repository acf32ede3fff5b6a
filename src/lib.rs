//! Flight Analytics: sensor-series diagnostics for recorded flights
//!
//! Finds anomalous behaviour in a single flight parameter and relates flight
//! channels to each other.
//!
//! ## Architecture
//!
//! - **Processing**: Hampel filtering, z-scoring, segment features, shape hashes
//! - **Changepoint**: PELT segmentation over L2 or RBF-kernel costs
//! - **Classifier**: decision-forest segment labelling and label merging
//! - **Phase**: takeoff/cruise/landing split from the labelled segments
//! - **Anomaly**: rare-pattern selection and historical similarity
//! - **Causal**: Granger, convergent cross mapping and automatic selection
//! - **Pipeline**: data sources, series cache and the end-to-end analyzer

pub mod anomaly;
pub mod causal;
pub mod changepoint;
pub mod classifier;
pub mod config;
pub mod phase;
pub mod pipeline;
pub mod processing;
pub mod types;

// Re-export configuration
pub use config::{AnalysisConfig, TuningProfile};

// Re-export commonly used types
pub use types::{
    FlightPhase, FlightPhaseIndexes, HistoricalAnomalyRecord, PhaseCategory, SegmentBoundary,
    SegmentClassification, SegmentFeatures, SegmentLabel, TimeSeries,
};

// Re-export the analysis stages
pub use anomaly::{AnomalyDetector, HistoricalSimilarityScorer};
pub use causal::{AutoCausalitySelector, CcmAnalyzer, FlightCausality, GrangerAnalyzer};
pub use changepoint::{CostFunction, Pelt};
pub use classifier::{DecisionForest, SegmentClassifier};
pub use phase::FlightPhaseDetector;
pub use processing::{FeatureExtractor, PatternHasher, SignalPreprocessor};

// Re-export the pipeline
pub use pipeline::{
    AnalysisContext, AnalysisError, FlightAnalysis, FlightAnalyzer, FlightDataSource,
    FlightSeriesCache, InMemorySource,
};
