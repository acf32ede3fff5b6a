//! Flight Analyzer - full-flight segmentation, phases, per-phase anomalies
//!
//! ```text
//! STAGE 1: Preprocess (Hampel + z-score) over the whole flight
//! STAGE 2: PELT with the full-flight profile → segments → classify + merge
//! STAGE 3: Phase detection on the merged full-flight segments
//! STAGE 4: Per phase (in parallel): PELT with the phase profile → classify
//!          → hash → anomaly selection
//! STAGE 5: Similarity of each anomaly against stored anomalies
//! ```
//!
//! Every index in a [`FlightAnalysis`] is in flight coordinates, including
//! per-phase segments.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use super::cache::FlightSeriesCache;
use super::source::SourceError;
use crate::anomaly::{AnomalyDetector, HistoricalSimilarityScorer};
use crate::changepoint::{detect_with_profile, minimum_size};
use crate::classifier::{DecisionForest, ModelError, SegmentClassifier};
use crate::config::{AnalysisConfig, ConfigError};
use crate::phase::FlightPhaseDetector;
use crate::processing::{build_segments_from_points, SignalPreprocessor};
use crate::types::{
    FlightPhase, FlightPhaseIndexes, HistoricalAnomalyRecord, PhaseCategory, SegmentBoundary,
    SegmentClassification, SegmentLabel, SimilarityCandidate, TimeSeries,
};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Series too short for analysis: {len} samples")]
    TooShort { len: usize },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

// ============================================================================
// Results
// ============================================================================

/// One anomalous segment, in flight coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub phase: FlightPhase,
    /// Index into the phase's segment list
    pub segment_index: usize,
    pub segment: SegmentClassification,
    pub start_time: f64,
    pub end_time: f64,
    /// Stored anomalies scoring at or above the phase profile's threshold
    #[serde(default)]
    pub similar: Vec<SimilarityCandidate>,
}

/// Re-segmentation of one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseAnalysis {
    pub phase: FlightPhase,
    pub category: PhaseCategory,
    pub boundary: SegmentBoundary,
    pub breakpoints: Vec<usize>,
    pub segments: Vec<SegmentClassification>,
    pub anomalies: Vec<AnomalyReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightAnalysis {
    pub parameter: String,
    pub sample_count: usize,
    /// Full-flight PELT breakpoints
    pub breakpoints: Vec<usize>,
    /// Merged full-flight segments
    pub segments: Vec<SegmentClassification>,
    pub phases: FlightPhaseIndexes,
    pub phase_analyses: Vec<PhaseAnalysis>,
    pub analyzed_at: DateTime<Utc>,
}

impl FlightAnalysis {
    pub fn anomalies(&self) -> impl Iterator<Item = &AnomalyReport> {
        self.phase_analyses.iter().flat_map(|p| p.anomalies.iter())
    }

    pub fn anomaly_count(&self) -> usize {
        self.phase_analyses.iter().map(|p| p.anomalies.len()).sum()
    }

    /// Distinct labels among all anomalies.
    pub fn anomaly_labels(&self) -> BTreeSet<SegmentLabel> {
        self.anomalies().map(|a| a.segment.label).collect()
    }
}

// ============================================================================
// Analyzer
// ============================================================================

/// Owned config and model, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    pub config: AnalysisConfig,
    pub model: DecisionForest,
}

impl AnalysisContext {
    /// Load the model, and the config from `config_path` or the standard
    /// search order.
    pub fn load(config_path: Option<&Path>, model_path: &Path) -> Result<Self, AnalysisError> {
        let config = match config_path {
            Some(path) => AnalysisConfig::load_from_file(path)?,
            None => AnalysisConfig::load(),
        };
        let model = DecisionForest::load(model_path)?;
        Ok(Self { config, model })
    }

    pub fn analyzer(&self) -> FlightAnalyzer<'_> {
        FlightAnalyzer::new(&self.config, &self.model)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FlightAnalyzer<'a> {
    config: &'a AnalysisConfig,
    model: &'a DecisionForest,
}

impl<'a> FlightAnalyzer<'a> {
    pub fn new(config: &'a AnalysisConfig, model: &'a DecisionForest) -> Self {
        Self { config, model }
    }

    /// Run the full pipeline on one parameter of one flight and score the
    /// anomalies against `history` (records of other parameters or labels
    /// are ignored).
    pub fn analyze(
        &self,
        parameter: &str,
        series: &TimeSeries,
        history: &[HistoricalAnomalyRecord],
    ) -> Result<FlightAnalysis, AnalysisError> {
        let mut analysis = self.analyze_series(parameter, series)?;
        self.score_history(&mut analysis, history);
        Ok(analysis)
    }

    /// Segmentation, phases and anomalies, without similarity scoring.
    pub fn analyze_series(
        &self,
        parameter: &str,
        series: &TimeSeries,
    ) -> Result<FlightAnalysis, AnalysisError> {
        let n = series.len();
        if n < 2 {
            return Err(AnalysisError::TooShort { len: n });
        }
        let started = Instant::now();

        // STAGE 1
        let signal =
            SignalPreprocessor::from_config(&self.config.preprocess).apply(series.values());

        // STAGE 2
        let cost = self.config.segmentation.cost;
        let full = self.config.profile(PhaseCategory::FullFlight);
        let breakpoints = detect_with_profile(cost, &signal, full);
        let boundaries = build_segments_from_points(&breakpoints, n);
        let classifier = SegmentClassifier::new(self.model, minimum_size(cost));
        let segments = classifier.classify_segments(&signal, &boundaries);
        debug!(
            parameter,
            samples = n,
            breakpoints = breakpoints.len(),
            segments = segments.len(),
            "Full-flight segmentation complete"
        );

        // STAGE 3
        let phases = FlightPhaseDetector::new(&self.config.phase).detect(&segments);

        // STAGE 4
        let phase_analyses: Vec<PhaseAnalysis> = phases
            .phase_ranges(n)
            .into_par_iter()
            .map(|(phase, boundary)| {
                self.analyze_phase(series, &signal, &classifier, phase, boundary)
            })
            .collect();

        let analysis = FlightAnalysis {
            parameter: parameter.to_string(),
            sample_count: n,
            breakpoints,
            segments,
            phases,
            phase_analyses,
            analyzed_at: Utc::now(),
        };

        info!(
            parameter,
            samples = n,
            segments = analysis.segments.len(),
            takeoff_end = phases.takeoff_end,
            landing_start = phases.landing_start,
            phase_fallback = phases.fallback,
            anomalies = analysis.anomaly_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Flight analysis complete"
        );
        Ok(analysis)
    }

    fn analyze_phase(
        &self,
        series: &TimeSeries,
        signal: &[f64],
        classifier: &SegmentClassifier<'_>,
        phase: FlightPhase,
        boundary: SegmentBoundary,
    ) -> PhaseAnalysis {
        let category = phase.category();
        let profile = self.config.profile(category);
        let mut result = PhaseAnalysis {
            phase,
            category,
            boundary,
            breakpoints: Vec::new(),
            segments: Vec::new(),
            anomalies: Vec::new(),
        };
        if boundary.len() < 2 {
            debug!(%phase, len = boundary.len(), "Phase too short to segment");
            return result;
        }

        let local_signal = &signal[boundary.start..boundary.end];
        let local_series = series.slice(boundary.start, boundary.end);

        let local_breakpoints =
            detect_with_profile(self.config.segmentation.cost, local_signal, profile);
        let local_bounds = build_segments_from_points(&local_breakpoints, local_signal.len());
        let local_segments = classifier.classify_segments(local_signal, &local_bounds);
        let anomaly_indices = AnomalyDetector::new(profile).detect(&local_series, &local_segments);

        let time = local_series.time();
        result.anomalies = anomaly_indices
            .iter()
            .map(|&i| {
                let local = &local_segments[i];
                AnomalyReport {
                    phase,
                    segment_index: i,
                    start_time: time[local.boundary.start],
                    end_time: time[local.boundary.end - 1],
                    segment: SegmentClassification {
                        boundary: local.boundary.offset(boundary.start),
                        ..local.clone()
                    },
                    similar: Vec::new(),
                }
            })
            .collect();
        result.breakpoints = local_breakpoints.iter().map(|b| b + boundary.start).collect();
        result.segments = local_segments
            .into_iter()
            .map(|s| SegmentClassification {
                boundary: s.boundary.offset(boundary.start),
                ..s
            })
            .collect();

        debug!(
            %phase,
            %category,
            segments = result.segments.len(),
            anomalies = result.anomalies.len(),
            "Phase analysis complete"
        );
        result
    }

    /// Attach similar historical anomalies to every anomaly, using the phase
    /// profile's weights and threshold.
    pub fn score_history(
        &self,
        analysis: &mut FlightAnalysis,
        history: &[HistoricalAnomalyRecord],
    ) {
        let parameter = analysis.parameter.clone();
        for phase in &mut analysis.phase_analyses {
            let profile = self.config.profile(phase.category);
            let scorer = HistoricalSimilarityScorer::from_profile(profile);
            for anomaly in &mut phase.anomalies {
                let records: Vec<HistoricalAnomalyRecord> = history
                    .iter()
                    .filter(|r| r.parameter == parameter && r.label == anomaly.segment.label)
                    .cloned()
                    .collect();
                anomaly.similar = scorer.find_similar_to_segment(
                    &anomaly.segment,
                    &records,
                    profile.similarity_threshold,
                );
            }
        }
    }

    /// Load a series through `cache`, analyse it and score it against the
    /// stored anomalies of each label found.
    pub async fn analyze_flight(
        &self,
        cache: &FlightSeriesCache,
        flight_id: &str,
        parameter: &str,
    ) -> Result<FlightAnalysis, AnalysisError> {
        let series = cache.get(flight_id, parameter).await?;
        let mut analysis = self.analyze_series(parameter, &series)?;

        let labels = analysis.anomaly_labels();
        let source = cache.source();
        let history: Vec<HistoricalAnomalyRecord> = try_join_all(
            labels
                .iter()
                .map(|label| source.historical_anomalies(parameter, *label)),
        )
        .await?
        .into_iter()
        .flatten()
        .collect();

        info!(
            flight_id,
            parameter,
            labels = labels.len(),
            records = history.len(),
            "Scoring anomalies against history"
        );
        self.score_history(&mut analysis, &history);
        Ok(analysis)
    }
}
