//! Data-source abstraction for flight series and stored anomalies.
//!
//! The analysis core never talks to storage directly; it is handed series
//! loaded through a [`FlightDataSource`]. [`InMemorySource`] backs tests and
//! the CLI, where everything is read up front.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

use crate::types::{HistoricalAnomalyRecord, SegmentLabel, SeriesError, TimeSeries};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No series for flight '{flight_id}' parameter '{parameter}'")]
    NotFound { flight_id: String, parameter: String },

    #[error("{source_name} backend failure: {message}")]
    Backend {
        source_name: String,
        message: String,
    },

    #[error("Invalid series from source: {0}")]
    InvalidSeries(#[from] SeriesError),
}

/// Where flight series and historical anomaly records come from.
///
/// Implementations must be shareable across tasks; the cache in front of a
/// source may call it concurrently for different keys.
#[async_trait]
pub trait FlightDataSource: Send + Sync {
    /// Load the full `(time, value)` series of one parameter of one flight.
    async fn load_series(&self, flight_id: &str, parameter: &str)
        -> Result<TimeSeries, SourceError>;

    /// Stored anomalies for `parameter` carrying `label`.
    async fn historical_anomalies(
        &self,
        parameter: &str,
        label: SegmentLabel,
    ) -> Result<Vec<HistoricalAnomalyRecord>, SourceError>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}

// ============================================================================
// In-memory source
// ============================================================================

/// Series and history held in memory.
#[derive(Debug, Default)]
pub struct InMemorySource {
    series: HashMap<(String, String), TimeSeries>,
    history: Vec<HistoricalAnomalyRecord>,
    loads: AtomicUsize,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_series(&mut self, flight_id: &str, parameter: &str, series: TimeSeries) {
        self.series
            .insert((flight_id.to_string(), parameter.to_string()), series);
    }

    pub fn add_history(&mut self, records: impl IntoIterator<Item = HistoricalAnomalyRecord>) {
        self.history.extend(records);
    }

    /// Number of successful `load_series` calls so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FlightDataSource for InMemorySource {
    async fn load_series(
        &self,
        flight_id: &str,
        parameter: &str,
    ) -> Result<TimeSeries, SourceError> {
        // Yield once so concurrent callers actually interleave
        tokio::task::yield_now().await;
        let series = self
            .series
            .get(&(flight_id.to_string(), parameter.to_string()))
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                flight_id: flight_id.to_string(),
                parameter: parameter.to_string(),
            })?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(series)
    }

    async fn historical_anomalies(
        &self,
        parameter: &str,
        label: SegmentLabel,
    ) -> Result<Vec<HistoricalAnomalyRecord>, SourceError> {
        Ok(self
            .history
            .iter()
            .filter(|r| r.parameter == parameter && r.label == label)
            .cloned()
            .collect())
    }

    fn source_name(&self) -> &str {
        "in-memory"
    }
}
