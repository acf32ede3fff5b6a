//! Per-flight series cache in front of a [`FlightDataSource`].
//!
//! Each `(flight_id, parameter)` key owns a `tokio::sync::OnceCell`, so
//! concurrent requests for the same key wait on a single load. A failed load
//! leaves the cell empty and the next request retries.

use dashmap::DashMap;
use futures::future::try_join_all;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use super::source::{FlightDataSource, SourceError};
use crate::types::TimeSeries;

type SeriesKey = (String, String);

pub struct FlightSeriesCache {
    source: Arc<dyn FlightDataSource>,
    cells: DashMap<SeriesKey, Arc<OnceCell<Arc<TimeSeries>>>>,
}

impl FlightSeriesCache {
    pub fn new(source: Arc<dyn FlightDataSource>) -> Self {
        Self {
            source,
            cells: DashMap::new(),
        }
    }

    pub fn source(&self) -> &Arc<dyn FlightDataSource> {
        &self.source
    }

    /// Cached series, loading it on first use.
    pub async fn get(
        &self,
        flight_id: &str,
        parameter: &str,
    ) -> Result<Arc<TimeSeries>, SourceError> {
        // Clone the cell out so no shard lock is held across the await
        let cell = self
            .cells
            .entry((flight_id.to_string(), parameter.to_string()))
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let series = cell
            .get_or_try_init(|| async {
                debug!(
                    flight_id,
                    parameter,
                    source = self.source.source_name(),
                    "Loading flight series"
                );
                self.source
                    .load_series(flight_id, parameter)
                    .await
                    .map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(series))
    }

    /// Load several parameters of one flight concurrently.
    pub async fn prefetch(
        &self,
        flight_id: &str,
        parameters: &[&str],
    ) -> Result<Vec<Arc<TimeSeries>>, SourceError> {
        try_join_all(parameters.iter().map(|p| self.get(flight_id, p))).await
    }

    /// Drop every cached parameter of `flight_id`.
    pub fn invalidate(&self, flight_id: &str) {
        self.cells.retain(|(flight, _), _| flight != flight_id);
    }

    /// Number of keys with a loaded series.
    pub fn loaded(&self) -> usize {
        self.cells
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }
}

impl std::fmt::Debug for FlightSeriesCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightSeriesCache")
            .field("source", &self.source.source_name())
            .field("keys", &self.cells.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::InMemorySource;

    fn cache_with(flights: &[(&str, &str)]) -> (Arc<InMemorySource>, FlightSeriesCache) {
        let mut source = InMemorySource::new();
        for (flight, parameter) in flights {
            source.insert_series(flight, parameter, TimeSeries::from_values(vec![0.0; 16]));
        }
        let source = Arc::new(source);
        let cache = FlightSeriesCache::new(source.clone());
        (source, cache)
    }

    #[tokio::test]
    async fn repeated_gets_load_once() {
        let (source, cache) = cache_with(&[("F1", "egt")]);
        let a = cache.get("F1", "egt").await.unwrap();
        let b = cache.get("F1", "egt").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(source.load_count(), 1);
        assert_eq!(cache.loaded(), 1);
    }

    #[tokio::test]
    async fn failed_load_is_retried() {
        let (_, cache) = cache_with(&[]);
        assert!(cache.get("F9", "egt").await.is_err());
        assert!(cache.get("F9", "egt").await.is_err());
        assert_eq!(cache.loaded(), 0);
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let (source, cache) = cache_with(&[("F1", "egt"), ("F1", "n1"), ("F2", "egt")]);
        cache.prefetch("F1", &["egt", "n1"]).await.unwrap();
        cache.get("F2", "egt").await.unwrap();
        assert_eq!(source.load_count(), 3);

        cache.invalidate("F1");
        assert_eq!(cache.loaded(), 1);
        cache.get("F1", "egt").await.unwrap();
        assert_eq!(source.load_count(), 4);
    }
}
