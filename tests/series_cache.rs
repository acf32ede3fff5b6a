//! Series Cache Concurrency Tests
//!
//! Many tasks requesting the same flight parameter at once must share a
//! single load from the data source.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flight_analytics::pipeline::{
    FlightDataSource, FlightSeriesCache, InMemorySource, SourceError,
};
use flight_analytics::types::{HistoricalAnomalyRecord, SegmentLabel, TimeSeries};

/// Source that is slow to answer and fails its first `failures` loads.
struct FlakySource {
    delay: Duration,
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl FlightDataSource for FlakySource {
    async fn load_series(
        &self,
        flight_id: &str,
        _parameter: &str,
    ) -> Result<TimeSeries, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if call < self.failures {
            return Err(SourceError::Backend {
                source_name: "flaky".to_string(),
                message: format!("timeout loading {flight_id}"),
            });
        }
        Ok(TimeSeries::from_values(vec![1.0, 2.0, 3.0]))
    }

    async fn historical_anomalies(
        &self,
        _parameter: &str,
        _label: SegmentLabel,
    ) -> Result<Vec<HistoricalAnomalyRecord>, SourceError> {
        Ok(Vec::new())
    }

    fn source_name(&self) -> &str {
        "flaky"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_share_one_load() {
    let mut source = InMemorySource::new();
    source.insert_series("FL-7", "egt", TimeSeries::from_values(vec![0.5; 64]));
    let source = Arc::new(source);
    let cache = Arc::new(FlightSeriesCache::new(source.clone()));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get("FL-7", "egt").await })
        })
        .collect();

    let results = join_all(handles).await;
    let series: Vec<Arc<TimeSeries>> = results
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(source.load_count(), 1);
    assert!(series.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_source_is_still_loaded_once() {
    let source = Arc::new(FlakySource {
        delay: Duration::from_millis(20),
        failures: 0,
        calls: AtomicUsize::new(0),
    });
    let cache = FlightSeriesCache::new(source.clone());

    let results = join_all((0..16).map(|_| cache.get("FL-1", "n1"))).await;
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_load_is_not_cached() {
    let source = Arc::new(FlakySource {
        delay: Duration::from_millis(1),
        failures: 1,
        calls: AtomicUsize::new(0),
    });
    let cache = FlightSeriesCache::new(source.clone());

    let first = cache.get("FL-2", "egt").await;
    assert!(matches!(first, Err(SourceError::Backend { .. })));
    assert_eq!(cache.loaded(), 0);

    let second = cache.get("FL-2", "egt").await.unwrap();
    assert_eq!(second.len(), 3);
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.loaded(), 1);
}

#[tokio::test]
async fn distinct_keys_load_independently() {
    let mut source = InMemorySource::new();
    for parameter in ["egt", "n1", "oil_temp"] {
        source.insert_series("FL-3", parameter, TimeSeries::from_values(vec![0.0; 8]));
    }
    let source = Arc::new(source);
    let cache = FlightSeriesCache::new(source.clone());

    let loaded = cache.prefetch("FL-3", &["egt", "n1", "oil_temp"]).await.unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(source.load_count(), 3);

    let err = cache.prefetch("FL-3", &["egt", "fuel_flow"]).await.unwrap_err();
    assert!(matches!(err, SourceError::NotFound { .. }));
}
