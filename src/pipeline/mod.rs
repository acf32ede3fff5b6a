//! Flight Analysis Pipeline
//!
//! ```text
//! FlightDataSource ──► FlightSeriesCache ──► FlightAnalyzer
//!                                              │
//!                        ┌─────────────────────┼──────────────────────┐
//!                        ▼                     ▼                      ▼
//!                  full-flight PELT     phase detection     per-phase anomalies
//!                  + classification                          + history scoring
//! ```
//!
//! - `source`: async trait for series and stored anomalies, plus an in-memory backend
//! - `cache`: single-flight per-key series cache
//! - `analyzer`: the end-to-end analysis of one parameter of one flight

mod analyzer;
mod cache;
pub mod source;

pub use analyzer::{
    AnalysisContext, AnalysisError, AnomalyReport, FlightAnalysis, FlightAnalyzer, PhaseAnalysis,
};
pub use cache::FlightSeriesCache;
pub use source::{FlightDataSource, InMemorySource, SourceError};
