//! Analysis Configuration Module
//!
//! Provides the tunable thresholds of the analytics core, loaded from TOML
//! files and passed explicitly to every component that needs them.
//!
//! ## Loading Order
//!
//! 1. `FLIGHT_ANALYTICS_CONFIG` environment variable (path to TOML file)
//! 2. `flight_analytics.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! ```ignore
//! let config = AnalysisConfig::load();
//! let analyzer = FlightAnalyzer::new(&config, &model);
//! let profile = config.profile(PhaseCategory::Cruising);
//! ```

mod analysis_config;
pub mod defaults;
pub mod validation;

pub use analysis_config::*;
