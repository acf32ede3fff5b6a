//! Analysis Configuration - every tunable threshold as a TOML value
//!
//! Each struct implements `Default` with the values the pipeline ships with,
//! so an empty or missing config file behaves exactly like the built-in setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults::{CONFIG_ENV_VAR, LOCAL_CONFIG_FILE};
use crate::types::PhaseCategory;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for the analytics core.
///
/// Load with `AnalysisConfig::load()` which searches:
/// 1. `$FLIGHT_ANALYTICS_CONFIG` env var
/// 2. `./flight_analytics.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Hampel filter settings
    #[serde(default)]
    pub preprocess: PreprocessConfig,

    /// Changepoint cost selection
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    /// Flight phase detection constants
    #[serde(default)]
    pub phase: PhaseConfig,

    /// Causality engine settings
    #[serde(default)]
    pub causality: CausalityConfig,

    /// Per-category tuning profiles
    #[serde(default)]
    pub profiles: TuningProfiles,
}

impl AnalysisConfig {
    /// Load configuration using the standard search order.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded analysis config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded analysis config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys are logged, not fatal.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Analysis config saved");
        Ok(())
    }

    /// Validate all values for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = super::validation::validate_ranges(self);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Profile for a phase category.
    pub fn profile(&self, category: PhaseCategory) -> &TuningProfile {
        self.profiles.for_category(category)
    }
}

// ============================================================================
// Preprocessing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Hampel window width in samples (forced odd)
    pub hampel_window: usize,
    /// Outlier threshold in robust standard deviations
    pub hampel_sigma: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            hampel_window: 7,
            hampel_sigma: 3.0,
        }
    }
}

// ============================================================================
// Segmentation
// ============================================================================

/// Segment cost used by PELT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostKind {
    #[default]
    L2,
    Rbf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub cost: CostKind,
}

// ============================================================================
// Flight Phase Detection
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// Cruise search window as fractions of the flight length
    pub cruise_window_start: f64,
    pub cruise_window_end: f64,
    /// Takeoff candidates must start before this fraction of the flight
    pub takeoff_search_fraction: f64,
    /// Landing candidates must end after this fraction of the flight
    pub landing_search_fraction: f64,
    /// Minimum stable-segment duration to end takeoff (samples)
    pub min_takeoff_stable_duration: f64,
    /// Minimum stable-segment duration preceding landing (samples)
    pub min_cruise_stable_duration: f64,
    /// Share of the baseline→cruise rise a takeoff-end segment must reach
    pub takeoff_rise_fraction: f64,
    /// Allowed distance from cruise mean, in cruise standard deviations
    pub cruise_std_tolerance: f64,
    /// Drop below cruise mean that marks descent, in cruise standard deviations
    pub descent_drop_std: f64,
    /// stable slope threshold = median |slope| × this
    pub stable_slope_factor: f64,
    /// climb/descent slope threshold = median |slope| × this
    pub climb_slope_factor: f64,
    /// Minimum takeoff→landing separation (samples)
    pub min_phase_gap: usize,
    /// Fallback fractions when detection is inconsistent
    pub fallback_takeoff_fraction: f64,
    pub fallback_landing_fraction: f64,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            cruise_window_start: 0.25,
            cruise_window_end: 0.75,
            takeoff_search_fraction: 0.60,
            landing_search_fraction: 0.70,
            min_takeoff_stable_duration: 120.0,
            min_cruise_stable_duration: 600.0,
            takeoff_rise_fraction: 0.75,
            cruise_std_tolerance: 1.0,
            descent_drop_std: 1.0,
            stable_slope_factor: 1.2,
            climb_slope_factor: 2.5,
            min_phase_gap: 60,
            fallback_takeoff_fraction: 0.20,
            fallback_landing_fraction: 0.80,
        }
    }
}

// ============================================================================
// Causality
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CausalityConfig {
    /// Number of lags in the Granger design matrices
    pub granger_lag: usize,
    /// Improvement ratio above which a direction counts as causal
    pub significance_threshold: f64,
    /// Takens embedding dimension for CCM
    pub ccm_embedding_dim: usize,
    /// Takens embedding delay for CCM (samples)
    pub ccm_delay: usize,
    /// |Pearson| at or above which Granger is selected over CCM
    pub auto_select_threshold: f64,
}

impl Default for CausalityConfig {
    fn default() -> Self {
        Self {
            granger_lag: 2,
            significance_threshold: 0.05,
            ccm_embedding_dim: 3,
            ccm_delay: 1,
            auto_select_threshold: 0.65,
        }
    }
}

// ============================================================================
// Tuning Profiles
// ============================================================================

/// Relative weights of the three similarity components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityWeights {
    pub hash: f64,
    pub feature: f64,
    pub duration: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            hash: 0.75,
            feature: 0.20,
            duration: 0.05,
        }
    }
}

/// Thresholds for anomaly detection, similarity scoring and re-segmentation
/// within one phase category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningProfile {
    /// A non-baseline label seen at most this many times is rare
    pub rare_label_max_count: usize,
    /// A non-baseline label covering at most this share of the flight is rare
    pub rare_label_max_time_fraction: f64,
    /// Minimum candidate duration (samples)
    pub min_segment_duration: f64,
    /// Minimum candidate range (normalized units)
    pub min_segment_range: f64,
    /// Candidates need fewer duplicate shapes than this
    pub pattern_support_threshold: usize,
    /// Minimum spacing between kept candidates (seconds)
    pub min_gap_seconds: f64,
    pub similarity_weights: SimilarityWeights,
    /// Historical records scoring below this are dropped
    pub similarity_threshold: f64,
    /// PELT penalty per segment
    pub penalty: f64,
    /// PELT minimum segment length (samples)
    pub min_segment_length: usize,
    /// PELT candidate stride (samples)
    pub jump: usize,
}

impl Default for TuningProfile {
    fn default() -> Self {
        Self::full_flight()
    }
}

impl TuningProfile {
    pub fn full_flight() -> Self {
        Self {
            rare_label_max_count: 2,
            rare_label_max_time_fraction: 0.05,
            min_segment_duration: 10.0,
            min_segment_range: 0.5,
            pattern_support_threshold: 2,
            min_gap_seconds: 120.0,
            similarity_weights: SimilarityWeights::default(),
            similarity_threshold: 0.8,
            penalty: 20.0,
            min_segment_length: 30,
            jump: 5,
        }
    }

    pub fn takeoff_landing() -> Self {
        Self {
            rare_label_max_count: 1,
            rare_label_max_time_fraction: 0.10,
            min_segment_duration: 5.0,
            min_segment_range: 0.3,
            pattern_support_threshold: 2,
            min_gap_seconds: 30.0,
            penalty: 8.0,
            min_segment_length: 10,
            jump: 1,
            ..Self::full_flight()
        }
    }

    pub fn cruising() -> Self {
        Self {
            rare_label_max_count: 2,
            rare_label_max_time_fraction: 0.03,
            min_segment_duration: 10.0,
            min_segment_range: 0.4,
            pattern_support_threshold: 3,
            min_gap_seconds: 60.0,
            penalty: 12.0,
            min_segment_length: 20,
            jump: 2,
            ..Self::full_flight()
        }
    }
}

/// One profile per phase category.
///
/// A partial `[profiles.<category>]` table only overrides the keys it names;
/// everything else keeps that category's own defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TuningProfiles {
    pub takeoff_landing: TuningProfile,
    pub cruising: TuningProfile,
    pub full_flight: TuningProfile,
}

impl Default for TuningProfiles {
    fn default() -> Self {
        Self {
            takeoff_landing: TuningProfile::takeoff_landing(),
            cruising: TuningProfile::cruising(),
            full_flight: TuningProfile::full_flight(),
        }
    }
}

impl TuningProfiles {
    pub fn for_category(&self, category: PhaseCategory) -> &TuningProfile {
        match category {
            PhaseCategory::TakeoffLanding => &self.takeoff_landing,
            PhaseCategory::Cruising => &self.cruising,
            PhaseCategory::FullFlight => &self.full_flight,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (PhaseCategory, &TuningProfile)> {
        [
            (PhaseCategory::TakeoffLanding, &self.takeoff_landing),
            (PhaseCategory::Cruising, &self.cruising),
            (PhaseCategory::FullFlight, &self.full_flight),
        ]
        .into_iter()
    }
}

/// Keys present in one `[profiles.<category>]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProfileOverrides {
    rare_label_max_count: Option<usize>,
    rare_label_max_time_fraction: Option<f64>,
    min_segment_duration: Option<f64>,
    min_segment_range: Option<f64>,
    pattern_support_threshold: Option<usize>,
    min_gap_seconds: Option<f64>,
    similarity_weights: Option<SimilarityWeights>,
    similarity_threshold: Option<f64>,
    penalty: Option<f64>,
    min_segment_length: Option<usize>,
    jump: Option<usize>,
}

macro_rules! overlay {
    ($base:ident, $overrides:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $overrides.$field {
                $base.$field = value;
            }
        )+
    };
}

impl ProfileOverrides {
    fn apply(self, mut base: TuningProfile) -> TuningProfile {
        overlay!(
            base,
            self,
            rare_label_max_count,
            rare_label_max_time_fraction,
            min_segment_duration,
            min_segment_range,
            pattern_support_threshold,
            min_gap_seconds,
            similarity_weights,
            similarity_threshold,
            penalty,
            min_segment_length,
            jump,
        );
        base
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProfilesOverrides {
    takeoff_landing: ProfileOverrides,
    cruising: ProfileOverrides,
    full_flight: ProfileOverrides,
}

impl<'de> Deserialize<'de> for TuningProfiles {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = ProfilesOverrides::deserialize(deserializer)?;
        Ok(Self {
            takeoff_landing: raw.takeoff_landing.apply(TuningProfile::takeoff_landing()),
            cruising: raw.cruising.apply(TuningProfile::cruising()),
            full_flight: raw.full_flight.apply(TuningProfile::full_flight()),
        })
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            Self::Parse(path, e) => write!(f, "Config parse error ({}): {}", path.display(), e),
            Self::Serialize(e) => write!(f, "Config serialization error: {}", e),
            Self::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(_, e) => Some(e),
            Self::Parse(_, e) => Some(e),
            Self::Serialize(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}
