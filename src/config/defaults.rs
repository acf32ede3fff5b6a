//! System-wide default constants.
//!
//! Algorithm constants that are not operator-tunable live here, grouped by
//! subsystem. Everything an operator may want to change is in
//! `AnalysisConfig` instead.

// ============================================================================
// Config Loading
// ============================================================================

/// Environment variable holding the path to the analysis config.
pub const CONFIG_ENV_VAR: &str = "FLIGHT_ANALYTICS_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "flight_analytics.toml";

// ============================================================================
// Preprocessing
// ============================================================================

/// Scale factor turning a MAD into a normal-consistent standard deviation.
pub const MAD_SCALE: f64 = 1.4826;

// ============================================================================
// Segment Features
// ============================================================================

/// Minimum extremum spacing as a fraction of the segment length.
pub const EXTREMUM_SPACING_FRACTION: f64 = 0.05;

/// Minimum prominence of a peak/trough over its neighbours' midpoint.
pub const EXTREMUM_PROMINENCE: f64 = 0.5;

// ============================================================================
// Changepoint Costs
// ============================================================================

/// Negative L2 errors above this are treated as rounding noise and clamped.
pub const L2_NEGATIVE_TOLERANCE: f64 = 1e-12;

/// Bound on cached scratch buffers kept by a PELT detector.
pub const SCRATCH_POOL_CAPACITY: usize = 8;

// ============================================================================
// Historical Similarity
// ============================================================================

/// Hash components differing by more than this count as a mismatch.
pub const HASH_COMPONENT_TOLERANCE: f64 = 0.001;

// ============================================================================
// CCM
// ============================================================================

/// Samples required beyond the embedding span before CCM runs.
pub const CCM_MIN_EXTRA_SAMPLES: usize = 11;

/// Smallest library size tried (raised to `embedding_dim + 2` when larger).
pub const CCM_MIN_LIBRARY: usize = 20;

/// Largest library size tried.
pub const CCM_MAX_LIBRARY: usize = 500;

/// Held-out vectors always reserved beyond the largest library.
pub const CCM_HOLDOUT_RESERVE: usize = 5;

/// Approximate number of library sizes stepped through.
pub const CCM_LIBRARY_STEPS: usize = 10;

// ============================================================================
// Granger
// ============================================================================

/// Pivot magnitude below which the normal equations are treated as singular.
pub const SINGULAR_PIVOT: f64 = 1e-12;
