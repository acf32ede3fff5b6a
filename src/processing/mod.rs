//! Signal processing - preprocessing, segment features and shape hashing
//!
//! - `preprocess`: Hampel outlier filter + z-score normalization
//! - `features`: per-segment statistics and breakpoint → boundary conversion
//! - `hashing`: fixed-length segment shape fingerprints
//! - `stats`: shared descriptive statistics

mod features;
mod hashing;
mod preprocess;
pub mod stats;

pub use features::{build_segments_from_points, FeatureExtractor};
pub use hashing::{hash_key, PatternHasher};
pub use preprocess::{hampel_filter, SignalPreprocessor};
