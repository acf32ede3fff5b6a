//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use super::{AnalysisConfig, TuningProfile};

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

const PROFILE_FIELDS: &[&str] = &[
    "rare_label_max_count",
    "rare_label_max_time_fraction",
    "min_segment_duration",
    "min_segment_range",
    "pattern_support_threshold",
    "min_gap_seconds",
    "similarity_weights",
    "similarity_weights.hash",
    "similarity_weights.feature",
    "similarity_weights.duration",
    "similarity_threshold",
    "penalty",
    "min_segment_length",
    "jump",
];

const PROFILE_NAMES: &[&str] = &["takeoff_landing", "cruising", "full_flight"];

/// Returns the complete set of valid dotted key paths for `AnalysisConfig`.
///
/// Must be kept in sync with the structs in `analysis_config.rs`.
pub fn known_config_keys() -> HashSet<String> {
    let fixed: &[&str] = &[
        // [preprocess]
        "preprocess",
        "preprocess.hampel_window",
        "preprocess.hampel_sigma",
        // [segmentation]
        "segmentation",
        "segmentation.cost",
        // [phase]
        "phase",
        "phase.cruise_window_start",
        "phase.cruise_window_end",
        "phase.takeoff_search_fraction",
        "phase.landing_search_fraction",
        "phase.min_takeoff_stable_duration",
        "phase.min_cruise_stable_duration",
        "phase.takeoff_rise_fraction",
        "phase.cruise_std_tolerance",
        "phase.descent_drop_std",
        "phase.stable_slope_factor",
        "phase.climb_slope_factor",
        "phase.min_phase_gap",
        "phase.fallback_takeoff_fraction",
        "phase.fallback_landing_fraction",
        // [causality]
        "causality",
        "causality.granger_lag",
        "causality.significance_threshold",
        "causality.ccm_embedding_dim",
        "causality.ccm_delay",
        "causality.auto_select_threshold",
        // [profiles]
        "profiles",
    ];

    let mut keys: HashSet<String> = fixed.iter().map(|k| (*k).to_string()).collect();
    for profile in PROFILE_NAMES {
        keys.insert(format!("profiles.{profile}"));
        for field in PROFILE_FIELDS {
            keys.insert(format!("profiles.{profile}.{field}"));
        }
    }
    keys
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_len = b.chars().count();
    if a.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<String>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for k in known {
        let dist = levenshtein(unknown, k);
        if dist > 3 {
            continue;
        }
        // Ties resolve alphabetically so suggestions are stable across runs
        let better = match best {
            None => true,
            Some((best_key, best_dist)) => dist < best_dist || (dist == best_dist && k.as_str() < best_key),
        };
        if better {
            best = Some((k.as_str(), dist));
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are reported by serde
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key))
        .map(|key| {
            let suggestion = suggest_correction(&key, &known);
            ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            }
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

fn check_fraction(value: f64, name: &str, errors: &mut Vec<String>) {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        errors.push(format!("{name} = {value} must be within [0, 1]"));
    }
}

fn check_positive(value: f64, name: &str, errors: &mut Vec<String>) {
    if !value.is_finite() || value <= 0.0 {
        errors.push(format!("{name} = {value} must be finite and > 0"));
    }
}

fn check_non_negative(value: f64, name: &str, errors: &mut Vec<String>) {
    if !value.is_finite() || value < 0.0 {
        errors.push(format!("{name} = {value} must be finite and >= 0"));
    }
}

fn check_profile(profile: &TuningProfile, name: &str, errors: &mut Vec<String>) {
    check_fraction(
        profile.rare_label_max_time_fraction,
        &format!("profiles.{name}.rare_label_max_time_fraction"),
        errors,
    );
    check_non_negative(
        profile.min_segment_duration,
        &format!("profiles.{name}.min_segment_duration"),
        errors,
    );
    check_non_negative(
        profile.min_segment_range,
        &format!("profiles.{name}.min_segment_range"),
        errors,
    );
    check_non_negative(
        profile.min_gap_seconds,
        &format!("profiles.{name}.min_gap_seconds"),
        errors,
    );
    check_positive(profile.penalty, &format!("profiles.{name}.penalty"), errors);
    check_fraction(
        profile.similarity_threshold,
        &format!("profiles.{name}.similarity_threshold"),
        errors,
    );

    let w = &profile.similarity_weights;
    for (weight, field) in [(w.hash, "hash"), (w.feature, "feature"), (w.duration, "duration")] {
        check_non_negative(
            weight,
            &format!("profiles.{name}.similarity_weights.{field}"),
            errors,
        );
    }
    if w.hash + w.feature + w.duration <= 0.0 {
        errors.push(format!("profiles.{name}.similarity_weights must not all be zero"));
    }
}

/// Validate value ranges on a parsed config. Every returned string is fatal.
pub fn validate_ranges(config: &AnalysisConfig) -> Vec<String> {
    let mut errors = Vec::new();

    let p = &config.preprocess;
    if p.hampel_window == 0 {
        errors.push("preprocess.hampel_window must be >= 1".to_string());
    }
    check_positive(p.hampel_sigma, "preprocess.hampel_sigma", &mut errors);

    let ph = &config.phase;
    for (value, name) in [
        (ph.cruise_window_start, "phase.cruise_window_start"),
        (ph.cruise_window_end, "phase.cruise_window_end"),
        (ph.takeoff_search_fraction, "phase.takeoff_search_fraction"),
        (ph.landing_search_fraction, "phase.landing_search_fraction"),
        (ph.takeoff_rise_fraction, "phase.takeoff_rise_fraction"),
        (ph.fallback_takeoff_fraction, "phase.fallback_takeoff_fraction"),
        (ph.fallback_landing_fraction, "phase.fallback_landing_fraction"),
    ] {
        check_fraction(value, name, &mut errors);
    }
    if ph.cruise_window_start >= ph.cruise_window_end {
        errors.push(format!(
            "phase.cruise_window_start ({}) must be < cruise_window_end ({})",
            ph.cruise_window_start, ph.cruise_window_end
        ));
    }
    if ph.fallback_takeoff_fraction >= ph.fallback_landing_fraction {
        errors.push(format!(
            "phase.fallback_takeoff_fraction ({}) must be < fallback_landing_fraction ({})",
            ph.fallback_takeoff_fraction, ph.fallback_landing_fraction
        ));
    }
    check_non_negative(ph.min_takeoff_stable_duration, "phase.min_takeoff_stable_duration", &mut errors);
    check_non_negative(ph.min_cruise_stable_duration, "phase.min_cruise_stable_duration", &mut errors);
    check_non_negative(ph.cruise_std_tolerance, "phase.cruise_std_tolerance", &mut errors);
    check_non_negative(ph.descent_drop_std, "phase.descent_drop_std", &mut errors);
    check_positive(ph.stable_slope_factor, "phase.stable_slope_factor", &mut errors);
    check_positive(ph.climb_slope_factor, "phase.climb_slope_factor", &mut errors);

    let c = &config.causality;
    if c.granger_lag == 0 {
        errors.push("causality.granger_lag must be >= 1".to_string());
    }
    if c.ccm_embedding_dim < 2 {
        errors.push("causality.ccm_embedding_dim must be >= 2".to_string());
    }
    if c.ccm_delay == 0 {
        errors.push("causality.ccm_delay must be >= 1".to_string());
    }
    check_non_negative(c.significance_threshold, "causality.significance_threshold", &mut errors);
    check_fraction(c.auto_select_threshold, "causality.auto_select_threshold", &mut errors);

    for (category, profile) in config.profiles.iter() {
        check_profile(profile, &category.to_string(), &mut errors);
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn known_keys_include_every_profile_field() {
        let keys = known_config_keys();
        assert!(keys.contains("profiles.cruising.similarity_weights.hash"));
        assert!(keys.contains("profiles.full_flight.jump"));
        assert!(keys.contains("phase.min_phase_gap"));
    }

    #[test]
    fn defaults_have_no_range_errors() {
        assert!(validate_ranges(&AnalysisConfig::default()).is_empty());
    }

    #[test]
    fn inverted_fallback_fractions_rejected() {
        let mut config = AnalysisConfig::default();
        config.phase.fallback_takeoff_fraction = 0.9;
        let errors = validate_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("fallback_takeoff_fraction")));
    }

    #[test]
    fn zero_weights_rejected() {
        let mut config = AnalysisConfig::default();
        config.profiles.cruising.similarity_weights.hash = 0.0;
        config.profiles.cruising.similarity_weights.feature = 0.0;
        config.profiles.cruising.similarity_weights.duration = 0.0;
        let errors = validate_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("cruising.similarity_weights")));
    }
}
