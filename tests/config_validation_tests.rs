//! Config Validation Tests
//!
//! Unknown-key detection (typo suggestions), range validation and file
//! loading for `AnalysisConfig`, exercised independently from the pipeline.

use flight_analytics::config::validation::{
    known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys,
};
use flight_analytics::config::{AnalysisConfig, ConfigError, CostKind, TuningProfile};
use flight_analytics::types::PhaseCategory;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_preprocess_warns_with_suggestion() {
    let toml_str = r#"
[preprocess]
hampel_sigam = 2.5
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("hampel_sigam"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("preprocess.hampel_sigma")
    );
}

#[test]
fn typo_in_profile_warns() {
    let toml_str = r#"
[profiles.cruising]
penalty = 10.0
jmp = 3
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "profiles.cruising.jmp");
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("profiles.cruising.jump")
    );
}

#[test]
fn unrelated_key_has_no_suggestion() {
    let warnings = validate_unknown_keys("[telemetry]\nendpoint = \"udp://localhost\"\n");
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| w.suggestion.is_none()));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[preprocess]
hampel_window = 9
hampel_sigma = 3.0

[segmentation]
cost = "rbf"

[phase]
min_phase_gap = 90
fallback_takeoff_fraction = 0.15
fallback_landing_fraction = 0.85

[causality]
granger_lag = 3
auto_select_threshold = 0.7

[profiles.takeoff_landing]
penalty = 6.0

[profiles.full_flight.similarity_weights]
hash = 0.6
feature = 0.3
duration = 0.1
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.is_empty(), "Unexpected warnings: {warnings:?}");
}

#[test]
fn known_keys_cover_every_default_field() {
    let text = AnalysisConfig::default().to_toml().unwrap();
    let warnings = validate_unknown_keys(&text);
    assert!(warnings.is_empty(), "Serialized defaults produced: {warnings:?}");
    assert!(known_config_keys().contains("profiles.cruising.similarity_threshold"));
}

#[test]
fn suggestion_requires_small_edit_distance() {
    let known = known_config_keys();
    assert_eq!(
        suggest_correction("causality.granger_lga", &known).as_deref(),
        Some("causality.granger_lag")
    );
    assert!(suggest_correction("completely.different.key", &known).is_none());
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn defaults_pass_range_validation() {
    assert!(validate_ranges(&AnalysisConfig::default()).is_empty());
}

#[test]
fn fallback_fractions_must_be_ordered() {
    let mut config = AnalysisConfig::default();
    config.phase.fallback_takeoff_fraction = 0.8;
    config.phase.fallback_landing_fraction = 0.2;
    let errors = validate_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("fallback_takeoff_fraction")));
}

#[test]
fn all_zero_similarity_weights_are_rejected() {
    let result = AnalysisConfig::from_toml_str(
        r#"
[profiles.cruising.similarity_weights]
hash = 0.0
feature = 0.0
duration = 0.0
"#,
    );
    match result {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("cruising.similarity_weights")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn every_violation_is_reported() {
    let mut config = AnalysisConfig::default();
    config.preprocess.hampel_window = 0;
    config.causality.granger_lag = 0;
    config.profiles.full_flight.penalty = -1.0;
    let errors = validate_ranges(&config);
    assert_eq!(errors.len(), 3, "{errors:?}");
}

// ============================================================================
// File Loading
// ============================================================================

#[test]
fn load_from_file_applies_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flight_analytics.toml");
    std::fs::write(
        &path,
        r#"
[segmentation]
cost = "rbf"

[profiles.cruising]
min_gap_seconds = 90.0
"#,
    )
    .unwrap();

    let config = AnalysisConfig::load_from_file(&path).unwrap();
    assert_eq!(config.segmentation.cost, CostKind::Rbf);
    let cruising = config.profile(PhaseCategory::Cruising);
    assert!((cruising.min_gap_seconds - 90.0).abs() < 1e-12);
    assert_eq!(cruising.penalty, TuningProfile::cruising().penalty);
    assert_eq!(config.preprocess, AnalysisConfig::default().preprocess);
}

#[test]
fn unknown_keys_do_not_break_loading() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flight_analytics.toml");
    std::fs::write(&path, "[phase]\nmin_phase_gapp = 10\n").unwrap();

    let config = AnalysisConfig::load_from_file(&path).unwrap();
    assert_eq!(config.phase, AnalysisConfig::default().phase);
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("saved.toml");
    let mut config = AnalysisConfig::default();
    config.causality.ccm_embedding_dim = 4;
    config.profiles.takeoff_landing.jump = 3;
    config.save_to_file(&path).unwrap();

    assert_eq!(AnalysisConfig::load_from_file(&path).unwrap(), config);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = AnalysisConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
}

#[test]
fn malformed_toml_is_parse_error_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[preprocess\nhampel_window = 7\n").unwrap();

    match AnalysisConfig::load_from_file(&path).unwrap_err() {
        ConfigError::Parse(p, _) => assert_eq!(p, path),
        other => panic!("expected parse error, got {other:?}"),
    }
}
