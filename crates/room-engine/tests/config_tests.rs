//! Engine configuration: TOML loading, defaults and validation.

use chrono::{DateTime, Utc};
use room_engine::availability::calculate_availability;
use room_engine::room::{Room, TimeRange};
use room_engine::{DstPolicy, EngineConfig, EngineError};

#[test]
fn empty_document_is_the_default() {
    let config = EngineConfig::from_toml_str("").unwrap();

    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.safety_cap, 500);
    assert_eq!(config.default_operating_hours, Some(TimeRange::BUSINESS_HOURS));
    assert_eq!(config.min_suggestion_score, 30);
}

#[test]
fn overrides_keep_other_defaults() {
    let config = EngineConfig::from_toml_str(
        r#"
        safety_cap = 50
        default_timezone = "Europe/Berlin"
        dst_policy = "shift_forward"

        [default_operating_hours]
        start = "08:00"
        end = "20:00"
        "#,
    )
    .unwrap();

    assert_eq!(config.safety_cap, 50);
    assert_eq!(config.default_timezone, "Europe/Berlin");
    assert_eq!(config.dst_policy, DstPolicy::ShiftForward);
    assert_eq!(
        config.default_operating_hours,
        Some(TimeRange::parse("08:00", "20:00").unwrap())
    );
    assert_eq!(config.max_alternatives, 3);
}

#[test]
fn unknown_keys_are_rejected() {
    let err = EngineConfig::from_toml_str("safety_kap = 10").unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}

#[test]
fn invalid_values_are_rejected() {
    for doc in [
        "safety_cap = 0",
        "min_slot_minutes = 0",
        "suggestion_first_hour = 18\nsuggestion_last_hour = 9",
        "suggestion_last_hour = 25",
        "min_suggestion_score = 101",
        r#"default_timezone = "Mars/Olympus""#,
    ] {
        let err = EngineConfig::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)), "accepted: {doc}");
    }
}

#[test]
fn inverted_default_hours_are_rejected() {
    let err = EngineConfig::from_toml_str(
        "[default_operating_hours]\nstart = \"18:00\"\nend = \"09:00\"",
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}

#[test]
fn full_day_default_is_written_by_name() {
    let config = EngineConfig::from_toml_str(r#"default_operating_hours = "full_day""#).unwrap();
    assert_eq!(config.default_operating_hours, None);

    let day: DateTime<Utc> = "2025-01-06T00:00:00Z".parse().unwrap();
    let availability = calculate_availability(
        &Room::new("room-a", 4),
        &[],
        day,
        day + chrono::Duration::days(1),
        &config,
    )
    .unwrap();
    assert_eq!(availability.slots.len(), 1);
    assert_eq!(availability.slots[0].duration_minutes, 24 * 60);

    let written = config.to_toml_string().unwrap();
    assert!(written.contains(r#"default_operating_hours = "full_day""#), "{written}");
    assert_eq!(EngineConfig::from_toml_str(&written).unwrap(), config);
}

#[test]
fn unknown_default_hours_name_is_rejected() {
    let err = EngineConfig::from_toml_str(r#"default_operating_hours = "always""#).unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}

#[test]
fn written_config_loads_back() {
    let config = EngineConfig {
        max_alternatives: 5,
        dst_policy: DstPolicy::Skip,
        ..EngineConfig::default()
    };
    let path = std::env::temp_dir().join(format!("room-engine-config-{}.toml", std::process::id()));
    std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

    let loaded = EngineConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded, config);
}

#[test]
fn missing_file_is_a_config_error() {
    let err = EngineConfig::load("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}
