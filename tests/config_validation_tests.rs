//! Config Validation Tests
//!
//! Typo detection and range validation for `sirenwatch.toml`, exercised
//! independently from the rest of the pipeline.

use sirenwatch::config::validation::{
    known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys,
};
use sirenwatch::config::{ConfigError, GateMode, RelayMode, WatchConfig};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_batch_section_warns_with_suggestion() {
    let toml_str = r#"
[batch]
base_windw_secs = 30
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("base_windw_secs"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("batch.base_window_secs")
    );
}

#[test]
fn typo_in_relay_section_warns() {
    let toml_str = r#"
[relay]
chanel = "@somewhere"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("relay.channel"));
}

#[test]
fn full_valid_config_produces_zero_warnings() {
    let toml_str = r#"
[sources]
channels = ["odessa_infonews", "xydessa_live"]
message_limit = 5
poll_interval_secs = 5
feed_url = "http://127.0.0.1:8088/channels"
request_timeout_secs = 10

[batch]
base_window_secs = 30
extend_by_secs = 15
max_window_secs = 120

[classifier]
provider = "glm"
api_key = "k"
model = "glm-5"
max_history = 20
max_attempts = 5
base_delay_ms = 1000
request_timeout_secs = 60
preamble_path = "preamble.txt"
glm_coding_plan = true

[relay]
mode = "telegram"
channel = "@odesair"
bot_token = "t"
api_base = "https://api.telegram.org"

[gate]
mode = "alert_api"
url = "https://siren.pp.ua/api/v3/alerts/964"
alert_type = "AIR"
suppress_when = "active"
bypass_first_tick = true
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(
        warnings.is_empty(),
        "Valid config should produce 0 warnings, got: {:?}",
        warnings.iter().map(|w| &w.field).collect::<Vec<_>>()
    );
    let config = WatchConfig::from_toml_str(toml_str).expect("valid config should load");
    assert_eq!(config.relay.mode, RelayMode::Telegram);
    assert_eq!(config.gate.mode, GateMode::AlertApi);
    assert_eq!(config.batch.max_window_secs, Some(120));
}

#[test]
fn unknown_section_warns() {
    let toml_str = r#"
[metrics]
port = 9090
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.iter().any(|w| w.field == "metrics"));
    assert!(warnings.iter().any(|w| w.field == "metrics.port"));
}

#[test]
fn multiple_typos_all_warned() {
    let toml_str = r#"
[sources]
chanels = ["a"]

[classifier]
max_atempts = 3
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(
        warnings.len(),
        2,
        "Expected 2 warnings for 2 typos, got {}",
        warnings.len()
    );
}

#[test]
fn empty_toml_produces_zero_warnings() {
    assert!(validate_unknown_keys("").is_empty());
}

#[test]
fn known_keys_set_is_complete() {
    // Every key the default config serializes must be known.
    let config = WatchConfig::default();
    let toml_str = config.to_toml().expect("Default config should serialize");
    let warnings = validate_unknown_keys(&toml_str);
    assert!(
        warnings.is_empty(),
        "Default config serialization should produce 0 unknown-key warnings, got: {:?}",
        warnings.iter().map(|w| &w.field).collect::<Vec<_>>()
    );
}

#[test]
fn suggest_correction_finds_close_match() {
    let known = known_config_keys();
    let s = suggest_correction("gate.bypass_frist_tick", &known);
    assert_eq!(s.as_deref(), Some("gate.bypass_first_tick"));
}

#[test]
fn suggest_correction_returns_none_for_garbage() {
    let known = known_config_keys();
    assert!(suggest_correction("zzz_completely_invalid_xyz_12345", &known).is_none());
}

#[test]
fn warning_display_includes_suggestion() {
    let warnings = validate_unknown_keys("[gate]\nurll = \"x\"\n");
    assert_eq!(warnings.len(), 1);
    let rendered = warnings[0].to_string();
    assert!(rendered.contains("did you mean 'gate.url'?"), "got: {rendered}");
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn zero_poll_interval_is_error() {
    let mut config = WatchConfig::default();
    config.sources.poll_interval_secs = 0;
    let (errors, _) = validate_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("poll_interval_secs")));
}

#[test]
fn empty_channel_list_is_error() {
    let mut config = WatchConfig::default();
    config.sources.channels.clear();
    let (errors, _) = validate_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("sources.channels")));
}

#[test]
fn blank_channel_id_is_error() {
    let mut config = WatchConfig::default();
    config.sources.channels.push("   ".to_string());
    let (errors, _) = validate_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("empty source id")));
}

#[test]
fn max_window_shorter_than_base_is_error() {
    let mut config = WatchConfig::default();
    config.batch.base_window_secs = 30;
    config.batch.max_window_secs = Some(10);
    let (errors, _) = validate_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("max_window_secs")));
}

#[test]
fn uncapped_extension_at_least_base_warns() {
    let mut config = WatchConfig::default();
    config.batch.base_window_secs = 10;
    config.batch.extend_by_secs = 10;
    config.batch.max_window_secs = None;
    let (errors, warnings) = validate_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.iter().any(|w| w.field == "batch.extend_by_secs"));
}

#[test]
fn capped_extension_does_not_warn() {
    let mut config = WatchConfig::default();
    config.batch.base_window_secs = 10;
    config.batch.extend_by_secs = 10;
    config.batch.max_window_secs = Some(60);
    let (errors, warnings) = validate_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.is_empty());
}

#[test]
fn zero_attempts_and_history_are_errors() {
    let mut config = WatchConfig::default();
    config.classifier.max_attempts = 0;
    config.classifier.max_history = 0;
    let (errors, _) = validate_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("max_attempts")));
    assert!(errors.iter().any(|e| e.contains("max_history")));
}

#[test]
fn telegram_without_channel_is_error() {
    let mut config = WatchConfig::default();
    config.relay.mode = RelayMode::Telegram;
    config.relay.channel = String::new();
    let (errors, _) = validate_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("relay.channel")));
}

#[test]
fn alert_gate_without_url_is_error() {
    let mut config = WatchConfig::default();
    config.gate.mode = GateMode::AlertApi;
    config.gate.url = " ".to_string();
    let (errors, _) = validate_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("gate.url")));
}

#[test]
fn from_toml_str_rejects_range_errors() {
    let result = WatchConfig::from_toml_str("[sources]\npoll_interval_secs = 0\n");
    match result {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("poll_interval_secs")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn from_toml_str_tolerates_unknown_keys() {
    let config = WatchConfig::from_toml_str("[batch]\nbase_window_secs = 20\nfoo = 1\n")
        .expect("unknown keys only warn");
    assert_eq!(config.batch.base_window_secs, 20);
}
