//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use super::{GateMode, RelayMode, WatchConfig};

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
            write!(f, ", did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `WatchConfig`.
///
/// Any new field added to the config structs must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [sources]
        "sources",
        "sources.channels",
        "sources.message_limit",
        "sources.poll_interval_secs",
        "sources.feed_url",
        "sources.request_timeout_secs",
        // [batch]
        "batch",
        "batch.base_window_secs",
        "batch.extend_by_secs",
        "batch.max_window_secs",
        // [classifier]
        "classifier",
        "classifier.provider",
        "classifier.api_key",
        "classifier.model",
        "classifier.base_url",
        "classifier.max_history",
        "classifier.max_attempts",
        "classifier.base_delay_ms",
        "classifier.request_timeout_secs",
        "classifier.preamble_path",
        "classifier.glm_coding_plan",
        // [relay]
        "relay",
        "relay.mode",
        "relay.channel",
        "relay.bot_token",
        "relay.api_base",
        // [gate]
        "gate",
        "gate.mode",
        "gate.url",
        "gate.alert_type",
        "gate.suppress_when",
        "gate.bypass_first_tick",
    ];
    keys.iter().copied().collect()
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
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|&(_, dist)| dist <= 3)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Unknown keys only warn; they never fail the load.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Validate value ranges on a parsed `WatchConfig`.
///
/// Returns (errors, warnings). Errors are values that would stall or spin
/// the pipeline and must prevent startup.
pub fn validate_ranges(config: &WatchConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let s = &config.sources;
    if s.channels.is_empty() {
        errors.push("sources.channels must name at least one source".to_string());
    }
    if s.channels.iter().any(|c| c.trim().is_empty()) {
        errors.push("sources.channels contains an empty source id".to_string());
    }
    if s.poll_interval_secs == 0 {
        errors.push("sources.poll_interval_secs = 0 would poll in a busy loop".to_string());
    }
    if s.message_limit == 0 {
        errors.push("sources.message_limit = 0 would never fetch anything".to_string());
    }

    let b = &config.batch;
    if b.base_window_secs == 0 {
        errors.push("batch.base_window_secs must be > 0".to_string());
    }
    if let Some(max) = b.max_window_secs {
        if max < b.base_window_secs {
            errors.push(format!(
                "batch.max_window_secs = {} is shorter than base_window_secs = {}",
                max, b.base_window_secs
            ));
        }
    } else if b.extend_by_secs >= b.base_window_secs && b.base_window_secs > 0 {
        warnings.push(ValidationWarning {
            field: "batch.extend_by_secs".to_string(),
            message: format!(
                "batch.extend_by_secs = {} >= base_window_secs with no max_window_secs; \
                 a steady stream may never flush",
                b.extend_by_secs
            ),
            suggestion: Some("batch.max_window_secs".to_string()),
        });
    }

    let c = &config.classifier;
    if c.max_attempts == 0 {
        errors.push("classifier.max_attempts must be >= 1".to_string());
    }
    if c.max_history == 0 {
        errors.push("classifier.max_history must be >= 1".to_string());
    }
    if c.request_timeout_secs == 0 {
        errors.push("classifier.request_timeout_secs must be > 0".to_string());
    }
    if c.base_delay_ms == 0 && c.max_attempts > 1 {
        warnings.push(ValidationWarning {
            field: "classifier.base_delay_ms".to_string(),
            message: "classifier.base_delay_ms = 0 retries without any backoff".to_string(),
            suggestion: None,
        });
    }

    if config.relay.mode == RelayMode::Telegram && config.relay.channel.trim().is_empty() {
        errors.push("relay.channel must be set when relay.mode = \"telegram\"".to_string());
    }

    if config.gate.mode == GateMode::AlertApi && config.gate.url.trim().is_empty() {
        errors.push("gate.url must be set when gate.mode = \"alert_api\"".to_string());
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
