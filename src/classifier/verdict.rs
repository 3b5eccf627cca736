//! Verdict parsing
//!
//! Models wrap their JSON in code fences or prepend a BOM often enough that
//! the reply is cleaned before parsing. Everything else about the shape is
//! strict: a missing or mistyped field is a parse failure, which the
//! classifier treats as retryable.

use serde::Deserialize;

use crate::types::ClassificationResult;

const FENCE_PREFIXES: [&str; 3] = ["```json", "```yaml", "```"];

#[derive(Debug, thiserror::Error)]
pub enum VerdictError {
    #[error("Reply is not a valid verdict object: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Verdict has an empty 'text' field")]
    EmptyText,
}

#[derive(Deserialize)]
struct RawVerdict {
    text: String,
    danger: bool,
    #[serde(rename = "statusChanged")]
    status_changed: bool,
    #[serde(default)]
    principle: Option<String>,
}

/// Remove a leading BOM, surrounding code fences and whitespace.
pub fn strip_reply(raw: &str) -> &str {
    let mut s = raw.trim_start_matches('\u{feff}').trim();
    for prefix in FENCE_PREFIXES {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest;
            break;
        }
    }
    s = s.strip_suffix("```").unwrap_or(s);
    s.trim()
}

/// Parse a raw model reply into a verdict.
pub fn parse_verdict(raw: &str) -> Result<ClassificationResult, VerdictError> {
    let verdict: RawVerdict = serde_json::from_str(strip_reply(raw))?;
    if verdict.text.trim().is_empty() {
        return Err(VerdictError::EmptyText);
    }
    Ok(ClassificationResult {
        text: verdict.text,
        danger: verdict.danger,
        status_changed: verdict.status_changed,
        principle: verdict.principle.filter(|p| !p.trim().is_empty()),
    })
}
