//! Relay - verdict to notification
//!
//! [`decide`] is the whole decision protocol; it is pure so the truth table
//! is testable without a sink. [`RelaySink`] implementations only move text.

pub mod telegram;

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{RelayConfig, RelayMode};
use crate::types::{ClassificationResult, RelayAction};

pub use telegram::TelegramRelay;

pub const DANGER_GLYPH: &str = "🚨";
pub const SAFE_GLYPH: &str = "✅";

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Relay setup failed: {0}")]
    Setup(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Relay returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Relay rate limit exceeded after {0} retries")]
    RateLimited(u32),
    #[error("Relay cancelled")]
    Cancelled,
}

/// Map a verdict to a notification, or `None` when nothing changed.
///
/// Dangerous verdicts notify loudly; safe ones are posted silently.
pub fn decide(result: &ClassificationResult) -> Option<RelayAction> {
    if !result.status_changed {
        return None;
    }
    let glyph = if result.danger { DANGER_GLYPH } else { SAFE_GLYPH };
    Some(RelayAction {
        send: true,
        silent: !result.danger,
        body: format!("{} {}", glyph, result.text),
    })
}

/// Downstream notification channel.
#[async_trait]
pub trait RelaySink: Send + Sync {
    async fn post(&self, channel: &str, body: &str, silent: bool) -> Result<(), RelayError>;

    fn name(&self) -> &'static str;
}

/// Sink that only logs what would be posted.
#[derive(Debug, Default)]
pub struct LogRelay;

#[async_trait]
impl RelaySink for LogRelay {
    async fn post(&self, channel: &str, body: &str, silent: bool) -> Result<(), RelayError> {
        info!(channel, silent, body, "[Relay] Dry-run post");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Build the configured sink. `dry_run` forces [`LogRelay`].
///
/// `cancel` interrupts rate-limit waits of network sinks.
pub fn build_relay(
    config: &RelayConfig,
    dry_run: bool,
    cancel: CancellationToken,
) -> Result<Arc<dyn RelaySink>, RelayError> {
    if dry_run || config.mode == RelayMode::Log {
        return Ok(Arc::new(LogRelay));
    }

    let token = config.resolve_bot_token().ok_or_else(|| {
        RelayError::Setup("relay.mode = \"telegram\" needs relay.bot_token or TELEGRAM_BOT_TOKEN".to_string())
    })?;
    Ok(Arc::new(TelegramRelay::new(&config.api_base, &token)?.with_cancel(cancel)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(danger: bool, status_changed: bool) -> ClassificationResult {
        ClassificationResult {
            text: "Drones heading north".to_string(),
            danger,
            status_changed,
            principle: None,
        }
    }

    #[test]
    fn test_unchanged_status_sends_nothing() {
        assert_eq!(decide(&verdict(true, false)), None);
        assert_eq!(decide(&verdict(false, false)), None);
    }

    #[test]
    fn test_danger_is_loud() {
        let action = decide(&verdict(true, true)).unwrap();
        assert!(action.send);
        assert!(!action.silent);
        assert_eq!(action.body, "🚨 Drones heading north");
    }

    #[test]
    fn test_all_clear_is_silent() {
        let action = decide(&verdict(false, true)).unwrap();
        assert!(action.send);
        assert!(action.silent);
        assert_eq!(action.body, "✅ Drones heading north");
    }

    #[tokio::test]
    async fn test_dry_run_forces_log_relay() {
        let config = RelayConfig {
            mode: RelayMode::Telegram,
            ..RelayConfig::default()
        };
        let sink = build_relay(&config, true, CancellationToken::new()).unwrap();
        assert_eq!(sink.name(), "log");
        assert!(sink.post("@chan", "body", true).await.is_ok());
    }
}
