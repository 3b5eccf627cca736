//! Telegram Bot API relay (`sendMessage`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{RelayError, RelaySink};
use crate::config::defaults::{
    RELAY_HTTP_TIMEOUT_SECS, TELEGRAM_MAX_RATE_LIMIT_RETRIES, TELEGRAM_MESSAGE_LIMIT,
};

pub struct TelegramRelay {
    client: Client,
    url: String,
    cancel: CancellationToken,
}

impl TelegramRelay {
    pub fn new(api_base: &str, bot_token: &str) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(RELAY_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| RelayError::Setup(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                bot_token
            ),
            cancel: CancellationToken::new(),
        })
    }

    /// Abort in-flight requests and rate-limit waits when `cancel` fires.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    async fn send_with_retry(&self, payload: &serde_json::Value) -> Result<(), RelayError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(RelayError::Cancelled),
                r = self.client.post(&self.url).json(payload).send() => r?,
            };
            let status = response.status();

            if status.is_success() {
                return Ok(());
            }

            if status.as_u16() == 429 {
                let body: serde_json::Value = response.json().await.unwrap_or_default();
                let retry_after = body
                    .get("parameters")
                    .and_then(|p| p.get("retry_after"))
                    .and_then(|v| v.as_u64())
                    .map(Duration::from_secs);

                if attempts >= TELEGRAM_MAX_RATE_LIMIT_RETRIES {
                    warn!(
                        "[Relay] Telegram rate limit: max retries ({}) exceeded, last retry_after was {:?}",
                        TELEGRAM_MAX_RATE_LIMIT_RETRIES, retry_after
                    );
                    return Err(RelayError::RateLimited(TELEGRAM_MAX_RATE_LIMIT_RETRIES));
                }

                let wait = retry_after.unwrap_or(Duration::from_secs(1));
                debug!(
                    "[Relay] Telegram rate limited (429), waiting {:?} before retry (attempt {}/{})",
                    wait, attempts, TELEGRAM_MAX_RATE_LIMIT_RETRIES
                );
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(RelayError::Cancelled),
                    _ = tokio::time::sleep(wait) => {}
                }
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Status {
                status: status.as_u16(),
                body,
            });
        }
    }
}

#[async_trait]
impl RelaySink for TelegramRelay {
    async fn post(&self, channel: &str, body: &str, silent: bool) -> Result<(), RelayError> {
        let payload = json!({
            "chat_id": channel,
            "text": truncate_message(body, TELEGRAM_MESSAGE_LIMIT),
            "disable_notification": silent,
        });
        self.send_with_retry(&payload).await?;
        debug!(channel, silent, "[Relay] Telegram message sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

fn truncate_message(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let suffix = "\n\n[truncated]";
    let budget = limit.saturating_sub(suffix.chars().count());
    let truncated: String = text.chars().take(budget).collect();
    format!("{truncated}{suffix}")
}
