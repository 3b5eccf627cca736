//! Message source abstraction.
//!
//! A source returns the most recent messages of one monitored channel, in
//! whatever order its transport yields them. Deduplication is not the
//! source's job; the coordinator runs every message through the cursor.

pub mod http_feed;

use async_trait::async_trait;

use crate::types::Attachment;

pub use http_feed::HttpFeedSource;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Feed returned status {status} for '{source_id}'")]
    Status { source_id: String, status: u16 },
    #[error("Malformed feed payload for '{source_id}': {reason}")]
    Decode { source_id: String, reason: String },
    #[error("Source setup failed: {0}")]
    Setup(String),
}

/// One message as fetched, before admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub sequence_id: i64,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl RawMessage {
    pub fn text(sequence_id: i64, text: impl Into<String>) -> Self {
        Self {
            sequence_id,
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

/// Where monitored messages come from.
///
/// `poll` takes `&self` so every configured source can be polled
/// concurrently within one tick.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch up to `limit` recent messages of `source_id`, any order.
    async fn poll(&self, source_id: &str, limit: usize) -> Result<Vec<RawMessage>, SourceError>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}

/// Sort a poll result oldest-first by sequence id.
pub fn normalize_oldest_first(mut messages: Vec<RawMessage>) -> Vec<RawMessage> {
    messages.sort_by_key(|m| m.sequence_id);
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_is_reversed() {
        let fetched = vec![
            RawMessage::text(12, "c"),
            RawMessage::text(11, "b"),
            RawMessage::text(10, "a"),
        ];
        let ids: Vec<_> = normalize_oldest_first(fetched)
            .iter()
            .map(|m| m.sequence_id)
            .collect();
        assert_eq!(ids, [10, 11, 12]);
    }
}
