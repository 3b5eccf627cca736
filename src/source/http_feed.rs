//! HTTP JSON feed source
//!
//! `GET {feed_url}/{source_id}?limit=N` returning
//! `[{"id": 43, "text": "...", "attachments": [{"content_type": "image/jpeg", "data": "<base64>"}]}]`.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;

use super::{MessageSource, RawMessage, SourceError};
use crate::types::Attachment;

#[derive(Deserialize)]
struct FeedMessage {
    id: i64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    attachments: Vec<FeedAttachment>,
}

#[derive(Deserialize)]
struct FeedAttachment {
    content_type: String,
    data: String,
}

pub struct HttpFeedSource {
    http: reqwest::Client,
    feed_url: String,
}

impl HttpFeedSource {
    pub fn new(feed_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Setup(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            feed_url: feed_url.trim_end_matches('/').to_string(),
        })
    }
}

fn decode(source_id: &str, messages: Vec<FeedMessage>) -> Result<Vec<RawMessage>, SourceError> {
    messages
        .into_iter()
        .map(|m| {
            let attachments = m
                .attachments
                .into_iter()
                .map(|a| {
                    STANDARD
                        .decode(a.data.as_bytes())
                        .map(|data| Attachment::new(a.content_type, data))
                        .map_err(|e| SourceError::Decode {
                            source_id: source_id.to_string(),
                            reason: format!("attachment of message {}: {e}", m.id),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(RawMessage {
                sequence_id: m.id,
                text: m.text,
                attachments,
            })
        })
        .collect()
}

#[async_trait]
impl MessageSource for HttpFeedSource {
    async fn poll(&self, source_id: &str, limit: usize) -> Result<Vec<RawMessage>, SourceError> {
        let response = self
            .http
            .get(format!("{}/{}", self.feed_url, source_id))
            .query(&[("limit", limit)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                source_id: source_id.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let messages: Vec<FeedMessage> =
            serde_json::from_slice(&bytes).map_err(|e| SourceError::Decode {
                source_id: source_id.to_string(),
                reason: e.to_string(),
            })?;
        decode(source_id, messages)
    }

    fn source_name(&self) -> &str {
        "http-feed"
    }
}
