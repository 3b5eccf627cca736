//! Anthropic Messages API.

use serde::Deserialize;
use serde_json::{json, Value};

use super::{encode_base64, parse_envelope, ProviderApi};
use crate::classifier::ClassifierError;
use crate::types::{ConversationEntry, Role};

pub const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";
const MAX_TOKENS: u32 = 1000;

pub struct AnthropicApi {
    api_key: String,
    model: String,
    endpoint: String,
}

impl AnthropicApi {
    pub fn new(api_key: impl Into<String>, model: Option<String>, endpoint: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            endpoint: endpoint.unwrap_or_else(|| ANTHROPIC_ENDPOINT.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn message(entry: &ConversationEntry) -> Value {
    if entry.attachments.is_empty() {
        return json!({ "role": entry.role.as_str(), "content": entry.text });
    }

    let mut parts: Vec<Value> = entry
        .attachments
        .iter()
        .map(|a| {
            json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": a.content_type,
                    "data": encode_base64(a),
                }
            })
        })
        .collect();
    if !entry.text.is_empty() {
        parts.push(json!({ "type": "text", "text": entry.text }));
    }
    json!({ "role": entry.role.as_str(), "content": parts })
}

impl ProviderApi for AnthropicApi {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn supports_attachments(&self) -> bool {
        true
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }

    fn request_body(&self, system: &str, history: &[ConversationEntry]) -> Value {
        // The preamble travels in `system`; the API rejects system-role turns.
        let messages: Vec<Value> = history
            .iter()
            .filter(|e| e.role != Role::System)
            .map(message)
            .collect();

        json!({
            "model": self.model,
            "system": system,
            "messages": messages,
            "max_tokens": MAX_TOKENS,
        })
    }

    fn extract_reply(&self, body: &[u8]) -> Result<String, ClassifierError> {
        let resp: MessagesResponse = parse_envelope(self.name(), body)?;

        if let Some(err) = resp.error {
            return Err(ClassifierError::Provider(format!(
                "anthropic {}: {}",
                err.kind.unwrap_or_else(|| "error".to_string()),
                err.message.unwrap_or_default()
            )));
        }

        resp.content
            .into_iter()
            .find_map(|block| block.text.filter(|t| !t.is_empty()))
            .ok_or_else(|| ClassifierError::Provider("empty content in anthropic response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Attachment;

    fn api() -> AnthropicApi {
        AnthropicApi::new("key", None, None)
    }

    #[test]
    fn test_body_uses_system_field() {
        let history = vec![
            ConversationEntry::user("hello", vec![]),
            ConversationEntry::assistant("calm Danger: false StatusChanged: false"),
        ];
        let body = api().request_body("preamble", &history);

        assert_eq!(body["system"], "preamble");
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["messages"][1]["role"], "assistant");
    }

    #[test]
    fn test_attachments_become_image_blocks() {
        let history = vec![ConversationEntry::user(
            "look",
            vec![Attachment::new("image/jpeg", vec![1, 2, 3])],
        )];
        let body = api().request_body("p", &history);
        let content = &body["messages"][0]["content"];

        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["media_type"], "image/jpeg");
        assert_eq!(content[0]["source"]["data"], "AQID");
        assert_eq!(content[1]["text"], "look");
    }

    #[test]
    fn test_extract_first_text_block() {
        let body = br#"{"content":[{"type":"text","text":"{\"text\":\"x\"}"}]}"#;
        assert_eq!(api().extract_reply(body).unwrap(), r#"{"text":"x"}"#);
    }

    #[test]
    fn test_error_envelope() {
        let body = br#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let err = api().extract_reply(body).unwrap_err();
        assert!(matches!(err, ClassifierError::Provider(ref m) if m.contains("Overloaded")));
    }

    #[test]
    fn test_empty_content_is_provider_error() {
        let err = api().extract_reply(br#"{"content":[]}"#).unwrap_err();
        assert!(err.is_retryable());
    }
}
