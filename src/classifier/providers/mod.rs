//! Provider wire formats
//!
//! Each provider knows how to shape a request from the rendered preamble and
//! the conversation, and how to pull the raw reply text out of a response
//! body. Transport, retries and history live in [`super::ChatClassifier`].

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicApi;
pub use gemini::GeminiApi;
pub use openai::{OpenAiCompatApi, OpenAiFlavor};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::ClassifierError;
use crate::types::{Attachment, ConversationEntry};

/// Request shaping and reply extraction for one provider.
pub trait ProviderApi: Send + Sync + 'static {
    /// Short provider name used in logs.
    fn name(&self) -> &'static str;

    /// Whether attachments are forwarded. Text-only providers get them
    /// stripped before they enter history.
    fn supports_attachments(&self) -> bool;

    /// Full URL the request is POSTed to.
    fn endpoint(&self) -> String;

    /// Attach credentials and provider-specific headers.
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder;

    /// JSON request body for the current conversation.
    fn request_body(&self, system: &str, history: &[ConversationEntry]) -> serde_json::Value;

    /// Raw reply text from a 2xx response body.
    fn extract_reply(&self, body: &[u8]) -> Result<String, ClassifierError>;
}

pub(crate) fn encode_base64(attachment: &Attachment) -> String {
    STANDARD.encode(&attachment.data)
}

/// `data:` URL used by OpenAI-style image parts.
pub(crate) fn data_url(attachment: &Attachment) -> String {
    format!(
        "data:{};base64,{}",
        attachment.content_type,
        encode_base64(attachment)
    )
}

/// Strip a UTF-8 BOM some gateways prepend to JSON bodies.
pub(crate) fn strip_bom(body: &[u8]) -> &[u8] {
    body.strip_prefix(b"\xef\xbb\xbf").unwrap_or(body)
}

/// Parse a JSON response envelope, mapping failures to a retryable error.
pub(crate) fn parse_envelope<T: serde::de::DeserializeOwned>(
    provider: &str,
    body: &[u8],
) -> Result<T, ClassifierError> {
    serde_json::from_slice(strip_bom(body)).map_err(|e| {
        ClassifierError::Envelope(format!(
            "{provider} response is not valid JSON: {e}; body: {}",
            super::truncate_for_log(&String::from_utf8_lossy(body))
        ))
    })
}
