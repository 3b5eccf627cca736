//! OpenAI-compatible chat completions
//!
//! One wire format shared by OpenAI, DeepSeek, GLM and OpenRouter. The
//! flavor only changes the endpoint, default model, a few body extras and
//! whether images are forwarded.

use serde::Deserialize;
use serde_json::{json, Value};

use super::{data_url, parse_envelope, ProviderApi};
use crate::classifier::ClassifierError;
use crate::types::ConversationEntry;

pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEEPSEEK_ENDPOINT: &str = "https://api.deepseek.com/v1/chat/completions";
pub const GLM_ENDPOINT: &str = "https://api.z.ai/api/paas/v4/chat/completions";
pub const GLM_CODING_ENDPOINT: &str = "https://api.z.ai/api/coding/paas/v4/chat/completions";
pub const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiFlavor {
    OpenAi,
    DeepSeek,
    /// `coding_plan` selects the text-only coding-plan endpoint
    Glm { coding_plan: bool },
    OpenRouter,
}

impl OpenAiFlavor {
    fn name(self) -> &'static str {
        match self {
            OpenAiFlavor::OpenAi => "openai",
            OpenAiFlavor::DeepSeek => "deepseek",
            OpenAiFlavor::Glm { .. } => "glm",
            OpenAiFlavor::OpenRouter => "openrouter",
        }
    }

    fn default_endpoint(self) -> &'static str {
        match self {
            OpenAiFlavor::OpenAi => OPENAI_ENDPOINT,
            OpenAiFlavor::DeepSeek => DEEPSEEK_ENDPOINT,
            OpenAiFlavor::Glm { coding_plan: false } => GLM_ENDPOINT,
            OpenAiFlavor::Glm { coding_plan: true } => GLM_CODING_ENDPOINT,
            OpenAiFlavor::OpenRouter => OPENROUTER_ENDPOINT,
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            OpenAiFlavor::OpenAi => "o3-mini",
            OpenAiFlavor::DeepSeek => "deepseek-chat",
            OpenAiFlavor::Glm { .. } => "glm-5",
            OpenAiFlavor::OpenRouter => "google/gemini-2.5-pro-exp-03-25:free",
        }
    }

    fn multimodal(self) -> bool {
        !matches!(self, OpenAiFlavor::Glm { coding_plan: true })
    }
}

pub struct OpenAiCompatApi {
    flavor: OpenAiFlavor,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiCompatApi {
    pub fn new(
        flavor: OpenAiFlavor,
        api_key: impl Into<String>,
        model: Option<String>,
        endpoint: Option<String>,
    ) -> Self {
        Self {
            flavor,
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| flavor.default_model().to_string()),
            endpoint: endpoint.unwrap_or_else(|| flavor.default_endpoint().to_string()),
        }
    }

    pub fn flavor(&self) -> OpenAiFlavor {
        self.flavor
    }

    fn message(&self, entry: &ConversationEntry) -> Value {
        if !self.flavor.multimodal() || entry.attachments.is_empty() {
            return json!({ "role": entry.role.as_str(), "content": entry.text });
        }

        let mut parts = Vec::with_capacity(entry.attachments.len() + 1);
        if !entry.text.is_empty() {
            parts.push(json!({ "type": "text", "text": entry.text }));
        }
        parts.extend(entry.attachments.iter().map(|a| {
            json!({ "type": "image_url", "image_url": { "url": data_url(a) } })
        }));
        json!({ "role": entry.role.as_str(), "content": parts })
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<Value>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl ProviderApi for OpenAiCompatApi {
    fn name(&self) -> &'static str {
        self.flavor.name()
    }

    fn supports_attachments(&self) -> bool {
        self.flavor.multimodal()
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.bearer_auth(&self.api_key);
        match self.flavor {
            OpenAiFlavor::Glm { .. } => request.header("Accept-Language", "en-US,en"),
            _ => request,
        }
    }

    fn request_body(&self, system: &str, history: &[ConversationEntry]) -> Value {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(json!({ "role": "system", "content": system }));
        messages.extend(history.iter().map(|e| self.message(e)));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });

        match self.flavor {
            OpenAiFlavor::OpenAi => {
                body["response_format"] = json!({ "type": "json_object" });
            }
            OpenAiFlavor::Glm { .. } => {
                body["temperature"] = json!(1.0);
                body["max_tokens"] = json!(4096);
                body["thinking"] = json!({ "type": "enabled" });
            }
            OpenAiFlavor::DeepSeek | OpenAiFlavor::OpenRouter => {}
        }
        body
    }

    fn extract_reply(&self, body: &[u8]) -> Result<String, ClassifierError> {
        let resp: CompletionResponse = parse_envelope(self.name(), body)?;

        if let Some(err) = resp.error {
            let message = err.message.unwrap_or_default();
            if !message.is_empty() {
                return Err(ClassifierError::Provider(format!(
                    "{} {} (type: {}, code: {})",
                    self.name(),
                    message,
                    err.kind.as_deref().unwrap_or("-"),
                    err.code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
                )));
            }
        }

        if let Some(usage) = resp.usage {
            tracing::debug!(
                provider = self.name(),
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "[Classifier] Token usage"
            );
        }

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ClassifierError::Provider(format!("no choices in {} response", self.name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Attachment;

    fn with_image() -> Vec<ConversationEntry> {
        vec![ConversationEntry::user(
            "photo",
            vec![Attachment::new("image/jpeg", vec![1, 2, 3])],
        )]
    }

    #[test]
    fn test_system_message_first() {
        let api = OpenAiCompatApi::new(OpenAiFlavor::DeepSeek, "k", None, None);
        let body = api.request_body("rules", &[ConversationEntry::user("hi", vec![])]);

        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "rules");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_openai_requests_json_object() {
        let api = OpenAiCompatApi::new(OpenAiFlavor::OpenAi, "k", None, None);
        let body = api.request_body("rules", &[]);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_images_as_data_urls() {
        let api = OpenAiCompatApi::new(OpenAiFlavor::OpenRouter, "k", None, None);
        let body = api.request_body("rules", &with_image());
        let content = &body["messages"][1]["content"];

        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["image_url"]["url"], "data:image/jpeg;base64,AQID");
    }

    #[test]
    fn test_glm_coding_plan_is_text_only() {
        let api = OpenAiCompatApi::new(OpenAiFlavor::Glm { coding_plan: true }, "k", None, None);
        assert!(!api.supports_attachments());
        assert_eq!(api.endpoint(), GLM_CODING_ENDPOINT);

        let body = api.request_body("rules", &with_image());
        assert_eq!(body["messages"][1]["content"], "photo");
        assert_eq!(body["thinking"]["type"], "enabled");
    }

    #[test]
    fn test_glm_general_endpoint_is_multimodal() {
        let api = OpenAiCompatApi::new(OpenAiFlavor::Glm { coding_plan: false }, "k", None, None);
        assert!(api.supports_attachments());
        assert_eq!(api.endpoint(), GLM_ENDPOINT);
    }

    #[test]
    fn test_extract_reply() {
        let api = OpenAiCompatApi::new(OpenAiFlavor::OpenAi, "k", None, None);
        let body = br#"{"choices":[{"message":{"role":"assistant","content":"{}"}}]}"#;
        assert_eq!(api.extract_reply(body).unwrap(), "{}");
    }

    #[test]
    fn test_error_envelope_with_numeric_code() {
        let api = OpenAiCompatApi::new(OpenAiFlavor::OpenRouter, "k", None, None);
        let body = br#"{"error":{"message":"Rate limit exceeded","code":429}}"#;
        let err = api.extract_reply(body).unwrap_err();
        assert!(matches!(err, ClassifierError::Provider(ref m) if m.contains("Rate limit")));
    }

    #[test]
    fn test_empty_choices() {
        let api = OpenAiCompatApi::new(OpenAiFlavor::DeepSeek, "k", None, None);
        assert!(api.extract_reply(br#"{"choices":[]}"#).unwrap_err().is_retryable());
    }

    #[test]
    fn test_endpoint_override() {
        let api = OpenAiCompatApi::new(
            OpenAiFlavor::OpenAi,
            "k",
            Some("gpt-4o".to_string()),
            Some("http://127.0.0.1:9/v1/chat/completions".to_string()),
        );
        assert_eq!(api.endpoint(), "http://127.0.0.1:9/v1/chat/completions");
        assert_eq!(api.request_body("", &[])["model"], "gpt-4o");
    }
}
