//! Google Gemini `generateContent`.
//!
//! Gemini has no system role, so the preamble goes in as the leading user
//! turn, and assistant turns are sent with role `model`. Text only.

use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_envelope, ProviderApi};
use crate::classifier::ClassifierError;
use crate::types::{ConversationEntry, Role};

pub const GEMINI_API_ROOT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-04-17";
const THINKING_BUDGET: u32 = 2048;

pub struct GeminiApi {
    api_key: String,
    model: String,
    api_root: String,
}

impl GeminiApi {
    /// `api_root` replaces `GEMINI_API_ROOT`; `/models/{model}:generateContent`
    /// is appended to it.
    pub fn new(api_key: impl Into<String>, model: Option<String>, api_root: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_root: api_root
                .unwrap_or_else(|| GEMINI_API_ROOT.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
}

fn turn(role: &str, text: &str) -> Value {
    json!({ "role": role, "parts": [{ "text": text }] })
}

impl ProviderApi for GeminiApi {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn supports_attachments(&self) -> bool {
        false
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_root, self.model)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.query(&[("key", self.api_key.as_str())])
    }

    fn request_body(&self, system: &str, history: &[ConversationEntry]) -> Value {
        let mut contents = Vec::with_capacity(history.len() + 1);
        if !system.is_empty() {
            contents.push(turn("user", system));
        }
        for entry in history {
            let role = match entry.role {
                Role::Assistant => "model",
                Role::User => "user",
                Role::System => continue,
            };
            contents.push(turn(role, &entry.text));
        }

        json!({
            "contents": contents,
            "generationConfig": {
                "thinkingConfig": { "thinkingBudget": THINKING_BUDGET }
            }
        })
    }

    fn extract_reply(&self, body: &[u8]) -> Result<String, ClassifierError> {
        let resp: GenerateResponse = parse_envelope(self.name(), body)?;

        if let Some(message) = resp.error.and_then(|e| e.message) {
            return Err(ClassifierError::Provider(format!("gemini {message}")));
        }
        if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
            if !reason.is_empty() {
                return Err(ClassifierError::Provider(format!(
                    "gemini request blocked: {reason}"
                )));
            }
        }

        resp.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ClassifierError::Provider("no content in gemini response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> GeminiApi {
        GeminiApi::new("secret", None, None)
    }

    #[test]
    fn test_endpoint_keeps_key_out_of_path() {
        let endpoint = api().endpoint();
        assert_eq!(
            endpoint,
            format!("{GEMINI_API_ROOT}/models/{DEFAULT_MODEL}:generateContent")
        );
        assert!(!endpoint.contains("secret"));
    }

    #[test]
    fn test_preamble_leads_and_roles_mapped() {
        let history = vec![
            ConversationEntry::user("q", vec![]),
            ConversationEntry::assistant("a"),
        ];
        let body = api().request_body("rules", &history);
        let contents = body["contents"].as_array().unwrap();

        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"][0]["text"], "rules");
        assert_eq!(contents[2]["role"], "model");
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingBudget"], 2048);
    }

    #[test]
    fn test_block_reason_is_provider_error() {
        let body = br#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let err = api().extract_reply(body).unwrap_err();
        assert!(matches!(err, ClassifierError::Provider(ref m) if m.contains("SAFETY")));
    }

    #[test]
    fn test_extract_candidate_text() {
        let body = br#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"a\":1}"}]}}]}"#;
        assert_eq!(api().extract_reply(body).unwrap(), r#"{"a":1}"#);
    }
}
