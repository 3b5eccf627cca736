//! AI Classifier - provider-agnostic verdict client
//!
//! One contract for every backend:
//! - the incoming entry is appended to a bounded history as `user`
//! - the whole history plus the time-stamped preamble is dispatched
//! - the reply is validated into a [`ClassificationResult`]; transport
//!   failures, non-2xx statuses, provider error envelopes and malformed
//!   verdicts are retried with exponential backoff
//! - on success a synthesized `assistant` summary is appended
//!
//! A failed classification leaves its `user` entry in history. Sends on one
//! instance are serialized by the history mutex, held across the whole call.

pub mod history;
pub mod providers;
pub mod retry;
pub mod verdict;

use async_trait::async_trait;
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ClassifierConfig, ProviderKind};
use crate::preamble::Preamble;
use crate::types::{ClassificationResult, ConversationEntry};

pub use history::BoundedHistory;
pub use providers::{AnthropicApi, GeminiApi, OpenAiCompatApi, OpenAiFlavor, ProviderApi};
pub use retry::RetryPolicy;
pub use verdict::{parse_verdict, VerdictError};

/// Longest response excerpt carried in an error message.
const LOG_EXCERPT_CHARS: usize = 512;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Classifier setup failed: {0}")]
    Setup(String),
    #[error("Failed to build request: {0}")]
    Request(String),
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Malformed provider response: {0}")]
    Envelope(String),
    #[error(transparent)]
    Verdict(#[from] VerdictError),
    #[error("Classification failed after {attempts} attempts, last error: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<ClassifierError>,
    },
    #[error("Classification cancelled")]
    Cancelled,
}

impl ClassifierError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClassifierError::Transport(_)
                | ClassifierError::Status { .. }
                | ClassifierError::Provider(_)
                | ClassifierError::Envelope(_)
                | ClassifierError::Verdict(_)
        )
    }
}

pub(crate) fn truncate_for_log(s: &str) -> String {
    if s.chars().count() <= LOG_EXCERPT_CHARS {
        return s.to_string();
    }
    let mut out: String = s.chars().take(LOG_EXCERPT_CHARS).collect();
    out.push_str("...");
    out
}

// ============================================================================
// Classifier Trait
// ============================================================================

/// Stateful verdict client. Selected once at startup.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one conversation turn.
    async fn send(&self, entry: ConversationEntry) -> Result<ClassificationResult, ClassifierError>;

    /// Snapshot of the current conversation history, oldest first.
    async fn history(&self) -> Vec<ConversationEntry>;

    fn supports_attachments(&self) -> bool;

    fn provider_name(&self) -> &'static str;
}

// ============================================================================
// Chat Classifier
// ============================================================================

/// [`Classifier`] over any [`ProviderApi`].
pub struct ChatClassifier<P: ProviderApi> {
    provider: P,
    http: reqwest::Client,
    history: Mutex<BoundedHistory>,
    preamble: Arc<Preamble>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl<P: ProviderApi> ChatClassifier<P> {
    pub fn new(
        provider: P,
        http: reqwest::Client,
        preamble: Arc<Preamble>,
        max_history: usize,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provider,
            http,
            history: Mutex::new(BoundedHistory::new(max_history)),
            preamble,
            retry,
            cancel,
        }
    }

    async fn attempt(&self, history: &[ConversationEntry]) -> Result<ClassificationResult, ClassifierError> {
        let system = self.preamble.render(Local::now());
        let body = self.provider.request_body(&system, history);
        let request = self
            .provider
            .authorize(self.http.post(self.provider.endpoint()))
            .json(&body);

        let exchange = async {
            let response = request.send().await.map_err(|e| {
                if e.is_builder() {
                    ClassifierError::Request(e.to_string())
                } else {
                    ClassifierError::Transport(e)
                }
            })?;
            let status = response.status();
            let bytes = response.bytes().await?;
            Ok::<_, ClassifierError>((status, bytes))
        };

        // Cancellation covers the body read as well as the request.
        let (status, bytes) = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ClassifierError::Cancelled),
            r = exchange => r?,
        };
        if !status.is_success() {
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&String::from_utf8_lossy(&bytes)),
            });
        }

        let reply = self.provider.extract_reply(&bytes)?;
        debug!(provider = self.provider.name(), reply = %truncate_for_log(&reply), "[Classifier] Raw reply");
        Ok(parse_verdict(&reply)?)
    }
}

#[async_trait]
impl<P: ProviderApi> Classifier for ChatClassifier<P> {
    async fn send(&self, mut entry: ConversationEntry) -> Result<ClassificationResult, ClassifierError> {
        let mut history = self.history.lock().await;

        if !self.provider.supports_attachments() && !entry.attachments.is_empty() {
            debug!(
                provider = self.provider.name(),
                dropped = entry.attachments.len(),
                "[Classifier] Provider is text-only, dropping attachments"
            );
            entry.attachments.clear();
        }
        history.push(entry);

        let mut last_error = None;
        for attempt in 1..=self.retry.max_attempts {
            if let Some(delay) = self.retry.delay_before(attempt) {
                info!(
                    provider = self.provider.name(),
                    attempt,
                    max_attempts = self.retry.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "[Classifier] Retrying after backoff"
                );
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(ClassifierError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let outcome = self.attempt(history.as_slice()).await;
            match outcome {
                Ok(result) => {
                    history.push(ConversationEntry::assistant(result.history_summary()));
                    info!(
                        provider = self.provider.name(),
                        attempt,
                        danger = result.danger,
                        status_changed = result.status_changed,
                        history_len = history.len(),
                        "[Classifier] Verdict received"
                    );
                    return Ok(result);
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        provider = self.provider.name(),
                        attempt,
                        error = %e,
                        "[Classifier] Attempt failed"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let last = last_error.unwrap_or_else(|| ClassifierError::Setup("no attempts configured".to_string()));
        Err(ClassifierError::Exhausted {
            attempts: self.retry.max_attempts,
            last: Box::new(last),
        })
    }

    async fn history(&self) -> Vec<ConversationEntry> {
        self.history.lock().await.snapshot()
    }

    fn supports_attachments(&self) -> bool {
        self.provider.supports_attachments()
    }

    fn provider_name(&self) -> &'static str {
        self.provider.name()
    }
}

// ============================================================================
// Factory
// ============================================================================

/// HTTP client with the per-attempt timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, ClassifierError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ClassifierError::Setup(format!("HTTP client: {e}")))
}

/// Build the configured classifier.
pub fn build_classifier(
    config: &ClassifierConfig,
    preamble: Arc<Preamble>,
    cancel: CancellationToken,
) -> Result<Arc<dyn Classifier>, ClassifierError> {
    let api_key = config.resolve_api_key().ok_or_else(|| {
        ClassifierError::Setup(format!(
            "no API key for provider '{}': set classifier.api_key or {}",
            config.provider,
            config.provider.api_key_env()
        ))
    })?;
    let http = http_client(config.request_timeout())?;
    let retry = RetryPolicy::from_config(config);
    let model = config.model.clone();
    let base_url = config.base_url.clone();

    fn boxed<P: ProviderApi>(
        provider: P,
        http: reqwest::Client,
        preamble: Arc<Preamble>,
        max_history: usize,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Arc<dyn Classifier> {
        Arc::new(ChatClassifier::new(provider, http, preamble, max_history, retry, cancel))
    }

    let compat = |flavor| OpenAiCompatApi::new(flavor, api_key.clone(), model.clone(), base_url.clone());

    let classifier = match config.provider {
        ProviderKind::Anthropic => boxed(
            AnthropicApi::new(api_key.clone(), model.clone(), base_url.clone()),
            http,
            preamble,
            config.max_history,
            retry,
            cancel,
        ),
        ProviderKind::Gemini => boxed(
            GeminiApi::new(api_key.clone(), model.clone(), base_url.clone()),
            http,
            preamble,
            config.max_history,
            retry,
            cancel,
        ),
        ProviderKind::OpenAi => boxed(compat(OpenAiFlavor::OpenAi), http, preamble, config.max_history, retry, cancel),
        ProviderKind::DeepSeek => boxed(compat(OpenAiFlavor::DeepSeek), http, preamble, config.max_history, retry, cancel),
        ProviderKind::OpenRouter => boxed(compat(OpenAiFlavor::OpenRouter), http, preamble, config.max_history, retry, cancel),
        ProviderKind::Glm => boxed(
            compat(OpenAiFlavor::Glm {
                coding_plan: config.glm_coding_plan,
            }),
            http,
            preamble,
            config.max_history,
            retry,
            cancel,
        ),
    };

    info!(
        provider = classifier.provider_name(),
        multimodal = classifier.supports_attachments(),
        max_history = config.max_history,
        max_attempts = retry.max_attempts,
        "[Classifier] Initialized"
    );
    Ok(classifier)
}
