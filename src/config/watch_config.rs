//! Watcher Configuration - every tunable as a TOML value
//!
//! Each struct implements `Default` with the values in [`super::defaults`],
//! so a missing file or a partial file always yields a runnable config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;
use crate::batch::WindowConfig;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "SIRENWATCH_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "sirenwatch.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `WatchConfig::load()` which searches:
/// 1. the `--config` path
/// 2. `$SIRENWATCH_CONFIG`
/// 3. `./sirenwatch.toml`
/// 4. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Monitored sources and polling cadence
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Debounce window timing
    #[serde(default)]
    pub batch: BatchConfig,

    /// AI classification backend
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Notification sink
    #[serde(default)]
    pub relay: RelayConfig,

    /// Optional poll-tick gate
    #[serde(default)]
    pub gate: GateConfig,
}

impl WatchConfig {
    /// Load configuration using the standard search order.
    ///
    /// An explicit path (the `--config` flag) wins over the search. A file
    /// that is found but cannot be read, parsed or validated is an error;
    /// only the absence of any file falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = Self::locate(explicit) {
            let config = Self::load_from_file(&path)?;
            info!(path = %path.display(), "Loaded config");
            return Ok(config);
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Resolve which config file `load` would read, if any.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        // 1. CLI flag
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        // 2. Env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // 3. ./sirenwatch.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        local.exists().then_some(local)
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are logged as warnings; range violations are errors.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate values that would make the pipeline stall or spin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (errors, warnings) = super::validation::validate_ranges(self);
        for w in &warnings {
            warn!("{}", w);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Sources
// ============================================================================

/// Monitored channels and the feed they are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Source identifiers (channel usernames or numeric ids)
    pub channels: Vec<String>,
    /// Messages requested per source per tick
    pub message_limit: usize,
    /// Seconds between poll ticks
    pub poll_interval_secs: u64,
    /// Base URL of the message feed; `GET {feed_url}/{source}?limit=N`
    pub feed_url: String,
    /// Per-request timeout for the feed
    pub request_timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            channels: vec![
                "odessa_infonews".to_string(),
                "xydessa_live".to_string(),
                "freechat_odesa".to_string(),
            ],
            message_limit: defaults::MESSAGE_LIMIT,
            poll_interval_secs: defaults::POLL_INTERVAL_SECS,
            feed_url: "http://127.0.0.1:8088/channels".to_string(),
            request_timeout_secs: defaults::SOURCE_HTTP_TIMEOUT_SECS,
        }
    }
}

impl SourcesConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

// ============================================================================
// Batching
// ============================================================================

/// Debounce window timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub base_window_secs: u64,
    pub extend_by_secs: u64,
    /// Optional hard cap on total window length
    pub max_window_secs: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            base_window_secs: defaults::BASE_WINDOW_SECS,
            extend_by_secs: defaults::EXTEND_BY_SECS,
            max_window_secs: None,
        }
    }
}

impl BatchConfig {
    pub fn window(&self) -> WindowConfig {
        WindowConfig {
            base_window: Duration::from_secs(self.base_window_secs),
            extend_by: Duration::from_secs(self.extend_by_secs),
            max_window: self.max_window_secs.map(Duration::from_secs),
        }
    }
}

// ============================================================================
// Classifier
// ============================================================================

/// Supported classification backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    DeepSeek,
    Gemini,
    Glm,
    OpenRouter,
}

impl ProviderKind {
    /// Environment variable consulted when `api_key` is empty.
    pub fn api_key_env(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::Glm => "GLM_API_KEY",
            ProviderKind::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Glm => "glm",
            ProviderKind::OpenRouter => "openrouter",
        };
        f.write_str(name)
    }
}

/// AI classification backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub provider: ProviderKind,
    /// Empty means "read the provider's env var"
    pub api_key: String,
    /// Overrides the provider's default model
    pub model: Option<String>,
    /// Overrides the provider's endpoint (useful for proxies and tests)
    pub base_url: Option<String>,
    pub max_history: usize,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub preamble_path: PathBuf,
    /// GLM coding-plan endpoint; text-only
    pub glm_coding_plan: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Anthropic,
            api_key: String::new(),
            model: None,
            base_url: None,
            max_history: defaults::MAX_HISTORY,
            max_attempts: defaults::MAX_ATTEMPTS,
            base_delay_ms: defaults::BASE_DELAY_MS,
            request_timeout_secs: defaults::CLASSIFIER_HTTP_TIMEOUT_SECS,
            preamble_path: PathBuf::from(defaults::PREAMBLE_PATH),
            glm_coding_plan: false,
        }
    }
}

impl ClassifierConfig {
    /// API key from the config, falling back to the provider's env var.
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        std::env::var(self.provider.api_key_env())
            .ok()
            .filter(|k| !k.is_empty())
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============================================================================
// Relay
// ============================================================================

/// Where verdicts go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Only log the would-be post
    Log,
    /// Telegram Bot API `sendMessage`
    Telegram,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub mode: RelayMode,
    /// Target channel / chat (e.g. `@odesair` or a numeric chat id)
    pub channel: String,
    /// Empty means `TELEGRAM_BOT_TOKEN`
    pub bot_token: String,
    pub api_base: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mode: RelayMode::Log,
            channel: "@odesair".to_string(),
            bot_token: String::new(),
            api_base: defaults::TELEGRAM_API_BASE.to_string(),
        }
    }
}

impl RelayConfig {
    pub fn resolve_bot_token(&self) -> Option<String> {
        if !self.bot_token.is_empty() {
            return Some(self.bot_token.clone());
        }
        std::env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
    }
}

// ============================================================================
// Gate
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Every tick runs
    None,
    /// Consult an alert-status API before each tick
    AlertApi,
}

/// Which alert state suppresses a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuppressWhen {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub mode: GateMode,
    pub url: String,
    pub alert_type: String,
    pub suppress_when: SuppressWhen,
    /// Never suppress the very first tick
    pub bypass_first_tick: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            mode: GateMode::None,
            url: "https://siren.pp.ua/api/v3/alerts/964".to_string(),
            alert_type: defaults::GATE_ALERT_TYPE.to_string(),
            suppress_when: SuppressWhen::Active,
            bypass_first_tick: true,
        }
    }
}
