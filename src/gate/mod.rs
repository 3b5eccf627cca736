//! Poll-tick gate
//!
//! A gate reports whether an external condition is active; the coordinator
//! combines that with `suppress_when` to decide if a tick runs.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::{defaults, GateConfig, GateMode, SuppressWhen};

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Alert API returned status {0}")]
    Status(u16),
    #[error("Malformed alert payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Gate setup failed: {0}")]
    Setup(String),
}

#[async_trait]
pub trait AlertGate: Send + Sync {
    /// Whether the watched condition is currently active.
    async fn is_active(&self) -> Result<bool, GateError>;
}

/// Gate that never reports an active condition.
#[derive(Debug, Default)]
pub struct AlwaysOpen;

#[async_trait]
impl AlertGate for AlwaysOpen {
    async fn is_active(&self) -> Result<bool, GateError> {
        Ok(false)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegionStatus {
    #[serde(default)]
    active_alerts: Vec<ActiveAlert>,
}

#[derive(Deserialize)]
struct ActiveAlert {
    #[serde(default, rename = "type")]
    kind: String,
}

/// Air-alert status API: a JSON array of regions with `activeAlerts[].type`.
pub struct AlertApiGate {
    http: reqwest::Client,
    url: String,
    alert_type: String,
}

impl AlertApiGate {
    pub fn new(url: &str, alert_type: &str) -> Result<Self, GateError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(defaults::GATE_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| GateError::Setup(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.to_string(),
            alert_type: alert_type.to_string(),
        })
    }
}

/// True when any region carries an alert of `alert_type`.
fn alert_present(body: &[u8], alert_type: &str) -> Result<bool, GateError> {
    let regions: Vec<RegionStatus> = serde_json::from_slice(body)?;
    Ok(regions
        .iter()
        .flat_map(|r| r.active_alerts.iter())
        .any(|a| a.kind == alert_type))
}

#[async_trait]
impl AlertGate for AlertApiGate {
    async fn is_active(&self) -> Result<bool, GateError> {
        let response = self.http.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GateError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        alert_present(&body, &self.alert_type)
    }
}

/// Whether a tick should be skipped for the given gate state.
pub fn suppresses(suppress_when: SuppressWhen, active: bool) -> bool {
    match suppress_when {
        SuppressWhen::Active => active,
        SuppressWhen::Inactive => !active,
    }
}

pub fn build_gate(config: &GateConfig) -> Result<Arc<dyn AlertGate>, GateError> {
    match config.mode {
        GateMode::None => Ok(Arc::new(AlwaysOpen)),
        GateMode::AlertApi => Ok(Arc::new(AlertApiGate::new(&config.url, &config.alert_type)?)),
    }
}
