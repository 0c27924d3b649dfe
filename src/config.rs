use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

pub const CHANNEL_URL_ENV: &str = "FRAMEGUARD_CHANNEL_URL";
pub const STATELESS_URL_ENV: &str = "FRAMEGUARD_STATELESS_URL";

/// Runtime settings for the background and page contexts.
///
/// Smoothing thresholds are policy constants and deliberately absent here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Long-lived channel endpoint (`ws://` or `wss://`).
    pub channel_url: String,
    /// Stateless POST endpoint (`http://` or `https://`).
    pub stateless_url: String,
    pub backoff_floor_ms: u64,
    pub backoff_ceiling_ms: u64,
    pub request_timeout_ms: u64,
    /// Age after which an unanswered correlation is evicted.
    pub correlation_ttl_ms: u64,
    pub correlation_sweep_ms: u64,
    pub sample_interval_ms: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            channel_url: "ws://localhost:8000/ws".to_string(),
            stateless_url: "http://localhost:8000/predict/frame".to_string(),
            backoff_floor_ms: 1_000,
            backoff_ceiling_ms: 30_000,
            request_timeout_ms: 10_000,
            correlation_ttl_ms: 30_000,
            correlation_sweep_ms: 5_000,
            sample_interval_ms: 1_000,
        }
    }
}

impl GuardConfig {
    pub fn from_json(config: Value) -> Result<Self> {
        let config: GuardConfig =
            serde_json::from_value(config).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file; a missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Self::from_json(value)
    }

    /// Override endpoints from the environment.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(CHANNEL_URL_ENV) {
            self.channel_url = url;
        }
        if let Ok(url) = std::env::var(STATELESS_URL_ENV) {
            self.stateless_url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !has_scheme(&self.channel_url, &["ws://", "wss://"]) {
            bail!("channel_url must be a ws:// or wss:// URL, got '{}'", self.channel_url);
        }
        if !has_scheme(&self.stateless_url, &["http://", "https://"]) {
            bail!(
                "stateless_url must be an http:// or https:// URL, got '{}'",
                self.stateless_url
            );
        }
        if self.backoff_floor_ms == 0 {
            bail!("backoff_floor_ms must be positive");
        }
        if self.backoff_ceiling_ms < self.backoff_floor_ms {
            bail!(
                "backoff_ceiling_ms ({}) is below backoff_floor_ms ({})",
                self.backoff_ceiling_ms,
                self.backoff_floor_ms
            );
        }
        if self.sample_interval_ms == 0 {
            bail!("sample_interval_ms must be positive");
        }
        if self.correlation_sweep_ms == 0 {
            bail!("correlation_sweep_ms must be positive");
        }
        Ok(())
    }

    pub fn backoff_floor(&self) -> Duration {
        Duration::from_millis(self.backoff_floor_ms)
    }

    pub fn backoff_ceiling(&self) -> Duration {
        Duration::from_millis(self.backoff_ceiling_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn correlation_ttl(&self) -> Duration {
        Duration::from_millis(self.correlation_ttl_ms)
    }

    pub fn correlation_sweep(&self) -> Duration {
        Duration::from_millis(self.correlation_sweep_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    schemes
        .iter()
        .any(|scheme| url.len() > scheme.len() && url.starts_with(scheme))
}
