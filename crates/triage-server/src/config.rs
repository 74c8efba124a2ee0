//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use triage_classifiers::{BreakerConfig, RemoteConfig};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// SQLite database URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Remote classification backend
    #[serde(default)]
    pub remote: RemoteSettings,

    /// Circuit breaker tuning
    #[serde(default)]
    pub breaker: BreakerSettings,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &crate::Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        // Apply CLI overrides
        if let Some(database_url) = &cli.database_url {
            config.database_url = database_url.clone();
        }

        Ok(config)
    }

    /// Build the remote classifier config, if a backend is usable.
    ///
    /// Returns `None` when the remote path is disabled or no API key is
    /// present in the configured environment variable; the dispatcher then
    /// runs fallback-only.
    pub fn remote_config(&self) -> Option<RemoteConfig> {
        if !self.remote.enabled {
            return None;
        }

        let api_key = std::env::var(&self.remote.api_key_env).ok()?;
        if api_key.trim().is_empty() {
            return None;
        }

        Some(RemoteConfig {
            api_base: self.remote.api_base.clone(),
            api_key,
            model: self.remote.model.clone(),
            temperature: self.remote.temperature,
            max_tokens: self.remote.max_tokens,
            timeout: Duration::from_secs(self.remote.timeout_secs),
        })
    }

    /// Build the circuit breaker config
    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.breaker.failure_threshold,
            cooldown: Duration::from_secs(self.breaker.cooldown_secs),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            remote: RemoteSettings::default(),
            breaker: BreakerSettings::default(),
        }
    }
}

/// Remote classification backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Whether the remote path is attempted at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Response token budget
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: default_api_base(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Circuit breaker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Consecutive failures before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Cooldown in seconds before a half-open probe
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://triage.db?mode=rwc".to_string()
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    150
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}
