// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::infra::paths;
use crate::provider::retry::RetryPolicy;
use crate::provider::roles::{ModelRoles, RoleConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub optimizer: OptimizerConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

/// Endpoint and credential shared by every role unless a role overrides them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Attempts per model call, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    4
}

fn default_retry_base_delay_ms() -> u64 {
    1_000
}

fn default_retry_max_delay_ms() -> u64 {
    20_000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_seconds: default_timeout_seconds(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_optimize_model")]
    pub optimize: RoleModelConfig,
    #[serde(default = "default_evaluate_model")]
    pub evaluate: RoleModelConfig,
    #[serde(default = "default_execute_model")]
    pub execute: RoleModelConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            optimize: default_optimize_model(),
            evaluate: default_evaluate_model(),
            execute: default_execute_model(),
        }
    }
}

fn default_optimize_model() -> RoleModelConfig {
    RoleModelConfig::new("gpt-4o", 0.7)
}

fn default_evaluate_model() -> RoleModelConfig {
    RoleModelConfig::new("gpt-4o-mini", 0.3)
}

fn default_execute_model() -> RoleModelConfig {
    RoleModelConfig::new("gpt-4o-mini", 0.0)
}

/// One role's model section. An explicitly written section with no `model`
/// key yields an empty model id, which pool validation rejects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleModelConfig {
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl RoleModelConfig {
    pub fn new(model: &str, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            temperature,
            base_url: None,
            api_key_env: None,
            max_tokens: None,
        }
    }

    /// Fill endpoint and credential from the shared provider section.
    pub fn resolve(&self, provider: &ProviderConfig) -> RoleConfig {
        let key_env = self
            .api_key_env
            .as_deref()
            .unwrap_or(&provider.api_key_env);
        RoleConfig {
            model_id: self.model.trim().to_string(),
            temperature: self.temperature,
            endpoint: self
                .base_url
                .clone()
                .unwrap_or_else(|| provider.base_url.clone()),
            credential: std::env::var(key_env).ok().filter(|k| !k.is_empty()),
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub initial_round: u32,
    pub max_rounds: u32,
    /// Upper bound on concurrent execute-role calls within one round.
    pub concurrency: usize,
    /// Independent judge comparisons per round; majority decides.
    pub judge_votes: u32,
    /// Consecutive failed rounds tolerated before the session fails.
    pub max_consecutive_failures: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            initial_round: 1,
            max_rounds: 10,
            concurrency: 4,
            judge_votes: 4,
            max_consecutive_failures: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub workspace: String,
    pub templates: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            workspace: "workspace".into(),
            templates: "settings".into(),
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve all three role configurations (credentials read from env).
    pub fn model_roles(&self) -> ModelRoles {
        ModelRoles {
            optimize: self.models.optimize.resolve(&self.provider),
            evaluate: self.models.evaluate.resolve(&self.provider),
            execute: self.models.execute.resolve(&self.provider),
        }
    }
}
