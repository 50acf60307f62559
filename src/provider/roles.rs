// src/provider/roles.rs — Role-based model assignment

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::infra::errors::PromptLoopError;

/// The three roles a model can play in an optimization session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    Optimize,
    Evaluate,
    Execute,
}

impl ModelRole {
    pub const ALL: [ModelRole; 3] = [ModelRole::Optimize, ModelRole::Evaluate, ModelRole::Execute];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRole::Optimize => "optimize",
            ModelRole::Evaluate => "evaluate",
            ModelRole::Execute => "execute",
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ModelRole {
    type Err = PromptLoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimize" => Ok(ModelRole::Optimize),
            "evaluate" => Ok(ModelRole::Evaluate),
            "execute" => Ok(ModelRole::Execute),
            _ => Err(PromptLoopError::UnknownRole(s.to_string())),
        }
    }
}

/// Model settings for one role.
#[derive(Clone, PartialEq)]
pub struct RoleConfig {
    pub model_id: String,
    pub temperature: f32,
    pub endpoint: String,
    pub credential: Option<String>,
    /// Completion length cap sent with every request for this role.
    pub max_tokens: Option<u32>,
}

impl fmt::Debug for RoleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleConfig")
            .field("model_id", &self.model_id)
            .field("temperature", &self.temperature)
            .field("endpoint", &self.endpoint)
            .field("max_tokens", &self.max_tokens)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RoleConfig {
    pub fn new(model_id: impl Into<String>, temperature: f32) -> Self {
        Self {
            model_id: model_id.into(),
            temperature,
            endpoint: String::new(),
            credential: None,
            max_tokens: None,
        }
    }

    /// Check required fields. The error names the role and the field.
    pub fn validate(&self, role: ModelRole) -> Result<(), PromptLoopError> {
        if self.model_id.trim().is_empty() {
            return Err(PromptLoopError::config(format!(
                "{role}: 'model' is required"
            )));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(PromptLoopError::config(format!(
                "{role}: 'temperature' must be within [0, 1], got {}",
                self.temperature
            )));
        }
        if self.max_tokens == Some(0) {
            return Err(PromptLoopError::config(format!(
                "{role}: 'max_tokens' must be positive"
            )));
        }
        Ok(())
    }
}

/// Assigns a model configuration to each role.
#[derive(Debug, Clone)]
pub struct ModelRoles {
    pub optimize: RoleConfig,
    pub evaluate: RoleConfig,
    pub execute: RoleConfig,
}

impl ModelRoles {
    /// Same model for all three roles.
    pub fn from_single(config: RoleConfig) -> Self {
        Self {
            optimize: config.clone(),
            evaluate: config.clone(),
            execute: config,
        }
    }

    pub fn get(&self, role: ModelRole) -> &RoleConfig {
        match role {
            ModelRole::Optimize => &self.optimize,
            ModelRole::Evaluate => &self.evaluate,
            ModelRole::Execute => &self.execute,
        }
    }

    pub fn validate(&self) -> Result<(), PromptLoopError> {
        for role in ModelRole::ALL {
            self.get(role).validate(role)?;
        }
        Ok(())
    }
}
