// src/infra/errors.rs — Error types for promptloop

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptLoopError {
    // Transport errors (round-level, may be retriable)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("{last} (gave up after {attempts} attempts)")]
    RetriesExhausted {
        attempts: u32,
        last: Box<PromptLoopError>,
    },

    // Reply parsing (round-level, never defaulted)
    #[error("Judge reply had no usable verdict: {0}")]
    JudgementParse(String),

    #[error("Optimizer reply had no usable prompt: {0}")]
    OptimizationParse(String),

    // Pool ordering errors (fatal)
    #[error("Client pool not initialized. Call install() first.")]
    NotInitialized,

    #[error("Unknown role '{0}'. Valid roles: optimize, evaluate, execute")]
    UnknownRole(String),

    // Session errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Round {0} is already recorded with different content")]
    DuplicateRound(u32),

    #[error("Stopped before round {next_round}; resume with --initial-round {next_round}")]
    Cancelled { next_round: u32 },

    #[error("Template '{name}' error: {message}")]
    Template { name: String, message: String },

    // Infra
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PromptLoopError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            PromptLoopError::Provider {
                retriable: true,
                ..
            } | PromptLoopError::RateLimited { .. }
        )
    }

    /// Errors the loop absorbs as a failed round instead of ending the session.
    pub fn is_round_failure(&self) -> bool {
        matches!(
            self,
            PromptLoopError::Provider { .. }
                | PromptLoopError::RateLimited { .. }
                | PromptLoopError::RetriesExhausted { .. }
                | PromptLoopError::JudgementParse(_)
                | PromptLoopError::OptimizationParse(_)
        )
    }

    pub fn config(message: impl Into<String>) -> Self {
        PromptLoopError::Config(message.into())
    }
}
