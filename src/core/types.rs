// src/core/types.rs — Core domain types

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::infra::config::OptimizerConfig;
use crate::infra::errors::PromptLoopError;

/// The answer a prompt produced for one example question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub answer: String,
}

/// One persisted round. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub prompt: String,
    pub succeed: bool,
    pub tokens: u64,
    pub answers: Vec<AnswerRecord>,
    /// Why the round failed, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Judge analysis from this round's comparison, carried into the next
    /// optimization (also across sessions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl RoundRecord {
    /// A round that could not be completed: kept in the ledger so round
    /// numbering stays contiguous, never eligible as best.
    pub fn failed(round: u32, prompt: String, tokens: u64, error: &PromptLoopError) -> Self {
        Self {
            round,
            prompt,
            succeed: false,
            tokens,
            answers: Vec::new(),
            error: Some(error.to_string()),
            feedback: None,
        }
    }
}

/// The prompt and answers every new candidate is judged against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestState {
    pub round: u32,
    pub prompt: String,
    pub answers: Vec<AnswerRecord>,
}

/// Feedback from the most recent judged round.
pub fn latest_feedback(records: &[RoundRecord]) -> Option<String> {
    records.iter().rev().find_map(|r| r.feedback.clone())
}

impl From<&RoundRecord> for BestState {
    fn from(record: &RoundRecord) -> Self {
        Self {
            round: record.round,
            prompt: record.prompt.clone(),
            answers: record.answers.clone(),
        }
    }
}

/// Highest-numbered successful round, else the earliest round.
pub fn best_state(records: &[RoundRecord]) -> Option<BestState> {
    records
        .iter()
        .filter(|r| r.succeed)
        .max_by_key(|r| r.round)
        .or_else(|| records.iter().min_by_key(|r| r.round))
        .map(BestState::from)
}

/// Where and how far one optimization run goes.
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub workspace: PathBuf,
    pub template_name: String,
    pub initial_round: u32,
    pub max_rounds: u32,
}

impl SessionParams {
    pub fn validate(&self) -> Result<(), PromptLoopError> {
        if self.template_name.trim().is_empty() {
            return Err(PromptLoopError::config("template name is required"));
        }
        if self.initial_round < 1 {
            return Err(PromptLoopError::config("initial_round must be at least 1"));
        }
        if self.max_rounds < 1 {
            return Err(PromptLoopError::config("max_rounds must be at least 1"));
        }
        Ok(())
    }

    /// Last round this session will attempt.
    pub fn final_round(&self) -> u32 {
        self.initial_round.saturating_add(self.max_rounds - 1)
    }
}

/// Tuning knobs for the loop and its stages.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub concurrency: usize,
    pub judge_votes: u32,
    pub max_consecutive_failures: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from(&OptimizerConfig::default())
    }
}

impl From<&OptimizerConfig> for LoopSettings {
    fn from(config: &OptimizerConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            judge_votes: config.judge_votes.max(1),
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopState::Idle => "idle",
            LoopState::Running => "running",
            LoopState::Completed => "completed",
            LoopState::Cancelled => "cancelled",
            LoopState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a finished session hands back to its caller.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub state: LoopState,
    /// Records written by this session, in round order.
    pub rounds: Vec<RoundRecord>,
    /// Best state over the whole ledger, including earlier sessions.
    pub best: Option<BestState>,
    /// Why the session ended early: the failure for `Failed`, the resume
    /// point for `Cancelled`.
    pub error: Option<String>,
}

impl SessionOutcome {
    pub fn successful_rounds(&self) -> usize {
        self.rounds.iter().filter(|r| r.succeed).count()
    }

    pub fn total_tokens(&self) -> u64 {
        self.rounds.iter().map(|r| r.tokens).sum()
    }
}

/// Emitted by the loop at round boundaries.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    RoundStart {
        round: u32,
        final_round: u32,
        anchor: bool,
    },
    RoundEnd {
        round: u32,
        succeed: bool,
        tokens: u64,
    },
    RoundFailed {
        round: u32,
        error: String,
    },
    Finished {
        state: LoopState,
        rounds: usize,
        successful: usize,
        best_round: Option<u32>,
    },
}

/// Cooperative cancellation flag, checked between rounds.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
