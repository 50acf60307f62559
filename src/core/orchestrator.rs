// src/core/orchestrator.rs — Round-based optimization loop
//
// Each round: propose (or seed) a prompt, execute it over the examples,
// judge it against the best round so far, and append the result.

use std::sync::Arc;

use super::executor::Executor;
use super::judge::{Judge, LlmJudge};
use super::ledger::{RoundLedger, SessionSummary};
use super::optimizer::{LlmOptimizer, Optimizer};
use super::types::*;
use crate::infra::errors::PromptLoopError;
use crate::provider::pool::ClientPool;
use crate::template::Template;

/// How one round ended, before it is written to the ledger.
enum RoundAttempt {
    Judged(RoundRecord),
    Failed {
        record: RoundRecord,
        error: PromptLoopError,
    },
}

/// Drives the optimize → execute → judge cycle for one template.
pub struct OptimizationLoop {
    template: Template,
    params: SessionParams,
    settings: LoopSettings,
    executor: Executor,
    judge: Arc<dyn Judge>,
    optimizer: Arc<dyn Optimizer>,
    ledger: RoundLedger,
    state: LoopState,
    stop: StopHandle,
    on_progress: Option<Box<dyn Fn(ProgressEvent) + Send + Sync>>,
}

impl OptimizationLoop {
    pub fn new(
        pool: Arc<ClientPool>,
        template: Template,
        params: SessionParams,
        settings: LoopSettings,
    ) -> Self {
        let ledger = RoundLedger::for_session(&params.workspace, &params.template_name);
        Self {
            executor: Executor::new(pool.clone(), settings.concurrency),
            judge: Arc::new(LlmJudge::new(pool.clone(), settings.judge_votes)),
            optimizer: Arc::new(LlmOptimizer::new(pool)),
            template,
            params,
            settings,
            ledger,
            state: LoopState::Idle,
            stop: StopHandle::new(),
            on_progress: None,
        }
    }

    pub fn with_judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = judge;
        self
    }

    pub fn with_optimizer(mut self, optimizer: Arc<dyn Optimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Set a callback for round-level progress events.
    pub fn with_progress(mut self, cb: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn ledger(&self) -> &RoundLedger {
        &self.ledger
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    /// Check the session can start: valid parameters and template, and a
    /// round range that continues the ledger without gaps.
    fn prepare(&self) -> Result<Vec<RoundRecord>, PromptLoopError> {
        self.params.validate()?;
        self.template.validate(&self.params.template_name)?;

        let history = self.ledger.load_all()?;
        if let Some(last) = history.last().map(|r| r.round) {
            let expected = last + 1;
            if self.params.initial_round != expected {
                return Err(PromptLoopError::config(format!(
                    "ledger for '{}' ends at round {last}; resume with initial_round = {expected} (got {})",
                    self.params.template_name, self.params.initial_round
                )));
            }
        }
        Ok(history)
    }

    /// Run the session to completion, cancellation or failure.
    ///
    /// Errors are returned only when the session cannot start. Once running,
    /// failures are reported through the outcome.
    pub async fn run(&mut self) -> Result<SessionOutcome, PromptLoopError> {
        let mut history = self.prepare()?;
        self.state = LoopState::Running;

        let final_round = self.params.final_round();
        let mut written: Vec<RoundRecord> = Vec::new();
        // A resumed session picks up the last judge analysis it left behind.
        let mut feedback = latest_feedback(&history);
        let mut consecutive_failures = 0u32;
        let mut fatal: Option<String> = None;

        tracing::info!(
            template = %self.params.template_name,
            initial_round = self.params.initial_round,
            final_round,
            resumed_from = history.last().map(|r| r.round),
            "Optimization session started"
        );

        for round in self.params.initial_round..=final_round {
            if self.stop.is_stopped() {
                tracing::info!(round, "Stop requested; ending before round");
                fatal = Some(PromptLoopError::Cancelled { next_round: round }.to_string());
                self.state = LoopState::Cancelled;
                break;
            }

            // Until some round has succeeded, the seed prompt is the anchor.
            let anchor = !history.iter().any(|r| r.succeed);
            let best = if anchor { None } else { best_state(&history) };

            self.emit(ProgressEvent::RoundStart {
                round,
                final_round,
                anchor,
            });
            tracing::info!(round, anchor, "Round started");

            let attempt = match self.run_round(round, best.as_ref(), feedback.as_deref()).await {
                Ok(attempt) => attempt,
                Err(e) => {
                    tracing::error!(round, "Round aborted the session: {}", e);
                    fatal = Some(e.to_string());
                    self.state = LoopState::Failed;
                    break;
                }
            };

            let (record, failure) = match attempt {
                RoundAttempt::Judged(record) => {
                    if record.feedback.is_some() {
                        feedback = record.feedback.clone();
                    }
                    (record, None)
                }
                RoundAttempt::Failed { record, error } => (record, Some(error)),
            };

            if let Err(e) = self.ledger.append(&record) {
                tracing::error!(round, "Ledger write failed: {}", e);
                fatal = Some(e.to_string());
                self.state = LoopState::Failed;
                break;
            }
            history.push(record.clone());

            match failure {
                None => {
                    consecutive_failures = 0;
                    tracing::info!(
                        round,
                        succeed = record.succeed,
                        tokens = record.tokens,
                        "Round finished"
                    );
                    self.emit(ProgressEvent::RoundEnd {
                        round,
                        succeed: record.succeed,
                        tokens: record.tokens,
                    });
                    written.push(record);
                }
                Some(error) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        round,
                        consecutive_failures,
                        "Round failed: {}",
                        error
                    );
                    self.emit(ProgressEvent::RoundFailed {
                        round,
                        error: error.to_string(),
                    });
                    written.push(record);

                    if consecutive_failures > self.settings.max_consecutive_failures {
                        fatal = Some(format!(
                            "{consecutive_failures} consecutive rounds failed; last error: {error}"
                        ));
                        self.state = LoopState::Failed;
                        break;
                    }
                }
            }
        }

        if self.state == LoopState::Running {
            self.state = LoopState::Completed;
        }

        let outcome = SessionOutcome {
            state: self.state,
            best: best_state(&history),
            rounds: written,
            error: fatal,
        };

        self.emit(ProgressEvent::Finished {
            state: outcome.state,
            rounds: outcome.rounds.len(),
            successful: outcome.successful_rounds(),
            best_round: outcome.best.as_ref().map(|b| b.round),
        });
        tracing::info!(
            state = %outcome.state,
            rounds = outcome.rounds.len(),
            successful = outcome.successful_rounds(),
            "Optimization session finished"
        );

        let summary = SessionSummary::from_outcome(&self.params.template_name, &outcome);
        if let Err(e) = self.ledger.append_session(&summary) {
            tracing::warn!("Failed to append session summary: {}", e);
        }

        Ok(outcome)
    }

    /// Run one round. `best` is `None` for an anchor round.
    ///
    /// Round-level failures come back as `RoundAttempt::Failed`; anything
    /// else is returned as an error and ends the session.
    async fn run_round(
        &self,
        round: u32,
        best: Option<&BestState>,
        feedback: Option<&str>,
    ) -> Result<RoundAttempt, PromptLoopError> {
        let prompt = match best {
            None => self.template.prompt.clone(),
            Some(best) => match self.optimizer.propose(best, &self.template, feedback).await {
                Ok(proposal) => proposal.prompt,
                Err(e) => return failed(round, String::new(), 0, e),
            },
        };

        let execution = match self.executor.execute(&prompt, &self.template.qa).await {
            Ok(execution) => execution,
            Err(failure) => return failed(round, prompt, failure.tokens, failure.error),
        };

        let mut record = RoundRecord {
            round,
            prompt,
            succeed: false,
            tokens: execution.tokens,
            answers: execution.answers,
            error: None,
            feedback: None,
        };

        let Some(best) = best else {
            record.succeed = true;
            return Ok(RoundAttempt::Judged(record));
        };

        match self.judge.judge(&record, best, &self.template).await {
            Ok(verdict) => {
                record.succeed = verdict.supersedes;
                record.feedback = Some(verdict.feedback).filter(|f| !f.trim().is_empty());
                Ok(RoundAttempt::Judged(record))
            }
            Err(e) => failed(round, record.prompt, record.tokens, e),
        }
    }
}

fn failed(
    round: u32,
    prompt: String,
    tokens: u64,
    error: PromptLoopError,
) -> Result<RoundAttempt, PromptLoopError> {
    if !error.is_round_failure() {
        return Err(error);
    }
    Ok(RoundAttempt::Failed {
        record: RoundRecord::failed(round, prompt, tokens, &error),
        error,
    })
}
