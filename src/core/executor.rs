// src/core/executor.rs — Runs a candidate prompt over the example set

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use super::types::AnswerRecord;
use crate::infra::errors::PromptLoopError;
use crate::provider::pool::ClientPool;
use crate::provider::roles::ModelRole;
use crate::provider::Message;
use crate::template::QaPair;

/// Answers for every example, in example order.
#[derive(Debug, Clone)]
pub struct Execution {
    pub answers: Vec<AnswerRecord>,
    pub tokens: u64,
}

/// A failed execution still reports what the completed calls cost.
#[derive(Debug)]
pub struct ExecutionFailure {
    pub error: PromptLoopError,
    pub tokens: u64,
}

pub struct Executor {
    pool: Arc<ClientPool>,
    concurrency: usize,
}

impl Executor {
    pub fn new(pool: Arc<ClientPool>, concurrency: usize) -> Self {
        Self {
            pool,
            concurrency: concurrency.max(1),
        }
    }

    /// One execute-role call per question, at most `concurrency` in flight.
    /// The first failing call ends the stage.
    pub async fn execute(
        &self,
        prompt: &str,
        qa: &[QaPair],
    ) -> Result<Execution, ExecutionFailure> {
        let mut calls = stream::iter(qa.iter().enumerate())
            .map(|(index, pair)| {
                let pool = self.pool.clone();
                let content = format!("{prompt}\n\n{}", pair.question);
                async move {
                    let result = pool
                        .dispatch(ModelRole::Execute, vec![Message::user(content)])
                        .await;
                    (index, result)
                }
            })
            .buffer_unordered(self.concurrency);

        let mut slots: Vec<Option<String>> = vec![None; qa.len()];
        let mut tokens = 0u64;

        while let Some((index, result)) = calls.next().await {
            match result {
                Ok(response) => {
                    tokens += response.tokens();
                    slots[index] = Some(response.content);
                }
                Err(error) => {
                    tracing::warn!(
                        example = index,
                        "Execution call failed: {}",
                        error
                    );
                    return Err(ExecutionFailure { error, tokens });
                }
            }
        }

        let answers = qa
            .iter()
            .zip(slots)
            .map(|(pair, answer)| AnswerRecord {
                question: pair.question.clone(),
                answer: answer.unwrap_or_default(),
            })
            .collect();

        Ok(Execution { answers, tokens })
    }
}
