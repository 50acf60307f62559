// src/core/optimizer.rs — Prompt rewriting via the optimize role

use std::sync::Arc;

use async_trait::async_trait;

use super::judge::render_reference;
use super::parser::extract_tag;
use super::types::BestState;
use crate::infra::errors::PromptLoopError;
use crate::provider::pool::ClientPool;
use crate::provider::roles::ModelRole;
use crate::provider::Message;
use crate::template::Template;

/// A revised prompt plus the optimizer's reasoning.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub prompt: String,
    pub analysis: Option<String>,
    pub modification: Option<String>,
    pub tokens: u64,
}

#[async_trait]
pub trait Optimizer: Send + Sync {
    /// Propose a successor to `best`. Never modifies `best`.
    async fn propose(
        &self,
        best: &BestState,
        template: &Template,
        feedback: Option<&str>,
    ) -> Result<Proposal, PromptLoopError>;
}

pub struct LlmOptimizer {
    pool: Arc<ClientPool>,
}

impl LlmOptimizer {
    pub fn new(pool: Arc<ClientPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Optimizer for LlmOptimizer {
    async fn propose(
        &self,
        best: &BestState,
        template: &Template,
        feedback: Option<&str>,
    ) -> Result<Proposal, PromptLoopError> {
        let messages = vec![
            Message::system(optimizer_instructions(template.count)),
            Message::user(build_material(best, template, feedback)),
        ];
        let response = self.pool.dispatch(ModelRole::Optimize, messages).await?;
        tracing::debug!(from_round = best.round, "Optimizer reply: {}", response.content);

        let prompt = extract_tag(&response.content, "prompt")
            .ok_or_else(|| PromptLoopError::OptimizationParse("missing <prompt>".into()))?;
        let analysis = extract_tag(&response.content, "analyse");
        let modification = extract_tag(&response.content, "modification");
        if let Some(ref m) = modification {
            tracing::debug!("Modification: {}", m);
        }

        Ok(Proposal {
            prompt,
            analysis,
            modification,
            tokens: response.tokens(),
        })
    }
}

fn optimizer_instructions(count: Option<u32>) -> String {
    let length = match count {
        Some(words) => format!(" (keep it within {words} words)"),
        None => String::new(),
    };
    format!(
        "You are improving a prompt so that its outputs satisfy the given requirements. \
The reference prompt is the best one found so far. Rewrite it: you may add, change or \
remove instructions, but the result must differ from the reference prompt.\n\n\
Reply using exactly these XML tags:\n\
<analyse>weaknesses of the reference outputs and how to address them</analyse>\n\
<modification>the key change, in one sentence</modification>\n\
<prompt>the complete optimized prompt{length}</prompt>"
    )
}

fn build_material(best: &BestState, template: &Template, feedback: Option<&str>) -> String {
    let answers = best
        .answers
        .iter()
        .map(|a| format!("Question: {}\nAnswer: {}", a.question, a.answer))
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut text = format!(
        "# Requirements\n{}\n\n\
# Reference prompt\n{}\n\n\
# Outputs of the reference prompt\n{}\n\n\
# Expected answers\n{}",
        template.requirements,
        best.prompt,
        answers,
        render_reference(&template.qa),
    );
    if let Some(note) = feedback.map(str::trim).filter(|f| !f.is_empty()) {
        text.push_str("\n\n# Judge feedback on the latest comparison\n");
        text.push_str(note);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::AnswerRecord;
    use crate::provider::roles::{ModelRoles, RoleConfig};
    use crate::provider::{ChatRequest, ChatResponse, ModelProvider, Role, TokenUsage};
    use crate::template::QaPair;
    use std::sync::Mutex;

    struct Canned {
        reply: String,
        seen: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl ModelProvider for Canned {
        fn id(&self) -> &str {
            "canned"
        }

        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, PromptLoopError> {
            self.seen.lock().unwrap().push(request);
            Ok(ChatResponse {
                content: self.reply.clone(),
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                },
            })
        }
    }

    fn canned(reply: &str) -> Arc<Canned> {
        Arc::new(Canned {
            reply: reply.into(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn optimizer(provider: Arc<Canned>) -> LlmOptimizer {
        let roles = ModelRoles::from_single(RoleConfig::new("opt", 0.7));
        LlmOptimizer::new(Arc::new(
            ClientPool::with_shared_provider(roles, provider).unwrap(),
        ))
    }

    fn best() -> BestState {
        BestState {
            round: 1,
            prompt: "Answer the question.".into(),
            answers: vec![AnswerRecord {
                question: "2+2?".into(),
                answer: "The answer is four.".into(),
            }],
        }
    }

    fn template(count: Option<u32>) -> Template {
        Template {
            prompt: "Answer the question.".into(),
            requirements: "Digits only.".into(),
            count,
            qa: vec![QaPair::new("2+2?", "4")],
        }
    }

    #[tokio::test]
    async fn test_propose_extracts_prompt() {
        let provider = canned(
            "<analyse>too wordy</analyse><modification>ask for digits</modification>\
             <prompt>Answer with digits only.</prompt>",
        );
        let p = optimizer(provider)
            .propose(&best(), &template(None), None)
            .await
            .unwrap();
        assert_eq!(p.prompt, "Answer with digits only.");
        assert_eq!(p.analysis.as_deref(), Some("too wordy"));
        assert_eq!(p.modification.as_deref(), Some("ask for digits"));
        assert_eq!(p.tokens, 15);
    }

    #[tokio::test]
    async fn test_missing_prompt_is_parse_error() {
        let provider = canned("<analyse>hmm</analyse>");
        let err = optimizer(provider)
            .propose(&best(), &template(None), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PromptLoopError::OptimizationParse(_)));
    }

    #[tokio::test]
    async fn test_empty_prompt_is_parse_error() {
        let provider = canned("<prompt>  </prompt>");
        let err = optimizer(provider)
            .propose(&best(), &template(None), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PromptLoopError::OptimizationParse(_)));
    }

    #[tokio::test]
    async fn test_request_carries_context() {
        let provider = canned("<prompt>x</prompt>");
        optimizer(provider.clone())
            .propose(&best(), &template(Some(40)), Some("B used digits"))
            .await
            .unwrap();

        let seen = provider.seen.lock().unwrap();
        let system = &seen[0].messages[0];
        let msg = &seen[0].messages[1].content;
        assert_eq!(system.role, Role::System);
        assert!(system.content.contains("<prompt>"));
        assert!(system.content.contains("within 40 words"));
        assert!(msg.contains("# Requirements\nDigits only."));
        assert!(msg.contains("# Reference prompt\nAnswer the question."));
        assert!(msg.contains("Answer: The answer is four."));
        assert!(msg.contains("# Expected answers\nQuestion: 2+2?\nAnswer: 4"));
        assert!(msg.ends_with("# Judge feedback on the latest comparison\nB used digits"));
    }

    #[tokio::test]
    async fn test_request_without_feedback_or_count() {
        let provider = canned("<prompt>x</prompt>");
        optimizer(provider.clone())
            .propose(&best(), &template(None), Some("   "))
            .await
            .unwrap();
        let seen = provider.seen.lock().unwrap();
        assert!(!seen[0].messages[1].content.contains("Judge feedback"));
        assert!(!seen[0].messages[0].content.contains("words)"));
    }
}
