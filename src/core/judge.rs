// src/core/judge.rs — Pairwise LLM-as-judge comparison
//
// Each vote shows the judge two prompts labelled A and B, each with the
// answers it produced, plus the reference answers. Labels alternate
// between votes so neither side always sits in the first position.

use std::sync::Arc;

use async_trait::async_trait;

use super::parser::extract_tag;
use super::types::{AnswerRecord, BestState, RoundRecord};
use crate::infra::errors::PromptLoopError;
use crate::provider::pool::ClientPool;
use crate::provider::roles::ModelRole;
use crate::provider::Message;
use crate::template::{QaPair, Template};

/// Outcome of comparing a candidate round against the incumbent best.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub supersedes: bool,
    /// Judge analysis, handed to the next optimization as feedback.
    pub feedback: String,
    pub votes_for: u32,
    pub votes_total: u32,
    pub tokens: u64,
}

#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(
        &self,
        candidate: &RoundRecord,
        incumbent: &BestState,
        template: &Template,
    ) -> Result<Verdict, PromptLoopError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    A,
    B,
}

/// Judge backed by the evaluate-role model.
pub struct LlmJudge {
    pool: Arc<ClientPool>,
    votes: u32,
}

impl LlmJudge {
    pub fn new(pool: Arc<ClientPool>, votes: u32) -> Self {
        Self {
            pool,
            votes: votes.max(1),
        }
    }
}

#[async_trait]
impl Judge for LlmJudge {
    async fn judge(
        &self,
        candidate: &RoundRecord,
        incumbent: &BestState,
        template: &Template,
    ) -> Result<Verdict, PromptLoopError> {
        let mut votes_for = 0u32;
        let mut tokens = 0u64;
        let mut analyses: Vec<(bool, String)> = Vec::with_capacity(self.votes as usize);

        for vote in 0..self.votes {
            // Even votes put the incumbent in A, odd votes put the candidate in A.
            let candidate_label = if vote % 2 == 0 { Label::B } else { Label::A };
            let challenger = Contender {
                prompt: &candidate.prompt,
                answers: &candidate.answers,
            };
            let holder = Contender {
                prompt: &incumbent.prompt,
                answers: &incumbent.answers,
            };
            let (a, b) = match candidate_label {
                Label::A => (challenger, holder),
                Label::B => (holder, challenger),
            };

            let message = build_comparison(&template.requirements, a, b, &template.qa);
            let response = self
                .pool
                .dispatch(
                    ModelRole::Evaluate,
                    vec![Message::system(JUDGE_INSTRUCTIONS), Message::user(message)],
                )
                .await?;
            tokens += response.tokens();
            tracing::debug!(vote, "Judge reply: {}", response.content);

            let (analysis, choice) = parse_judgement(&response.content)?;
            let for_candidate = choice == candidate_label;
            if for_candidate {
                votes_for += 1;
            }
            analyses.push((for_candidate, analysis));
        }

        // Strict majority; a tie keeps the incumbent.
        let supersedes = votes_for * 2 > self.votes;
        let feedback = analyses
            .iter()
            .find(|(for_candidate, _)| *for_candidate == supersedes)
            .or_else(|| analyses.first())
            .map(|(_, text)| text.clone())
            .unwrap_or_default();

        tracing::info!(
            round = candidate.round,
            against = incumbent.round,
            votes_for,
            votes_total = self.votes,
            supersedes,
            "Judgement complete"
        );

        Ok(Verdict {
            supersedes,
            feedback,
            votes_for,
            votes_total: self.votes,
            tokens,
        })
    }
}

const JUDGE_INSTRUCTIONS: &str = "You compare two prompts, A and B. Each was run on \
the same questions and is shown with the responses it produced. Decide which prompt's \
responses better satisfy the requirements. Where reference answers are given, treat \
their content and format as the target.\n\n\
Reply with your analysis and your choice, using exactly these XML tags:\n\
<analyse>your analysis</analyse>\n\
<choose>A or B</choose>";

/// One side of a comparison.
#[derive(Clone, Copy)]
struct Contender<'a> {
    prompt: &'a str,
    answers: &'a [AnswerRecord],
}

fn render_answers(answers: &[AnswerRecord]) -> String {
    answers
        .iter()
        .map(|a| format!("Question: {}\nAnswer: {}", a.question, a.answer))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub(crate) fn render_reference(qa: &[QaPair]) -> String {
    qa.iter()
        .map(|p| format!("Question: {}\nAnswer: {}", p.question, p.answer))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_contender(label: &str, side: Contender<'_>) -> String {
    format!(
        "# {label}\n## Prompt\n{}\n\n## Responses\n{}",
        side.prompt,
        render_answers(side.answers)
    )
}

fn build_comparison(
    requirements: &str,
    a: Contender<'_>,
    b: Contender<'_>,
    reference: &[QaPair],
) -> String {
    format!(
        "# Requirements\n{requirements}\n\n{a}\n\n{b}\n\n# Reference answers\n{reference}",
        a = render_contender("A", a),
        b = render_contender("B", b),
        reference = render_reference(reference),
    )
}

fn parse_judgement(reply: &str) -> Result<(String, Label), PromptLoopError> {
    let analysis = extract_tag(reply, "analyse")
        .ok_or_else(|| PromptLoopError::JudgementParse("missing <analyse>".into()))?;
    let choice = extract_tag(reply, "choose")
        .ok_or_else(|| PromptLoopError::JudgementParse("missing <choose>".into()))?;

    let label = match choice
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_ascii_uppercase()
        .as_str()
    {
        "A" => Label::A,
        "B" => Label::B,
        other => {
            return Err(PromptLoopError::JudgementParse(format!(
                "<choose> must be A or B, got '{other}'"
            )))
        }
    };
    Ok((analysis, label))
}
