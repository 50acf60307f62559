// src/cli/results.rs — `promptloop results`: show a template's rounds

use std::fmt::Write;

use crate::core::ledger::RoundLedger;
use crate::core::types::RoundRecord;
use crate::infra::config::Config;

pub async fn show_results(
    config: &Config,
    template: &str,
    workspace: Option<&str>,
    purge: bool,
) -> anyhow::Result<()> {
    let workspace = super::workspace_dir(config, workspace);
    let ledger = RoundLedger::for_session(&workspace, template);
    let records = ledger.load_all()?;

    if records.is_empty() {
        println!("No rounds recorded for '{}'.", template);
    } else {
        print!("{}", render_rounds(&records));
        println!("{}", render_summary(&records));
        let sessions = ledger.sessions();
        if !sessions.is_empty() {
            println!("Sessions:          {}", sessions.len());
        }
    }

    if purge {
        let dir = ledger.session_dir();
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
            println!("Removed {}", dir.display());
        }
    }
    Ok(())
}

/// Every round: status, tokens, prompt and answers.
pub fn render_rounds(records: &[RoundRecord]) -> String {
    let mut out = String::new();
    for r in records {
        let status = if r.succeed { "success" } else { "fail" };
        let _ = writeln!(out, "── Round {} [{}] {} tokens", r.round, status, r.tokens);
        if let Some(ref err) = r.error {
            let _ = writeln!(out, "error: {}", err);
        }
        let _ = writeln!(out, "prompt:\n{}", r.prompt);
        for a in &r.answers {
            let _ = writeln!(out, "Q: {}\nA: {}", a.question, a.answer);
        }
        out.push('\n');
    }
    out
}

pub fn render_summary(records: &[RoundRecord]) -> String {
    let successful = records.iter().filter(|r| r.succeed).count();
    let tokens: u64 = records.iter().map(|r| r.tokens).sum();
    format!(
        "Total rounds:      {}\nSuccessful rounds: {}\nTotal tokens:      {}",
        records.len(),
        successful,
        tokens
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::AnswerRecord;

    fn records() -> Vec<RoundRecord> {
        vec![
            RoundRecord {
                round: 1,
                prompt: "seed".into(),
                succeed: true,
                tokens: 20,
                answers: vec![AnswerRecord {
                    question: "2+2?".into(),
                    answer: "4".into(),
                }],
                error: None,
                feedback: None,
            },
            RoundRecord {
                round: 2,
                prompt: String::new(),
                succeed: false,
                tokens: 0,
                answers: vec![],
                error: Some("Optimizer reply had no usable prompt: missing <prompt>".into()),
                feedback: None,
            },
        ]
    }

    #[test]
    fn test_render_rounds() {
        let out = render_rounds(&records());
        assert!(out.contains("── Round 1 [success] 20 tokens"));
        assert!(out.contains("Q: 2+2?\nA: 4"));
        assert!(out.contains("── Round 2 [fail] 0 tokens"));
        assert!(out.contains("error: Optimizer reply"));
    }

    #[test]
    fn test_render_summary() {
        let out = render_summary(&records());
        assert!(out.contains("Total rounds:      2"));
        assert!(out.contains("Successful rounds: 1"));
        assert!(out.contains("Total tokens:      20"));
    }
}
