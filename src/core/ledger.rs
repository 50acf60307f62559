// src/core/ledger.rs — Append-only round storage
//
// Layout under `<workspace>/<template>/`:
//   prompts/round_<n>.json         one record per round (atomic write)
//   prompts/round_<n>.prompt.txt   the round's prompt, for reading by eye
//   sessions.jsonl                 one summary line per finished session

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::types::{LoopState, RoundRecord, SessionOutcome};
use crate::infra::errors::PromptLoopError;
use crate::infra::paths;

const SESSIONS_FILE: &str = "sessions.jsonl";

/// One line of `sessions.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub template: String,
    pub state: LoopState,
    pub first_round: Option<u32>,
    pub last_round: Option<u32>,
    pub rounds: usize,
    pub successful: usize,
    pub best_round: Option<u32>,
    pub tokens: u64,
    pub finished_at: String,
}

impl SessionSummary {
    pub fn from_outcome(template: &str, outcome: &SessionOutcome) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            template: template.to_string(),
            state: outcome.state,
            first_round: outcome.rounds.first().map(|r| r.round),
            last_round: outcome.rounds.last().map(|r| r.round),
            rounds: outcome.rounds.len(),
            successful: outcome.successful_rounds(),
            best_round: outcome.best.as_ref().map(|b| b.round),
            tokens: outcome.total_tokens(),
            finished_at: Utc::now().to_rfc3339(),
        }
    }
}

pub struct RoundLedger {
    session_dir: PathBuf,
    prompts_dir: PathBuf,
}

impl RoundLedger {
    pub fn new(session_dir: impl Into<PathBuf>) -> Self {
        let session_dir = session_dir.into();
        let prompts_dir = paths::prompts_dir(&session_dir);
        Self {
            session_dir,
            prompts_dir,
        }
    }

    /// Ledger for `template` inside `workspace`.
    pub fn for_session(workspace: &Path, template: &str) -> Self {
        Self::new(paths::session_dir(workspace, template))
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn record_path(&self, round: u32) -> PathBuf {
        self.prompts_dir.join(format!("round_{round}.json"))
    }

    fn prompt_text_path(&self, round: u32) -> PathBuf {
        self.prompts_dir.join(format!("round_{round}.prompt.txt"))
    }

    /// Persist `record`. Re-appending an identical record is a no-op.
    pub fn append(&self, record: &RoundRecord) -> Result<(), PromptLoopError> {
        let path = self.record_path(record.round);
        if path.exists() {
            let existing = read_record(&path)?;
            if existing == *record {
                tracing::debug!(round = record.round, "Round already recorded");
                return Ok(());
            }
            return Err(PromptLoopError::DuplicateRound(record.round));
        }

        std::fs::create_dir_all(&self.prompts_dir)?;
        let json = serde_json::to_string_pretty(record)?;
        atomic_write(&self.prompts_dir, &path, json.as_bytes())?;

        let text_path = self.prompt_text_path(record.round);
        atomic_write(&self.prompts_dir, &text_path, record.prompt.as_bytes())?;
        Ok(())
    }

    /// Every record, sorted by round.
    pub fn load_all(&self) -> Result<Vec<RoundRecord>, PromptLoopError> {
        let mut records = Vec::new();
        if !self.prompts_dir.is_dir() {
            return Ok(records);
        }

        for entry in std::fs::read_dir(&self.prompts_dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if parse_round_file(name).is_some() {
                records.push(read_record(&path)?);
            }
        }

        records.sort_by_key(|r| r.round);
        Ok(records)
    }

    /// Highest recorded round, scanning file names only.
    pub fn last_round(&self) -> Result<Option<u32>, PromptLoopError> {
        if !self.prompts_dir.is_dir() {
            return Ok(None);
        }
        let mut last = None;
        for entry in std::fs::read_dir(&self.prompts_dir)? {
            let name = entry?.file_name();
            if let Some(round) = name.to_str().and_then(parse_round_file) {
                last = last.max(Some(round));
            }
        }
        Ok(last)
    }

    pub fn append_session(&self, summary: &SessionSummary) -> Result<(), PromptLoopError> {
        std::fs::create_dir_all(&self.session_dir)?;
        let line = serde_json::to_string(summary)?;
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.session_dir.join(SESSIONS_FILE))?;
        writeln!(f, "{}", line)?;
        Ok(())
    }

    /// Session summaries, oldest first. Unreadable lines are skipped.
    pub fn sessions(&self) -> Vec<SessionSummary> {
        let content = match std::fs::read_to_string(self.session_dir.join(SESSIONS_FILE)) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

/// `round_<n>.json` → `n`
fn parse_round_file(name: &str) -> Option<u32> {
    name.strip_prefix("round_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

fn read_record(path: &Path) -> Result<RoundRecord, PromptLoopError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write to a temp file in `dir`, fsync, then rename over `dst`.
fn atomic_write(dir: &Path, dst: &Path, bytes: &[u8]) -> Result<(), PromptLoopError> {
    let file_name = dst
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("record");
    let tmp = dir.join(format!(".{file_name}.tmp"));

    let mut f = std::fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.flush()?;
    f.sync_all()?;
    std::fs::rename(&tmp, dst)?;
    Ok(())
}
