// src/cli/progress.rs — Terminal progress renderer for optimization rounds

use crate::core::types::ProgressEvent;

/// One line of progress text for `event`.
pub fn format_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::RoundStart {
            round,
            final_round,
            anchor,
        } => {
            if *anchor {
                format!("[round {}/{}] running seed prompt...", round, final_round)
            } else {
                format!("[round {}/{}] optimizing...", round, final_round)
            }
        }
        ProgressEvent::RoundEnd {
            round,
            succeed,
            tokens,
        } => {
            let verdict = if *succeed { "new best" } else { "kept best" };
            format!("[round {}] {:<9} ({} tokens)", round, verdict, tokens)
        }
        ProgressEvent::RoundFailed { round, error } => {
            format!("[round {}] failed: {}", round, error)
        }
        ProgressEvent::Finished {
            state,
            rounds,
            successful,
            best_round,
        } => {
            let best = best_round
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".into());
            format!(
                "[done] {} rounds={} successful={} best=round {}",
                state, rounds, successful, best
            )
        }
    }
}

/// Build a progress callback that writes formatted output to stderr.
///
/// Returns a closure suitable for `OptimizationLoop::with_progress()`.
pub fn terminal_progress() -> impl Fn(ProgressEvent) + Send + Sync + 'static {
    move |event| eprintln!("{}", format_event(&event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LoopState;

    #[test]
    fn test_round_start_format() {
        let seed = format_event(&ProgressEvent::RoundStart {
            round: 1,
            final_round: 10,
            anchor: true,
        });
        assert_eq!(seed, "[round 1/10] running seed prompt...");

        let opt = format_event(&ProgressEvent::RoundStart {
            round: 2,
            final_round: 10,
            anchor: false,
        });
        assert_eq!(opt, "[round 2/10] optimizing...");
    }

    #[test]
    fn test_round_end_format() {
        let msg = format_event(&ProgressEvent::RoundEnd {
            round: 3,
            succeed: true,
            tokens: 1234,
        });
        assert_eq!(msg, "[round 3] new best  (1234 tokens)");
    }

    #[test]
    fn test_round_failed_format() {
        let msg = format_event(&ProgressEvent::RoundFailed {
            round: 4,
            error: "Judge reply had no usable verdict: missing <choose>".into(),
        });
        assert!(msg.starts_with("[round 4] failed: Judge reply"));
    }

    #[test]
    fn test_finished_format() {
        let msg = format_event(&ProgressEvent::Finished {
            state: LoopState::Cancelled,
            rounds: 3,
            successful: 2,
            best_round: Some(3),
        });
        assert_eq!(msg, "[done] cancelled rounds=3 successful=2 best=round 3");

        let none = format_event(&ProgressEvent::Finished {
            state: LoopState::Completed,
            rounds: 0,
            successful: 0,
            best_round: None,
        });
        assert!(none.ends_with("best=round -"));
    }
}
