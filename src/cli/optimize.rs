// src/cli/optimize.rs — `promptloop optimize`: run one session

use crate::core::orchestrator::OptimizationLoop;
use crate::core::types::{LoopSettings, LoopState, SessionOutcome, SessionParams};
use crate::infra::config::Config;

/// Command-line overrides for a session.
#[derive(Debug, Clone, Default)]
pub struct OptimizeArgs {
    pub template: String,
    pub initial_round: Option<u32>,
    pub max_rounds: Option<u32>,
    pub workspace: Option<String>,
    pub concurrency: Option<usize>,
    pub quiet: bool,
}

pub async fn run_optimize(config: &Config, args: OptimizeArgs) -> anyhow::Result<()> {
    let store = super::template_store(config);
    let template = store.load(&args.template)?;

    let mut settings = LoopSettings::from(&config.optimizer);
    if let Some(n) = args.concurrency {
        settings.concurrency = n.max(1);
    }

    let params = SessionParams {
        workspace: super::workspace_dir(config, args.workspace.as_deref()),
        template_name: args.template.clone(),
        initial_round: args.initial_round.unwrap_or(config.optimizer.initial_round),
        max_rounds: args.max_rounds.unwrap_or(config.optimizer.max_rounds),
    };

    let pool = super::build_pool(config)?;
    let mut session = OptimizationLoop::new(pool, template, params, settings);
    if !args.quiet {
        session = session.with_progress(super::progress::terminal_progress());
    }

    let stop = session.stop_handle();
    let quiet = args.quiet;
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            if !quiet {
                eprintln!("[stop] finishing the current round, then stopping...");
            }
            stop.stop();
        }
    });

    let outcome = session.run().await?;
    print_summary(&args.template, &outcome);

    match outcome.state {
        LoopState::Failed => Err(anyhow::anyhow!(
            "session failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        )),
        _ => Ok(()),
    }
}

fn print_summary(template: &str, outcome: &SessionOutcome) {
    println!("Template:   {}", template);
    println!("State:      {}", outcome.state);
    println!(
        "Rounds:     {} run, {} successful, {} tokens",
        outcome.rounds.len(),
        outcome.successful_rounds(),
        outcome.total_tokens()
    );
    if outcome.state == LoopState::Cancelled {
        if let Some(ref reason) = outcome.error {
            println!("Stopped:    {}", reason);
        }
    }
    match &outcome.best {
        Some(best) => {
            println!("Best round: {}", best.round);
            println!();
            println!("{}", best.prompt);
        }
        None => println!("Best round: (none)"),
    }
}
