// src/main.rs — promptloop entry point

use clap::Parser;

use promptloop::cli::optimize::{self, OptimizeArgs};
use promptloop::cli::{self, Cli, Commands};
use promptloop::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Respects RUST_LOG; --log-level otherwise
    logger::init_logging(&cli.log_level);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Optimize {
            template,
            initial_round,
            max_rounds,
            workspace,
            concurrency,
            quiet,
        } => {
            let args = OptimizeArgs {
                template,
                initial_round,
                max_rounds,
                workspace,
                concurrency,
                quiet,
            };
            optimize::run_optimize(&config, args).await
        }
        Commands::Results {
            template,
            workspace,
            purge,
        } => cli::results::show_results(&config, &template, workspace.as_deref(), purge).await,
        Commands::Template { action } => cli::template::run_template(&config, action).await,
        Commands::Try {
            prompt,
            question,
            role,
        } => cli::diagnostics::run_try(&config, &prompt, &question, &role).await,
        Commands::Check => cli::diagnostics::run_check(&config).await,
    }
}
