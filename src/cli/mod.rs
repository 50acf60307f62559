// src/cli/mod.rs — CLI definition (clap derive)

pub mod diagnostics;
pub mod optimize;
pub mod progress;
pub mod results;
pub mod template;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::infra::config::Config;
use crate::infra::paths;
use crate::provider::pool::ClientPool;
use crate::template::TemplateStore;

#[derive(Parser)]
#[command(
    name = "promptloop",
    about = "Self-supervised prompt optimization",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an optimization session for a template
    Optimize {
        /// Template name (file stem under the templates directory)
        #[arg(short, long)]
        template: String,
        /// First round number of this session
        #[arg(long)]
        initial_round: Option<u32>,
        /// Number of rounds to run
        #[arg(long)]
        max_rounds: Option<u32>,
        /// Workspace directory for round records
        #[arg(long)]
        workspace: Option<String>,
        /// Concurrent execute calls per round
        #[arg(long)]
        concurrency: Option<usize>,
        /// Suppress progress output (only print the summary)
        #[arg(long)]
        quiet: bool,
    },
    /// Show recorded rounds for a template
    Results {
        #[arg(short, long)]
        template: String,
        #[arg(long)]
        workspace: Option<String>,
        /// Delete the template's workspace after printing
        #[arg(long)]
        purge: bool,
    },
    /// Inspect and create templates
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },
    /// Send one question through a prompt and print the reply
    Try {
        /// Prompt text, or @path to read it from a file
        #[arg(short, long)]
        prompt: String,
        #[arg(short, long)]
        question: String,
        /// Role whose model answers (optimize, evaluate, execute)
        #[arg(long, default_value = "execute")]
        role: String,
    },
    /// Send "Hello" to every configured role
    Check,
}

#[derive(Subcommand, Clone)]
pub enum TemplateAction {
    /// List available templates
    List,
    /// Print a template
    Show { name: String },
    /// Create an empty template
    Init {
        name: String,
        /// Overwrite an existing template
        #[arg(long)]
        force: bool,
    },
}

/// Load config from `--config` or the default location.
pub fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    match path {
        Some(p) => Config::load_from(std::path::Path::new(p))
            .with_context(|| format!("Failed to load config from {p}")),
        None => Config::load().context("Failed to load config"),
    }
}

/// Validate role settings and build the shared client pool.
pub fn build_pool(config: &Config) -> anyhow::Result<Arc<ClientPool>> {
    let pool = ClientPool::initialize(
        config.model_roles(),
        config.provider.timeout(),
        config.provider.retry_policy(),
    )?;
    Ok(Arc::new(pool))
}

pub fn template_store(config: &Config) -> TemplateStore {
    TemplateStore::new(paths::resolve_dir(&config.paths.templates))
}

pub fn workspace_dir(config: &Config, flag: Option<&str>) -> PathBuf {
    paths::resolve_dir(flag.unwrap_or(&config.paths.workspace))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optimize() {
        let cli = Cli::try_parse_from([
            "promptloop",
            "optimize",
            "--template",
            "math",
            "--max-rounds",
            "5",
            "--quiet",
        ])
        .unwrap();
        match cli.command {
            Commands::Optimize {
                template,
                max_rounds,
                initial_round,
                quiet,
                ..
            } => {
                assert_eq!(template, "math");
                assert_eq!(max_rounds, Some(5));
                assert_eq!(initial_round, None);
                assert!(quiet);
            }
            _ => panic!("expected optimize"),
        }
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_parse_try_default_role() {
        let cli = Cli::try_parse_from(["promptloop", "try", "-p", "Be brief.", "-q", "2+2?"])
            .unwrap();
        match cli.command {
            Commands::Try { role, prompt, .. } => {
                assert_eq!(role, "execute");
                assert_eq!(prompt, "Be brief.");
            }
            _ => panic!("expected try"),
        }
    }

    #[test]
    fn test_parse_template_init() {
        let cli =
            Cli::try_parse_from(["promptloop", "template", "init", "user/poem", "--force"]).unwrap();
        match cli.command {
            Commands::Template {
                action: TemplateAction::Init { name, force },
            } => {
                assert_eq!(name, "user/poem");
                assert!(force);
            }
            _ => panic!("expected template init"),
        }
    }

    #[test]
    fn test_global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["promptloop", "check", "--config", "/tmp/c.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("/tmp/c.toml"));
    }

    #[test]
    fn test_workspace_dir_flag_wins() {
        let config = Config::default();
        assert!(workspace_dir(&config, Some("/tmp/ws")).ends_with("ws"));
        assert!(workspace_dir(&config, None).ends_with("workspace"));
    }
}
