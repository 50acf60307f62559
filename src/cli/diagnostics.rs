// src/cli/diagnostics.rs — `promptloop try` and `promptloop check`

use crate::infra::config::Config;
use crate::provider::pool::ClientPool;
use crate::provider::roles::ModelRole;
use crate::provider::Message;

/// `text` as-is, or the contents of the file when written as `@path`.
pub fn read_prompt_arg(arg: &str) -> anyhow::Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read prompt file {}: {}", path, e)),
        None => Ok(arg.to_string()),
    }
}

/// Run `prompt` on a single question, printing the reply to stdout.
pub async fn run_try(
    config: &Config,
    prompt: &str,
    question: &str,
    role: &str,
) -> anyhow::Result<()> {
    let role: ModelRole = role.parse()?;
    let prompt = read_prompt_arg(prompt)?;
    let pool = super::build_pool(config)?;

    let response = pool
        .dispatch(role, vec![Message::user(format!("{prompt}\n\n{question}"))])
        .await?;
    println!("{}", response.content);
    eprintln!(
        "[{}] {} ({} tokens)",
        role,
        pool.role_config(role).model_id,
        response.tokens()
    );
    Ok(())
}

/// Send "Hello" through every role and report each result.
pub async fn run_check(config: &Config) -> anyhow::Result<()> {
    let pool = super::build_pool(config)?;
    let failures = check_roles(&pool).await;
    if failures > 0 {
        anyhow::bail!("{} of {} roles failed the connectivity check", failures, ModelRole::ALL.len());
    }
    Ok(())
}

async fn check_roles(pool: &ClientPool) -> usize {
    let mut failures = 0;
    for role in ModelRole::ALL {
        let model = &pool.role_config(role).model_id;
        match pool.dispatch(role, vec![Message::user("Hello")]).await {
            Ok(_) => println!("  {:<9} {:<24} ok", role, model),
            Err(e) => {
                failures += 1;
                println!("  {:<9} {:<24} FAILED: {}", role, model, e);
            }
        }
    }
    failures
}
