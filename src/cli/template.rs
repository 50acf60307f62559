// src/cli/template.rs — `promptloop template list | show | init`

use super::TemplateAction;
use crate::infra::config::Config;
use crate::template::{Template, TemplateStore};

pub async fn run_template(config: &Config, action: TemplateAction) -> anyhow::Result<()> {
    let store = super::template_store(config);
    match action {
        TemplateAction::List => list(&store),
        TemplateAction::Show { name } => show(&store, &name),
        TemplateAction::Init { name, force } => init(&store, &name, force),
    }
}

fn list(store: &TemplateStore) -> anyhow::Result<()> {
    let names = store.list()?;
    if names.is_empty() {
        println!("No templates in {}", store.root().display());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

fn show(store: &TemplateStore, name: &str) -> anyhow::Result<()> {
    let template = store.load(name)?;
    print!("{}", serde_yml::to_string(&template)?);
    if let Err(e) = template.validate(name) {
        eprintln!("warning: {}", e);
    }
    Ok(())
}

fn init(store: &TemplateStore, name: &str, force: bool) -> anyhow::Result<()> {
    if store.exists(name) && !force {
        anyhow::bail!("template '{}' already exists (use --force to overwrite)", name);
    }
    let path = store.save(name, &Template::default())?;
    println!("Created {}", path.display());
    Ok(())
}
