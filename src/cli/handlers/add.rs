use crate::{
    cli::handlers::commons,
    models::{ActionDefinition, ActionDraft},
};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use colored::*;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Imports actions from a JSON or TOML file. Every draft gets a fresh id."
)]
struct AddArgs {
    /// A `.json` or `.toml` file holding one draft or a list of drafts.
    file: PathBuf,
}

/// Accepted file shapes: a single draft, a list, or `actions = [...]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum DraftDocument {
    Wrapped { actions: Vec<ActionDraft> },
    Many(Vec<ActionDraft>),
    One(Box<ActionDraft>),
}

impl DraftDocument {
    fn into_drafts(self) -> Vec<ActionDraft> {
        match self {
            Self::Wrapped { actions } | Self::Many(actions) => actions,
            Self::One(draft) => vec![*draft],
        }
    }
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let add_args = AddArgs::try_parse_from(&args)?;
    let drafts = read_drafts(&add_args.file)?;
    if drafts.is_empty() {
        return Err(anyhow!("'{}' contains no actions.", add_args.file.display()));
    }

    let store = commons::open_store()?;
    let mut all = store.load_all()?;
    let created: Vec<ActionDefinition> = drafts.into_iter().map(ActionDraft::into_definition).collect();
    for action in &created {
        action
            .validate()
            .with_context(|| format!("Action '{}' is invalid", action.name))?;
    }
    all.extend(created.iter().cloned());
    store.overwrite_all(&all)?;

    println!("{} Imported {} action(s):", "✔".green(), created.len());
    for action in &created {
        println!("  - {}", commons::display_name(action));
    }
    Ok(())
}

pub(crate) fn read_drafts(path: &Path) -> Result<Vec<ActionDraft>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Could not read '{}'", path.display()))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let document: DraftDocument = if is_toml {
        toml::from_str(&content).with_context(|| format!("'{}' is not a valid TOML action file", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("'{}' is not a valid JSON action file", path.display()))?
    };
    Ok(document.into_drafts())
}
