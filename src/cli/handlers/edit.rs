use crate::{
    cli::handlers::{add, commons},
    core::store::ActionStore,
    models::{ActionDefinition, ActionDraft},
};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use colored::*;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Updates an existing action from a JSON or TOML draft, keeping its id."
)]
struct EditArgs {
    /// The id or name of the action to update.
    action: String,
    /// A draft file holding exactly one action. Prints the current draft when omitted.
    file: Option<PathBuf>,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let edit_args = EditArgs::try_parse_from(&args)?;
    let store = commons::open_store()?;

    let Some(file) = edit_args.file else {
        let action = commons::resolve_action(&store, &edit_args.action)?;
        println!("{}", serde_json::to_string_pretty(&action.to_draft())?);
        return Ok(());
    };

    let mut drafts = add::read_drafts(&file)?;
    if drafts.len() != 1 {
        return Err(anyhow!(
            "'{}' must hold exactly one action, found {}.",
            file.display(),
            drafts.len()
        ));
    }
    let draft = drafts.remove(0);

    let updated = update_action(&store, &edit_args.action, draft)?;
    println!("{} Updated {}", "✔".green(), commons::display_name(&updated));
    Ok(())
}

/// Replaces the fields of a stored action with the draft's, keeping its identity.
fn update_action(store: &ActionStore, query: &str, draft: ActionDraft) -> Result<ActionDefinition> {
    let current = commons::resolve_action(store, query)?;
    let updated = current.apply_draft(draft);
    store
        .save(updated.clone())
        .with_context(|| format!("Could not update action '{}'", current.name))?;
    log::debug!("Action '{}' updated.", updated.id);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Language;
    use tempfile::tempdir;

    #[test]
    fn test_update_keeps_identity_and_replaces_fields() {
        let dir = tempdir().unwrap();
        let store = ActionStore::open(dir.path().join("actions.json"));
        let original = ActionDraft {
            name: "deploy".to_string(),
            script: "echo old".to_string(),
            ..Default::default()
        }
        .into_definition();
        store.save(original.clone()).unwrap();

        let mut draft = original.to_draft();
        draft.script = "print('new')".to_string();
        draft.language = Language::Python;
        let updated = update_action(&store, "deploy", draft).unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.created_at, original.created_at);
        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].script, "print('new')");
        assert_eq!(all[0].language, Language::Python);
    }

    #[test]
    fn test_update_of_unknown_action_fails() {
        let dir = tempdir().unwrap();
        let store = ActionStore::open(dir.path().join("actions.json"));
        let draft = ActionDraft {
            name: "ghost".to_string(),
            ..Default::default()
        };
        assert!(update_action(&store, "ghost", draft).is_err());
        assert!(store.load_all().unwrap().is_empty());
    }
}
