use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use dialoguer::{Confirm, theme::ColorfulTheme};

use crate::{
    cli::handlers::commons,
    models::{ActionDefinition, EnvSource},
    system::secrets::SecretStore,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Deletes an action together with the secrets it owns."
)]
struct DeleteArgs {
    /// The action id or name.
    action: String,

    /// Do not ask for confirmation.
    #[arg(long, short)]
    yes: bool,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let delete_args = DeleteArgs::try_parse_from(&args)?;
    let store = commons::open_store()?;
    let action = commons::resolve_action(&store, &delete_args.action)?;

    if !delete_args.yes && !confirm_delete(&action)? {
        println!("\nOperation cancelled.");
        return Ok(());
    }

    let secrets = commons::open_secrets()?;
    let mut removed_secrets = 0;
    for var in &action.env {
        if let EnvSource::Secret(key) = var.source(&action.id) {
            secrets
                .delete(&key)
                .with_context(|| format!("Could not delete secret for '{}'", var.key))?;
            removed_secrets += 1;
        }
    }

    log::info!("Deleting action '{}' ({})", action.name, action.id);
    store.delete(&action.id)?;

    println!(
        "\n{} Deleted {} and {} secret(s).",
        "✔".green(),
        commons::display_name(&action),
        removed_secrets
    );

    let dangling: Vec<String> = store
        .load_all()?
        .into_iter()
        .filter(|other| other.chain_links().iter().any(|l| l.target_action_id == action.id))
        .map(|other| other.name)
        .collect();
    if !dangling.is_empty() {
        println!(
            "  {} still chained from: {}",
            "Note:".yellow(),
            dangling.join(", ")
        );
    }
    Ok(())
}

fn confirm_delete(action: &ActionDefinition) -> Result<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Delete action '{}'?", action.name))
        .default(false)
        .interact()?)
}
