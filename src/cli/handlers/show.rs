// src/cli/handlers/show.rs

use crate::{
    cli::handlers::commons,
    core::{parameters, store::ActionLookup},
    models::{ActionDefinition, EnvSource},
    system::secrets::SecretStore,
};
use anyhow::Result;
use clap::Parser;
use colored::*;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Displays one action in detail.")]
struct ShowArgs {
    /// The action id or name.
    action: String,

    /// Print the stored JSON record instead.
    #[arg(long)]
    json: bool,
}

/// The main handler for the `show` command.
pub fn handle(args: Vec<String>) -> Result<()> {
    let show_args = ShowArgs::try_parse_from(&args)?;
    let store = commons::open_store()?;
    let action = commons::resolve_action(&store, &show_args.action)?;

    if show_args.json {
        println!("{}", serde_json::to_string_pretty(&action)?);
        return Ok(());
    }

    print_metadata(&action);
    print_parameters(&action);
    print_env(&action)?;
    print_chain(&action, &store);
    print_script(&action);

    println!("\n---------------------------------");
    Ok(())
}

fn print_metadata(action: &ActionDefinition) {
    println!("\n--- Action '{}' ---", action.name.yellow());
    println!("  {:<15} {}", "id".blue(), action.id);
    if let Some(description) = &action.description {
        println!("  {:<15} {}", "description".blue(), description);
    }
    println!("  {:<15} {}", "language".blue(), action.language);
    println!("  {:<15} {}", "tags".blue(), action.groups().join(", "));
    println!(
        "  {:<15} {}",
        "working dir".blue(),
        action.working_directory.as_deref().unwrap_or("(workspace root)")
    );
    let routing = match action.run_in_output_channel {
        Some(true) => "output channel",
        Some(false) => "terminal",
        None => "settings default",
    };
    println!("  {:<15} {}", "output".blue(), routing);
    println!(
        "  {:<15} {}",
        "updated".blue(),
        action.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

fn print_parameters(action: &ActionDefinition) {
    let declared = parameters::merge_declarations(action);
    if declared.is_empty() {
        return;
    }
    println!("\n{}:", "Parameters".bold());
    for param in declared {
        let mut notes = Vec::new();
        if param.required {
            notes.push("required".to_string());
        }
        if let Some(default) = &param.default_value {
            notes.push(format!("default '{}'", default));
        }
        println!("  - {:<20} {}", param.name.cyan(), notes.join(", ").dimmed());
    }
}

fn print_env(action: &ActionDefinition) -> Result<()> {
    if action.env.is_empty() {
        return Ok(());
    }
    let secrets = commons::open_secrets()?;
    println!("\n{}:", "Environment".bold());
    for var in &action.env {
        let shown = match var.source(&action.id) {
            EnvSource::Plain(Some(value)) => value.to_string(),
            EnvSource::Plain(None) => "(unset)".dimmed().to_string(),
            EnvSource::Secret(key) => match secrets.get(&key)? {
                Some(_) => "<secret>".green().to_string(),
                None => "<secret, not set>".red().to_string(),
            },
        };
        println!("  {:<20} {}", var.key.cyan(), shown);
    }
    Ok(())
}

fn print_chain(action: &ActionDefinition, lookup: &dyn ActionLookup) {
    let links = action.chain_links();
    if links.is_empty() {
        return;
    }
    println!("\n{}:", "Chain".bold());
    for (index, link) in links.iter().enumerate() {
        let target = match lookup.find_by_id(&link.target_action_id) {
            Some(found) => found.name.cyan().to_string(),
            None => format!("{} (missing)", link.target_action_id).red().to_string(),
        };
        match &link.pass_output_as {
            Some(alias) => println!("  {}. {} (output as '{}')", index + 1, target, alias),
            None => println!("  {}. {}", index + 1, target),
        }
    }
}

fn print_script(action: &ActionDefinition) {
    println!("\n{}:", "Script".bold());
    for line in action.script.lines() {
        println!("  {}", line.dimmed());
    }
}
