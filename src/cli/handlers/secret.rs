use crate::{
    cli::handlers::commons,
    models::{ActionDefinition, EnvSource},
    system::secrets::SecretStore,
};
use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::{Password, theme::ColorfulTheme};

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Manages secret environment values.")]
struct SecretArgs {
    #[command(subcommand)]
    command: SecretCommand,
}

#[derive(Subcommand, Debug)]
enum SecretCommand {
    /// Stores the value of a secret variable. Prompts when VALUE is omitted.
    Set {
        action: String,
        key: String,
        value: Option<String>,
    },
    /// Removes the stored value of a secret variable.
    Delete { action: String, key: String },
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let secret_args = SecretArgs::try_parse_from(&args)?;
    let store = commons::open_store()?;
    let secrets = commons::open_secrets()?;

    match secret_args.command {
        SecretCommand::Set { action, key, value } => {
            let action = commons::resolve_action(&store, &action)?;
            let secret_key = secret_key_of(&action, &key)?;
            let value = match value {
                Some(value) => value,
                None => Password::with_theme(&ColorfulTheme::default())
                    .with_prompt(format!("Value for {}", key))
                    .allow_empty_password(true)
                    .interact()?,
            };
            secrets.store(&secret_key, &value)?;
            println!("{} Secret '{}' stored for {}.", "✔".green(), key, commons::display_name(&action));
        }
        SecretCommand::Delete { action, key } => {
            let action = commons::resolve_action(&store, &action)?;
            let secret_key = secret_key_of(&action, &key)?;
            secrets.delete(&secret_key)?;
            println!("{} Secret '{}' removed from {}.", "✔".green(), key, commons::display_name(&action));
        }
    }
    Ok(())
}

/// The store key of a secret-backed variable of `action`.
fn secret_key_of(action: &ActionDefinition, env_key: &str) -> Result<String> {
    let var = action
        .env
        .iter()
        .find(|v| v.key == env_key)
        .ok_or_else(|| anyhow!("Action '{}' has no environment variable '{}'.", action.name, env_key))?;
    match var.source(&action.id) {
        EnvSource::Secret(key) => Ok(key),
        EnvSource::Plain(_) => Err(anyhow!(
            "Environment variable '{}' of '{}' is not secret-backed.",
            env_key,
            action.name
        )),
    }
}
