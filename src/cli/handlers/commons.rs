// src/cli/handlers/commons.rs

// Shared helpers for the command handlers.

use crate::{
    core::{
        settings::{self, Settings},
        store::ActionStore,
    },
    models::ActionDefinition,
    system::secrets::FileSecretStore,
};
use anyhow::{Context, Result};
use colored::Colorize;

pub fn load_settings() -> Result<Settings> {
    settings::load_settings().context("Could not load runbox settings")
}

pub fn open_store() -> Result<ActionStore> {
    ActionStore::open_default().context("Could not open the action store")
}

pub fn open_secrets() -> Result<FileSecretStore> {
    FileSecretStore::open_default().context("Could not open the secret store")
}

/// Finds an action by id or name in the default store.
pub fn resolve_action(store: &ActionStore, query: &str) -> Result<ActionDefinition> {
    Ok(store.find(query)?)
}

/// `name (id)` with the name highlighted.
pub fn display_name(action: &ActionDefinition) -> String {
    format!("{} {}", action.name.cyan(), format!("({})", action.id).dimmed())
}
