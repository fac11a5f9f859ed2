// src/cli/handlers/mod.rs

// One module per CLI command.

pub mod add;
pub mod commons;
pub mod delete;
pub mod edit;
pub mod export;
pub mod list;
pub mod run;
pub mod secret;
pub mod show;
pub mod vars;
