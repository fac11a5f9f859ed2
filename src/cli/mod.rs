use clap::Parser;
use thiserror::Error;

pub mod args;
pub mod handlers;
pub mod prompt;

const COMMANDS_HELP: &str = "\
Commands:
  run <action> [-p NAME=VALUE]...   Run an action and its chain
  list, ls [--tag TAG]              List actions grouped by tag
  show, info <action>               Show one action
  add, import <file>                Import actions from a JSON or TOML file
  edit, update <action> [file]      Update an action from a draft, or print its draft
  export [file]                     Write every action as JSON
  delete, del, rm <action>          Delete an action and its secrets
  secret set|delete <action> <KEY>  Manage secret environment values
  vars                              List the predefined variables

Run `runbox <command> --help` for the options of a command.";

/// runbox: reusable script actions with parameters, secrets and chaining.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    after_help = COMMANDS_HELP,
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
#[command(trailing_var_arg = true)]
pub struct Cli {
    /// The command to run.
    pub command: Option<String>,

    /// Arguments handed to the command.
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// A run finished, but its action (or a chained one) did not exit with 0.
/// The binary exits with `code` without printing anything more.
#[derive(Error, Debug)]
#[error("Action exited with code {code}.")]
pub struct ActionExit {
    pub code: i32,
}
