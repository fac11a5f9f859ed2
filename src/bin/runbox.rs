// src/bin/runbox.rs

use anyhow::{Result, anyhow};
use clap::{CommandFactory, Parser};
use colored::*;
use runbox::{
    cli::{ActionExit, Cli, handlers},
    system::executor::ExecutorError,
};

// --- Command Definition and Registry ---

/// A command, its aliases, and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>) -> Result<()>,
}

/// Every command the binary understands.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "add",
        aliases: &["import"],
        handler: handlers::add::handle,
    },
    CommandDefinition {
        name: "delete",
        aliases: &["del", "rm"],
        handler: handlers::delete::handle,
    },
    CommandDefinition {
        name: "edit",
        aliases: &["update"],
        handler: handlers::edit::handle,
    },
    CommandDefinition {
        name: "export",
        aliases: &[],
        handler: handlers::export::handle,
    },
    CommandDefinition {
        name: "list",
        aliases: &["ls"],
        handler: handlers::list::handle,
    },
    CommandDefinition {
        name: "run",
        aliases: &[],
        handler: handlers::run::handle,
    },
    CommandDefinition {
        name: "secret",
        aliases: &[],
        handler: handlers::secret::handle,
    },
    CommandDefinition {
        name: "show",
        aliases: &["info"],
        handler: handlers::show::handle,
    },
    CommandDefinition {
        name: "vars",
        aliases: &[],
        handler: handlers::vars::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Sets up logging, dispatches to the handler and prints errors in one place.
fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()) {
        // The action already reported its own exit code.
        if let Some(exit) = e.downcast_ref::<ActionExit>() {
            std::process::exit(exit.code);
        }
        if let Some(ExecutorError::Interrupted(_)) = e.downcast_ref::<ExecutorError>() {
            std::process::exit(130);
        }

        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let Some(command_name) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let command = find_command(&command_name).ok_or_else(|| {
        anyhow!(
            "Unknown command '{}'. Run `runbox --help` to see the available commands.",
            command_name
        )
    })?;
    (command.handler)(cli.args)
}
