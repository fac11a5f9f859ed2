use crate::{
    cli::{
        ActionExit,
        args::{RunArgs, parse_key_values},
        handlers::commons,
        prompt::TerminalPrompter,
    },
    core::chain::{ChainOutcome, ChainReport, ChainRunner},
    models::{ActionDefinition, ExecutionResult},
    system::{
        executor::{ActionExecutor, RunOptions},
        output::ConsoleSink,
    },
};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use colored::*;
use std::sync::Arc;

///
/// Main entry point for the 'run' command.
/// Runs the action, then its chain, and reports how each step ended.
///
pub fn handle(args: Vec<String>) -> Result<()> {
    let run_args = RunArgs::try_parse_from(&args)?;
    let provided_values = parse_key_values(&run_args.params)?;
    let force_output_channel = run_args.force_output_channel();

    let settings = commons::load_settings()?;
    let store = commons::open_store()?;
    let action = commons::resolve_action(&store, &run_args.action)?;
    let context = run_args.context.into_context()?;

    let sink = Arc::new(ConsoleSink::new(settings.output_channel_name.clone()));
    let executor = Arc::new(
        ActionExecutor::new(
            settings,
            Arc::new(commons::open_secrets()?),
            Arc::new(TerminalPrompter),
            sink,
        )
        .with_terminal_input(true),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Could not start the async runtime")?;

    runtime.block_on(async {
        // Ctrl+C tears down a terminal-mode run. Captured runs receive the
        // signal through their process group.
        let interrupt = {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    log::debug!("Interrupt received; disposing the active terminal.");
                    executor.dispose_terminal();
                }
            })
        };

        let options = RunOptions {
            provided_values,
            force_output_channel,
        };
        let chain = ChainRunner::new(executor.as_ref(), &store);
        let outcome = chain.run(&action, &context, options).await;
        interrupt.abort();

        let (root_result, report) = outcome.with_context(|| format!("Failed to run '{}'", action.name))?;
        report_root(&action, &root_result);
        report_chain(&report)?;

        let failed_code = match &report.outcome {
            ChainOutcome::NonZeroExit { exit_code, .. } => Some(exit_code.unwrap_or(1)),
            _ if !root_result.succeeded() => Some(root_result.exit_code.unwrap_or(1)),
            _ => None,
        };
        match failed_code {
            Some(code) => Err(ActionExit { code }.into()),
            None => Ok(()),
        }
    })
}

fn report_root(action: &ActionDefinition, result: &ExecutionResult) {
    match result.exit_code {
        Some(0) => println!("\n{} '{}' completed.", "✔".green(), action.name.cyan()),
        Some(code) => println!(
            "\n{} '{}' exited with code {}.",
            "✘".yellow(),
            action.name.cyan(),
            code.to_string().yellow()
        ),
        None => println!(
            "\n{} '{}' was terminated before it exited.",
            "✘".yellow(),
            action.name.cyan()
        ),
    }
}

fn report_chain(report: &ChainReport) -> Result<()> {
    for result in &report.executed {
        if result.succeeded() {
            println!("  {} chained action {} completed.", "→".green(), result.action_id.dimmed());
        }
    }

    match &report.outcome {
        ChainOutcome::Completed | ChainOutcome::NotStarted => Ok(()),
        ChainOutcome::CycleDetected { link_index, target } => {
            println!(
                "{} Chain stopped at link {}: '{}' already ran in this chain.",
                "Warning:".yellow().bold(),
                link_index + 1,
                target
            );
            Ok(())
        }
        ChainOutcome::TargetMissing { link_index, target } => {
            println!(
                "{} Chain stopped at link {}: action '{}' was not found.",
                "Warning:".yellow().bold(),
                link_index + 1,
                target
            );
            Ok(())
        }
        ChainOutcome::NonZeroExit {
            link_index,
            target,
            exit_code,
        } => {
            println!(
                "{} Chain stopped at link {}: '{}' exited with {}.",
                "✘".yellow(),
                link_index + 1,
                target,
                exit_code.map_or_else(|| "no exit code".to_string(), |c| format!("code {}", c))
            );
            Ok(())
        }
        ChainOutcome::Failed {
            link_index,
            target,
            error,
        } => Err(anyhow!(
            "Chain link {} ('{}') failed: {}",
            link_index + 1,
            target,
            error
        )),
    }
}
