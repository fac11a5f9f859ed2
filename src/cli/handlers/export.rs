use crate::cli::handlers::commons;
use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Writes every stored action as JSON.")]
struct ExportArgs {
    /// Destination file. Prints to stdout when omitted.
    file: Option<PathBuf>,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let export_args = ExportArgs::try_parse_from(&args)?;
    let actions = commons::open_store()?.load_all()?;
    let json = serde_json::to_string_pretty(&actions)?;

    match export_args.file {
        Some(path) => {
            fs::write(&path, json).with_context(|| format!("Could not write '{}'", path.display()))?;
            println!(
                "{} Exported {} action(s) to '{}'.",
                "✔".green(),
                actions.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}
