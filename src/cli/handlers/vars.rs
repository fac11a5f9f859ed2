use crate::{cli::args::ContextArgs, core::variables};
use anyhow::Result;
use clap::Parser;
use colored::*;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Lists the predefined variables and their value in the given context."
)]
struct VarsArgs {
    #[command(flatten)]
    context: ContextArgs,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let vars_args = VarsArgs::try_parse_from(&args)?;
    let context = vars_args.context.into_context()?;

    println!("\n{}", "Predefined variables".yellow().bold());
    for variable in variables::all() {
        let token = format!("${{{}}}", variable.name);
        let current = (variable.resolve)(&context)
            .map(|v| v.green().to_string())
            .unwrap_or_else(|| "(no value)".dimmed().to_string());
        println!("  {:<28} {}", token.cyan(), variable.description);
        println!("  {:<28} {}", "", current);
    }
    println!("\n  Parameters: {}", "${param:name:default:prompt}".cyan());
    Ok(())
}
