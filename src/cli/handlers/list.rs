use crate::{cli::handlers::commons, core::store};
use anyhow::Result;
use clap::Parser;
use colored::*;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Lists the stored actions grouped by tag.")]
struct ListArgs {
    /// Only show this tag.
    #[arg(long)]
    tag: Option<String>,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let list_args = ListArgs::try_parse_from(&args)?;
    let store = commons::open_store()?;
    let actions = store.load_all()?;

    if actions.is_empty() {
        println!("No actions yet. Import some with `runbox add <file>`.");
        return Ok(());
    }

    let groups = store::group_by_tag(&actions);
    let mut printed = 0;
    for (tag, members) in &groups {
        if let Some(wanted) = &list_args.tag
            && !tag.eq_ignore_ascii_case(wanted)
        {
            continue;
        }
        println!("\n{}", tag.yellow().bold());
        for action in members {
            let description = action.description.as_deref().unwrap_or_default();
            println!(
                "  {:<28} {:<11} {}",
                action.name.cyan(),
                action.language.to_string().dimmed(),
                description
            );
            printed += 1;
        }
    }

    if printed == 0
        && let Some(tag) = list_args.tag
    {
        println!("No actions tagged '{}'.", tag);
    }
    Ok(())
}
