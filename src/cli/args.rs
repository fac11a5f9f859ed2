// src/cli/args.rs
use crate::models::ExecutionContext;
use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Editor-like context passed on the command line.
#[derive(Args, Debug, Default, Clone)]
pub struct ContextArgs {
    /// A workspace folder. Repeatable. Defaults to the current directory.
    #[arg(long = "workspace", value_name = "DIR")]
    pub workspaces: Vec<PathBuf>,

    /// The active file.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// The active file relative to its workspace folder.
    #[arg(long)]
    pub relative_file: Option<String>,

    /// The selected text.
    #[arg(long)]
    pub selection: Option<String>,

    /// The clipboard content.
    #[arg(long)]
    pub clipboard: Option<String>,

    /// The 1-based cursor line.
    #[arg(long)]
    pub line: Option<u32>,

    /// The file or folder selected in the explorer.
    #[arg(long)]
    pub explorer: Option<PathBuf>,
}

impl ContextArgs {
    /// Builds the execution context, resolving relative paths against the current directory.
    pub fn into_context(self) -> Result<ExecutionContext> {
        let cwd = std::env::current_dir().context("Could not read the current directory")?;
        let absolute = |path: PathBuf| -> PathBuf {
            let joined = if path.is_absolute() { path } else { cwd.join(path) };
            dunce::simplified(&joined).to_path_buf()
        };

        let mut workspace_folders: Vec<PathBuf> = self.workspaces.into_iter().map(absolute).collect();
        if workspace_folders.is_empty() {
            workspace_folders.push(dunce::simplified(&cwd).to_path_buf());
        }

        let active_file = self.file.map(absolute);
        let relative_file = self
            .relative_file
            .or_else(|| relative_to_workspace(active_file.as_deref(), &workspace_folders));

        Ok(ExecutionContext {
            workspace_folders,
            active_file,
            relative_file,
            selected_text: self.selection,
            clipboard: self.clipboard,
            line_number: self.line,
            explorer_selection: self.explorer.map(absolute),
        })
    }
}

fn relative_to_workspace(file: Option<&Path>, roots: &[PathBuf]) -> Option<String> {
    let file = file?;
    roots
        .iter()
        .filter_map(|root| file.strip_prefix(root).ok())
        .min_by_key(|rel| rel.as_os_str().len())
        .map(|rel| rel.to_string_lossy().into_owned())
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Runs an action and then its chain.")]
pub struct RunArgs {
    /// The action id or name.
    pub action: String,

    /// A parameter value (e.g., "target=prod"). Never prompted for.
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Capture output instead of attaching a terminal.
    #[arg(long, conflicts_with = "terminal")]
    pub output: bool,

    /// Run inside an interactive terminal.
    #[arg(long)]
    pub terminal: bool,

    #[command(flatten)]
    pub context: ContextArgs,
}

impl RunArgs {
    pub fn force_output_channel(&self) -> Option<bool> {
        match (self.output, self.terminal) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

/// Parses `NAME=VALUE` pairs. The value may itself contain `=`.
pub fn parse_key_values(pairs: &[String]) -> Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid parameter '{}'. Expected NAME=VALUE.", pair))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(anyhow!("Invalid parameter '{}'. The name is empty.", pair));
            }
            Ok((name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_values() {
        let parsed = parse_key_values(&["a=1".to_string(), "url=x=y".to_string()]).unwrap();
        assert_eq!(parsed["a"], "1");
        assert_eq!(parsed["url"], "x=y");
        assert!(parse_key_values(&["novalue".to_string()]).is_err());
        assert!(parse_key_values(&["=1".to_string()]).is_err());
    }

    #[test]
    fn test_run_args_parse_context_flags() {
        let args = RunArgs::try_parse_from([
            "build",
            "-p",
            "target=prod",
            "--terminal",
            "--workspace",
            "/work/a",
            "--file",
            "/work/a/src/main.rs",
            "--line",
            "12",
        ])
        .unwrap();
        assert_eq!(args.action, "build");
        assert_eq!(args.force_output_channel(), Some(false));

        let context = args.context.into_context().unwrap();
        assert_eq!(context.line_number, Some(12));
        assert_eq!(
            context.relative_file.map(PathBuf::from),
            Some(PathBuf::from("src/main.rs"))
        );
    }

    #[test]
    fn test_output_and_terminal_conflict() {
        assert!(RunArgs::try_parse_from(["x", "--output", "--terminal"]).is_err());
    }
}
