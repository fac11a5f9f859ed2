//! # Runtime Selection
//!
//! Maps an action's language and the host platform to the interpreter that
//! runs it. Each `(language, platform)` pair has one row in a static table that
//! names the script extension, where the command comes from, and how the
//! argument list is built.
//!
//! Two rows need a lookup at run time:
//! - Python searches upward from the working directory for a virtual
//!   environment and falls back to the bare `python` command.
//! - Bash on Windows locates `bash` on the search path and classifies it as
//!   WSL, Git Bash, or something else. The classification decides how Windows
//!   paths are rewritten for the script.

use crate::{
    constants::{MAX_VENV_SEARCH_DEPTH, VENV_DIR_NAMES, VENV_MARKER_FILE},
    models::{Language, Platform, ShellFlavor},
};
use base64::Engine;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Where the interpreter command of a row comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    Fixed(&'static str),
    PythonVenv,
    WindowsBash,
}

/// Inputs of an argument builder.
#[derive(Debug, Clone, Default)]
pub struct ScriptArgs {
    /// Script path, already converted for the shell flavor.
    pub script_path: String,
    /// `--import` value that registers the Node module resolver.
    pub node_loader: Option<String>,
}

/// One row of the runtime table.
#[derive(Debug)]
pub struct RuntimeSpec {
    pub language: Language,
    pub platform: Platform,
    pub extension: &'static str,
    pub command: CommandSource,
    pub flavor: Option<ShellFlavor>,
    pub build_args: fn(&ScriptArgs) -> Vec<String>,
}

fn script_only(args: &ScriptArgs) -> Vec<String> {
    vec![args.script_path.clone()]
}

fn powershell_file(args: &ScriptArgs) -> Vec<String> {
    vec!["-File".to_string(), args.script_path.clone()]
}

fn node_with_loader(args: &ScriptArgs) -> Vec<String> {
    let mut argv = Vec::with_capacity(3);
    if let Some(loader) = &args.node_loader {
        argv.push("--import".to_string());
        argv.push(loader.clone());
    }
    argv.push(args.script_path.clone());
    argv
}

/// The runtime table. The bash rows double as the fallback for unknown languages.
static RUNTIME_TABLE: &[RuntimeSpec] = &[
    RuntimeSpec {
        language: Language::Bash,
        platform: Platform::Unix,
        extension: "sh",
        command: CommandSource::Fixed("bash"),
        flavor: Some(ShellFlavor::Posix),
        build_args: script_only,
    },
    RuntimeSpec {
        language: Language::Bash,
        platform: Platform::Windows,
        extension: "sh",
        command: CommandSource::WindowsBash,
        flavor: None,
        build_args: script_only,
    },
    RuntimeSpec {
        language: Language::PowerShell,
        platform: Platform::Unix,
        extension: "ps1",
        command: CommandSource::Fixed("pwsh"),
        flavor: None,
        build_args: powershell_file,
    },
    RuntimeSpec {
        language: Language::PowerShell,
        platform: Platform::Windows,
        extension: "ps1",
        command: CommandSource::Fixed("powershell"),
        flavor: None,
        build_args: powershell_file,
    },
    RuntimeSpec {
        language: Language::Node,
        platform: Platform::Unix,
        extension: "mjs",
        command: CommandSource::Fixed("node"),
        flavor: None,
        build_args: node_with_loader,
    },
    RuntimeSpec {
        language: Language::Node,
        platform: Platform::Windows,
        extension: "mjs",
        command: CommandSource::Fixed("node"),
        flavor: None,
        build_args: node_with_loader,
    },
    RuntimeSpec {
        language: Language::Python,
        platform: Platform::Unix,
        extension: "py",
        command: CommandSource::PythonVenv,
        flavor: None,
        build_args: script_only,
    },
    RuntimeSpec {
        language: Language::Python,
        platform: Platform::Windows,
        extension: "py",
        command: CommandSource::PythonVenv,
        flavor: None,
        build_args: script_only,
    },
];

static FALLBACK_RUNTIME: RuntimeSpec = RuntimeSpec {
    language: Language::Bash,
    platform: Platform::Unix,
    extension: "sh",
    command: CommandSource::Fixed("bash"),
    flavor: Some(ShellFlavor::Posix),
    build_args: script_only,
};

/// Returns the table row for a language on a platform.
pub fn spec_for(language: Language, platform: Platform) -> &'static RuntimeSpec {
    RUNTIME_TABLE
        .iter()
        .find(|row| row.language == language && row.platform == platform)
        .unwrap_or(&FALLBACK_RUNTIME)
}

// --- PYTHON VIRTUAL ENVIRONMENTS ---

fn venv_interpreters(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Windows => &["Scripts/python.exe"],
        Platform::Unix => &["bin/python", "bin/python3"],
    }
}

fn interpreter_in(venv_root: &Path, platform: Platform) -> Option<PathBuf> {
    venv_interpreters(platform)
        .iter()
        .map(|rel| venv_root.join(rel))
        .find(|candidate| candidate.is_file())
}

/// Searches `start` and its ancestors for a Python virtual environment and
/// returns its interpreter. The nearest ancestor wins.
///
/// A directory qualifies when it has a child named like a venv (`.venv`,
/// `venv`, ... plus `extra_dirs`) holding an interpreter, or when it carries a
/// `pyvenv.cfg` marker next to an interpreter.
pub fn find_python_venv(start: &Path, platform: Platform, extra_dirs: &[String]) -> Option<PathBuf> {
    let names: Vec<&str> = VENV_DIR_NAMES
        .iter()
        .copied()
        .chain(extra_dirs.iter().map(String::as_str))
        .collect();

    let mut visited = HashSet::new();
    let mut current = Some(start);

    while let Some(dir) = current {
        if visited.len() >= MAX_VENV_SEARCH_DEPTH || !visited.insert(dir.to_path_buf()) {
            break;
        }

        for name in &names {
            if let Some(python) = interpreter_in(&dir.join(name), platform) {
                log::debug!("Found virtual environment interpreter at '{}'.", python.display());
                return Some(python);
            }
        }

        if dir.join(VENV_MARKER_FILE).is_file()
            && let Some(python) = interpreter_in(dir, platform)
        {
            log::debug!("Directory '{}' is itself a virtual environment.", dir.display());
            return Some(python);
        }

        current = dir.parent();
    }
    None
}

// --- WINDOWS BASH ---

/// The bash found on a Windows search path and its flavor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowsBash {
    pub command: String,
    pub flavor: ShellFlavor,
}

/// Classifies a bash executable by where it is installed.
pub fn classify_bash_path(path: &str) -> ShellFlavor {
    let normalized = path.replace('\\', "/").to_ascii_lowercase();
    let file_name = normalized.rsplit('/').next().unwrap_or_default();

    if normalized.contains("/system32/") && (file_name == "bash.exe" || file_name == "wsl.exe") {
        ShellFlavor::Wsl
    } else if normalized.contains("/git/") && file_name.starts_with("bash") {
        ShellFlavor::GitBash
    } else {
        ShellFlavor::Other
    }
}

/// Looks `bash` up on the search path.
/// When nothing is found the bare command is kept and classified as `Other`.
pub fn locate_windows_bash() -> WindowsBash {
    match which::which("bash") {
        Ok(path) => {
            let command = path.to_string_lossy().into_owned();
            let flavor = classify_bash_path(&command);
            log::debug!("Using bash at '{}' ({}).", command, flavor);
            WindowsBash { command, flavor }
        }
        Err(e) => {
            log::warn!("Could not locate bash on PATH ({}). Falling back to 'bash'.", e);
            WindowsBash {
                command: "bash".to_string(),
                flavor: ShellFlavor::Other,
            }
        }
    }
}

// --- NODE ---

/// Builds the `--import` data URI that registers a custom module resolver,
/// so bare imports inside a temporary script resolve against the working
/// directory.
pub fn node_loader_import(resolver: &Path) -> String {
    let resolver_path = serde_json::to_string(&resolver.to_string_lossy())
        .unwrap_or_else(|_| "\"\"".to_string());
    let snippet = format!(
        "import {{ register }} from \"node:module\";\n\
         import {{ pathToFileURL }} from \"node:url\";\n\
         register(pathToFileURL({}).href, pathToFileURL(\"./\"));\n",
        resolver_path
    );
    format!(
        "data:text/javascript;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(snippet)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_every_language_has_a_row_per_platform() {
        for language in [Language::Bash, Language::PowerShell, Language::Node, Language::Python] {
            for platform in [Platform::Unix, Platform::Windows] {
                let row = spec_for(language, platform);
                assert_eq!(row.language, language);
                assert_eq!(row.platform, platform);
            }
        }
    }

    #[test]
    fn test_argument_builders() {
        let args = ScriptArgs {
            script_path: "/tmp/x/a.ps1".to_string(),
            node_loader: Some("data:text/javascript;base64,AA==".to_string()),
        };
        let ps = spec_for(Language::PowerShell, Platform::Windows);
        assert_eq!(ps.command, CommandSource::Fixed("powershell"));
        assert_eq!((ps.build_args)(&args), vec!["-File", "/tmp/x/a.ps1"]);
        assert_eq!(
            spec_for(Language::PowerShell, Platform::Unix).command,
            CommandSource::Fixed("pwsh")
        );

        let node = spec_for(Language::Node, Platform::Unix);
        assert_eq!(node.extension, "mjs");
        assert_eq!(
            (node.build_args)(&args),
            vec!["--import", "data:text/javascript;base64,AA==", "/tmp/x/a.ps1"]
        );
        let without_loader = ScriptArgs {
            node_loader: None,
            ..args
        };
        assert_eq!((node.build_args)(&without_loader), vec!["/tmp/x/a.ps1"]);
    }

    #[test]
    fn test_classify_bash_path() {
        assert_eq!(classify_bash_path(r"C:\Windows\System32\bash.exe"), ShellFlavor::Wsl);
        assert_eq!(classify_bash_path(r"C:\Windows\system32\wsl.exe"), ShellFlavor::Wsl);
        assert_eq!(
            classify_bash_path(r"C:\Program Files\Git\bin\bash.exe"),
            ShellFlavor::GitBash
        );
        assert_eq!(
            classify_bash_path(r"C:\Program Files\Git\usr\bin\bash.exe"),
            ShellFlavor::GitBash
        );
        assert_eq!(classify_bash_path(r"C:\msys64\usr\bin\bash.exe"), ShellFlavor::Other);
    }

    #[test]
    fn test_finds_nearest_named_venv() {
        let root = tempdir().unwrap();
        let outer = root.path().join(".venv/bin/python");
        let inner = root.path().join("project/venv/bin/python");
        touch(&outer);
        touch(&inner);
        let start = root.path().join("project/src/pkg");
        fs::create_dir_all(&start).unwrap();

        assert_eq!(find_python_venv(&start, Platform::Unix, &[]), Some(inner));
        assert_eq!(
            find_python_venv(&root.path().join("elsewhere"), Platform::Unix, &[]),
            Some(outer)
        );
    }

    #[test]
    fn test_finds_marker_venv_and_extra_names() {
        let root = tempdir().unwrap();
        let env_root = root.path().join("myenv");
        touch(&env_root.join("pyvenv.cfg"));
        touch(&env_root.join("Scripts/python.exe"));
        assert_eq!(
            find_python_venv(&env_root, Platform::Windows, &[]),
            Some(env_root.join("Scripts/python.exe"))
        );

        let custom = root.path().join("proj/.pyenv/bin/python3");
        touch(&custom);
        let start = root.path().join("proj");
        assert_eq!(find_python_venv(&start, Platform::Unix, &[]), None);
        assert_eq!(
            find_python_venv(&start, Platform::Unix, &[".pyenv".to_string()]),
            Some(custom)
        );
    }

    #[test]
    fn test_node_loader_is_a_base64_module() {
        let uri = node_loader_import(Path::new("/opt/resolver.mjs"));
        let encoded = uri.strip_prefix("data:text/javascript;base64,").unwrap();
        let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
        let source = String::from_utf8(decoded).unwrap();
        assert!(source.contains("register(pathToFileURL(\"/opt/resolver.mjs\").href"));
    }
}
