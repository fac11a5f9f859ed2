// src/core/paths.rs

use crate::{
    constants::{ACTIONS_FILENAME, HOME_OVERRIDE_ENV, SECRETS_FILENAME, SETTINGS_FILENAME},
    models::{ExecutionContext, ShellFlavor},
};
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

lazy_static! {
    static ref RUNBOX_CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
    static ref DRIVE_PATH_RE: Regex = Regex::new(r"^([A-Za-z]):[\\/]").unwrap();
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Could not create config directory at '{path}': {source}")]
    ConfigDirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Returns the path to the runbox configuration directory (`~/.config/runbox`).
/// `RUNBOX_HOME` relocates it. Creates it if it doesn't exist.
///
/// The first call computes and caches the path; later calls return the cached value.
pub fn get_config_dir() -> Result<PathBuf, PathError> {
    let mut cached_path_guard = RUNBOX_CONFIG_DIR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(path) = &*cached_path_guard {
        return Ok(path.clone());
    }

    let config_path = match std::env::var_os(HOME_OVERRIDE_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::config_dir()
            .ok_or(PathError::ConfigDirNotFound)?
            .join("runbox"),
    };

    if !config_path.exists() {
        fs::create_dir_all(&config_path).map_err(|e| PathError::ConfigDirCreation {
            path: config_path.display().to_string(),
            source: e,
        })?;
    }

    *cached_path_guard = Some(config_path.clone());
    Ok(config_path)
}

pub fn get_settings_path() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(SETTINGS_FILENAME))
}

pub fn get_actions_path() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(ACTIONS_FILENAME))
}

pub fn get_secrets_path() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(SECRETS_FILENAME))
}

/// Resolves the directory an action runs in.
///
/// An absolute configured directory is used as is. A relative one is joined
/// to the focused workspace root, or to `home` when there is no workspace.
/// Without configuration the workspace root (or `home`) is used.
/// `~` and environment variables in the configured value are expanded first.
pub fn resolve_working_directory(
    configured: Option<&str>,
    context: &ExecutionContext,
    home: Option<&Path>,
) -> PathBuf {
    let base = context
        .focused_workspace_root()
        .cloned()
        .or_else(|| home.map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    let configured = configured.map(str::trim).filter(|c| !c.is_empty());
    let Some(raw) = configured else {
        return base;
    };

    let expanded = match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(e) => {
            log::warn!("Could not expand working directory '{}': {}", raw, e);
            PathBuf::from(raw)
        }
    };

    let resolved = if expanded.is_absolute() || is_drive_path(&expanded.to_string_lossy()) {
        expanded
    } else {
        base.join(expanded)
    };
    dunce::simplified(&resolved).to_path_buf()
}

/// Whether `value` starts with a Windows drive prefix (`C:\` or `C:/`).
pub fn is_drive_path(value: &str) -> bool {
    DRIVE_PATH_RE.is_match(value)
}

/// Rewrites a Windows path so the given bash flavor understands it.
///
/// Only values that start with a drive prefix and contain no `;` are touched,
/// so `PATH`-like lists pass through. Under WSL `C:\Users\x` becomes
/// `/mnt/c/Users/x`; every other Windows flavor gets forward slashes.
/// `None` and `Posix` never rewrite.
pub fn normalize_for_flavor(value: &str, flavor: Option<ShellFlavor>) -> String {
    let Some(flavor) = flavor else {
        return value.to_string();
    };
    if flavor == ShellFlavor::Posix || value.contains(';') {
        return value.to_string();
    }
    let Some(caps) = DRIVE_PATH_RE.captures(value) else {
        return value.to_string();
    };

    let forward = value.replace('\\', "/");
    match flavor {
        ShellFlavor::Wsl => {
            let drive = caps
                .get(1)
                .map(|m| m.as_str().to_ascii_lowercase())
                .unwrap_or_default();
            // Skip "X:" and keep the leading slash of the remainder.
            let rest = forward.get(2..).unwrap_or_default();
            format!("/mnt/{}{}", drive, rest)
        }
        _ => forward,
    }
}

/// Converts every line ending of `text` to the host convention.
pub fn normalize_line_endings(text: &str, line_ending: &str) -> String {
    let unix = text.replace("\r\n", "\n");
    if line_ending == "\n" {
        unix
    } else {
        unix.replace('\n', line_ending)
    }
}
