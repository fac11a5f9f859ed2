// src/core/settings.rs

use crate::core::paths::{self, PathError};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Path error: {0}")]
    Path(#[from] PathError),
    #[error("Failed to parse config.toml: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize settings to TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// User settings stored in `config.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Where actions without an explicit preference send their output:
    /// `true` captures it into the output sink, `false` attaches a terminal.
    pub run_in_output_channel: bool,
    /// Extra directory names probed for Python virtual environments.
    pub venv_dirs: Vec<String>,
    /// Module resolver registered into every Node action.
    pub node_resolver: Option<PathBuf>,
    /// Name shown in the banner printed once when captured output is first shown.
    pub output_channel_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            run_in_output_channel: true,
            venv_dirs: Vec::new(),
            node_resolver: None,
            output_channel_name: "runbox".to_string(),
        }
    }
}

/// Loads `config.toml` from the config directory, writing the defaults on first use.
pub fn load_settings() -> Result<Settings, SettingsError> {
    load_settings_from(&paths::get_settings_path()?)
}

pub fn load_settings_from(path: &Path) -> Result<Settings, SettingsError> {
    if !path.exists() {
        let defaults = Settings::default();
        let toml_string = toml::to_string_pretty(&defaults)?;
        fs::write(path, toml_string)?;
        log::debug!("Default settings written to '{}'.", path.display());
        Ok(defaults)
    } else {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_first_load_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
        assert_eq!(load_settings_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_missing_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "run_in_output_channel = false\nvenv_dirs = [\".pyenv\"]\n").unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert!(!settings.run_in_output_channel);
        assert_eq!(settings.venv_dirs, vec![".pyenv".to_string()]);
        assert_eq!(settings.output_channel_name, "runbox");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "run_in_terminal = true\n").unwrap();
        assert!(matches!(
            load_settings_from(&path),
            Err(SettingsError::TomlParse(_))
        ));
    }
}
