// src/constants.rs

/// Environment marker carrying the id of the running action.
pub const ACTION_ID_ENV: &str = "RUNBOX_ACTION_ID";

/// Environment marker carrying the resolved working directory.
pub const WORKING_DIRECTORY_ENV: &str = "RUNBOX_WORKING_DIRECTORY";

/// Prefix of the per-parameter environment variables.
pub const PARAM_ENV_PREFIX: &str = "PARAM_";

/// First segment of every secret-store key.
pub const SECRET_NAMESPACE: &str = "runbox";

/// Group used for actions without tags.
pub const DEFAULT_TAG: &str = "General";

/// Environment variable that relocates the configuration directory.
pub const HOME_OVERRIDE_ENV: &str = "RUNBOX_HOME";

/// The name of the settings file (in ~/.config/runbox/).
pub const SETTINGS_FILENAME: &str = "config.toml";

/// The name of the action store file (in ~/.config/runbox/).
pub const ACTIONS_FILENAME: &str = "actions.json";

/// The name of the secret store file (in ~/.config/runbox/).
pub const SECRETS_FILENAME: &str = "secrets.bin";

/// Prefix of the private per-run temporary directories.
pub const TEMP_DIR_PREFIX: &str = "runbox-";

/// Directory names probed for a Python virtual environment, nearest first.
pub const VENV_DIR_NAMES: &[&str] = &[".venv", "venv", "env", ".env", "virtualenv", ".virtualenv"];

/// Marker file written at the root of every Python virtual environment.
pub const VENV_MARKER_FILE: &str = "pyvenv.cfg";

/// Upper bound on the number of ancestors inspected during venv discovery.
pub const MAX_VENV_SEARCH_DEPTH: usize = 64;
