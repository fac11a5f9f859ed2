// src/models.rs

use crate::constants::{DEFAULT_TAG, SECRET_NAMESPACE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ModelError {
    #[error("Action name cannot be empty.")]
    EmptyName,
    #[error("Parameter '{name}' is declared more than once in action '{action}'.")]
    DuplicateParameter { action: String, name: String },
    #[error("Environment variable '{key}' is declared more than once in action '{action}'.")]
    DuplicateEnvKey { action: String, key: String },
    #[error("Environment variable '{key}' in action '{action}' has both a value and a secret.")]
    AmbiguousEnvSource { action: String, key: String },
    #[error("Chain link {index} of action '{action}' has an empty target.")]
    EmptyChainTarget { action: String, index: usize },
}

// --- LANGUAGE & PLATFORM ---

/// The interpreter family an action is written for.
///
/// Unknown language names are treated as `bash`, both when parsing and when
/// reading stored actions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(from = "String", into = "String")]
pub enum Language {
    #[default]
    Bash,
    PowerShell,
    Node,
    Python,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::PowerShell => "powershell",
            Self::Node => "node",
            Self::Python => "python",
        }
    }
}

impl From<&str> for Language {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "powershell" | "pwsh" => Self::PowerShell,
            "node" | "javascript" | "js" => Self::Node,
            "python" | "py" => Self::Python,
            _ => Self::Bash,
        }
    }
}

impl From<String> for Language {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.as_str().to_string()
    }
}

impl FromStr for Language {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The host family that decides interpreter names and path rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn host() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Unix
        }
    }

    pub fn line_ending(&self) -> &'static str {
        match self {
            Self::Windows => "\r\n",
            Self::Unix => "\n",
        }
    }
}

/// Which bash-compatible runtime executes a `bash` action.
/// Only the Windows flavors trigger path rewriting.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ShellFlavor {
    Posix,
    Wsl,
    GitBash,
    Other,
}

impl fmt::Display for ShellFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Posix => "posix",
            Self::Wsl => "wsl",
            Self::GitBash => "git-bash",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

// --- ACTION DEFINITION ---

/// One environment entry of an action: either a plain value or a reference
/// to a secret held by the secret store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariable {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub from_secret: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

/// Where the value of an [`EnvironmentVariable`] comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvSource<'a> {
    /// A literal value. `None` means the variable is not set at all.
    Plain(Option<&'a str>),
    /// A secret looked up by this key.
    Secret(String),
}

impl EnvironmentVariable {
    pub fn plain(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            from_secret: false,
            secret_key: None,
        }
    }

    pub fn secret(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            from_secret: true,
            secret_key: None,
        }
    }

    /// Resolves the source of this entry for the given owning action.
    pub fn source(&self, action_id: &str) -> EnvSource<'_> {
        if self.from_secret {
            let key = self
                .secret_key
                .clone()
                .unwrap_or_else(|| secret_key_for(action_id, &self.key));
            EnvSource::Secret(key)
        } else {
            EnvSource::Plain(self.value.as_deref())
        }
    }
}

/// Builds the secret-store key for an environment entry: `<namespace>:<actionId>:<envKey>`.
pub fn secret_key_for(action_id: &str, env_key: &str) -> String {
    format!("{}:{}:{}", SECRET_NAMESPACE, action_id, env_key)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainLink {
    pub target_action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_output_as: Option<String>,
}

/// A stored, user-authored script with its metadata.
///
/// Definitions are value snapshots: editing produces a new definition through
/// [`ActionDefinition::apply_draft`], running never changes one.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub env: Vec<EnvironmentVariable>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_in_output_channel: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<Vec<ChainLink>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActionDefinition {
    /// Checks the per-action invariants: a non-empty name, unique parameter
    /// names, unique env keys and well-formed chain links.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::EmptyName);
        }

        let mut seen = HashSet::new();
        for param in &self.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(ModelError::DuplicateParameter {
                    action: self.name.clone(),
                    name: param.name.clone(),
                });
            }
        }

        let mut seen = HashSet::new();
        for var in &self.env {
            if !seen.insert(var.key.as_str()) {
                return Err(ModelError::DuplicateEnvKey {
                    action: self.name.clone(),
                    key: var.key.clone(),
                });
            }
            if var.from_secret && var.value.as_deref().is_some_and(|v| !v.is_empty()) {
                return Err(ModelError::AmbiguousEnvSource {
                    action: self.name.clone(),
                    key: var.key.clone(),
                });
            }
        }

        for (index, link) in self.chain.iter().flatten().enumerate() {
            if link.target_action_id.trim().is_empty() {
                return Err(ModelError::EmptyChainTarget {
                    action: self.name.clone(),
                    index,
                });
            }
        }
        Ok(())
    }

    /// The tags used for grouping. Untagged actions fall into the default bucket.
    pub fn groups(&self) -> Vec<&str> {
        let tags: Vec<&str> = self
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if tags.is_empty() {
            vec![DEFAULT_TAG]
        } else {
            tags
        }
    }

    pub fn chain_links(&self) -> &[ChainLink] {
        self.chain.as_deref().unwrap_or_default()
    }

    /// Returns an updated copy carrying the draft's fields.
    /// The identity and creation time are preserved.
    pub fn apply_draft(&self, draft: ActionDraft) -> Self {
        let mut updated = draft.into_definition_with(self.id.clone(), self.created_at);
        updated.updated_at = Utc::now().max(self.created_at);
        updated
    }

    pub fn to_draft(&self) -> ActionDraft {
        ActionDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            language: self.language,
            script: self.script.clone(),
            env: self.env.clone(),
            parameters: self.parameters.clone(),
            working_directory: self.working_directory.clone(),
            run_in_output_channel: self.run_in_output_channel,
            chain: self.chain.clone(),
        }
    }
}

/// The editable part of an action, without identity or timestamps.
/// This is the shape accepted by `runbox add`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActionDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub env: Vec<EnvironmentVariable>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub run_in_output_channel: Option<bool>,
    #[serde(default)]
    pub chain: Option<Vec<ChainLink>>,
}

impl ActionDraft {
    /// Creates a brand new definition with a fresh identifier.
    pub fn into_definition(self) -> ActionDefinition {
        self.into_definition_with(Uuid::new_v4().to_string(), Utc::now())
    }

    fn into_definition_with(self, id: String, created_at: DateTime<Utc>) -> ActionDefinition {
        ActionDefinition {
            id,
            name: self.name,
            description: self.description,
            tags: self.tags,
            language: self.language,
            script: self.script,
            env: self.env,
            parameters: self.parameters,
            working_directory: self.working_directory,
            run_in_output_channel: self.run_in_output_channel,
            chain: self.chain,
            created_at,
            updated_at: created_at,
        }
    }
}

// --- EXECUTION MODELS ---

/// Editor and workspace state captured once when a run is triggered.
/// It is shared unchanged by every action of a chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    pub workspace_folders: Vec<PathBuf>,
    pub active_file: Option<PathBuf>,
    pub relative_file: Option<String>,
    pub selected_text: Option<String>,
    pub clipboard: Option<String>,
    /// 1-based cursor line.
    pub line_number: Option<u32>,
    pub explorer_selection: Option<PathBuf>,
}

impl ExecutionContext {
    /// The workspace root the user is focused on.
    ///
    /// The root containing the explorer selection wins over the root of the
    /// active file, which wins over the first workspace folder.
    pub fn focused_workspace_root(&self) -> Option<&PathBuf> {
        let containing = |path: &PathBuf| {
            self.workspace_folders
                .iter()
                .filter(|root| path.starts_with(root))
                .max_by_key(|root| root.as_os_str().len())
        };

        self.explorer_selection
            .as_ref()
            .and_then(containing)
            .or_else(|| self.active_file.as_ref().and_then(containing))
            .or_else(|| self.workspace_folders.first())
    }
}

/// The concrete process to launch for one run.
/// Owned by a single run; its script file is deleted once the process exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub command: String,
    pub args: Vec<String>,
    pub script_path: PathBuf,
    pub shell_flavor: Option<ShellFlavor>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub action_id: String,
    /// `None` when the process was killed or never exited normally.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}
