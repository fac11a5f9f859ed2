// src/core/store.rs

use crate::core::paths::{self, PathError};
use crate::models::{ActionDefinition, ModelError};
use std::collections::{BTreeMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::fs;
use thiserror::Error;

/// Represents errors that can occur while reading or writing stored actions.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Path error: {0}")]
    Path(#[from] PathError),
    #[error("Failed to read actions file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize actions: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Invalid action: {0}")]
    Invalid(#[from] ModelError),
    #[error("Action id '{id}' is used by more than one action.")]
    DuplicateId { id: String },
    #[error("Action '{query}' not found.")]
    NotFound { query: String },
    #[error("'{query}' matches several actions ({}). Use the action id instead.", .ids.join(", "))]
    Ambiguous { query: String, ids: Vec<String> },
}

type StoreResult<T> = Result<T, StoreError>;

/// Read-only lookup of action definitions by id.
pub trait ActionLookup {
    fn find_by_id(&self, id: &str) -> Option<ActionDefinition>;
}

impl ActionLookup for [ActionDefinition] {
    fn find_by_id(&self, id: &str) -> Option<ActionDefinition> {
        self.iter().find(|a| a.id == id).cloned()
    }
}

impl ActionLookup for Vec<ActionDefinition> {
    fn find_by_id(&self, id: &str) -> Option<ActionDefinition> {
        self.as_slice().find_by_id(id)
    }
}

/// A JSON file holding the list of action definitions.
///
/// Every write replaces the whole file. The store owns no business logic
/// beyond keeping ids unique and definitions valid.
#[derive(Debug, Clone)]
pub struct ActionStore {
    path: PathBuf,
}

impl ActionStore {
    /// Opens the store in the runbox config directory.
    pub fn open_default() -> StoreResult<Self> {
        Ok(Self::open(paths::get_actions_path()?))
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every stored definition. A missing file is an empty store.
    pub fn load_all(&self) -> StoreResult<Vec<ActionDefinition>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Inserts or replaces (by id) one definition.
    pub fn save(&self, action: ActionDefinition) -> StoreResult<()> {
        action.validate()?;
        let mut actions = self.load_all()?;
        match actions.iter_mut().find(|a| a.id == action.id) {
            Some(existing) => *existing = action,
            None => actions.push(action),
        }
        self.overwrite_all(&actions)
    }

    /// Removes a definition. Returns whether anything was removed.
    pub fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut actions = self.load_all()?;
        let before = actions.len();
        actions.retain(|a| a.id != id);
        if actions.len() == before {
            return Ok(false);
        }
        self.overwrite_all(&actions)?;
        Ok(true)
    }

    /// Replaces the whole store.
    pub fn overwrite_all(&self, actions: &[ActionDefinition]) -> StoreResult<()> {
        let mut ids = HashSet::new();
        for action in actions {
            action.validate()?;
            if !ids.insert(action.id.as_str()) {
                return Err(StoreError::DuplicateId {
                    id: action.id.clone(),
                });
            }
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(actions).map_err(StoreError::Serialize)?;
        fs::write(&self.path, json)?;
        log::debug!("Saved {} action(s) to '{}'.", actions.len(), self.path.display());
        Ok(())
    }

    /// Finds an action by exact id, or else by case-insensitive name.
    pub fn find(&self, query: &str) -> StoreResult<ActionDefinition> {
        find_in(&self.load_all()?, query)
    }
}

impl ActionLookup for ActionStore {
    fn find_by_id(&self, id: &str) -> Option<ActionDefinition> {
        match self.load_all() {
            Ok(actions) => actions.find_by_id(id),
            Err(e) => {
                log::warn!("Could not read the action store: {}", e);
                None
            }
        }
    }
}

/// Finds an action by exact id, or else by case-insensitive name.
/// Several actions sharing the name is an error.
pub fn find_in(actions: &[ActionDefinition], query: &str) -> StoreResult<ActionDefinition> {
    if let Some(action) = actions.find_by_id(query) {
        return Ok(action);
    }
    let matches: Vec<&ActionDefinition> = actions
        .iter()
        .filter(|a| a.name.eq_ignore_ascii_case(query.trim()))
        .collect();
    match matches.as_slice() {
        [] => Err(StoreError::NotFound {
            query: query.to_string(),
        }),
        [single] => Ok((*single).clone()),
        many => Err(StoreError::Ambiguous {
            query: query.to_string(),
            ids: many.iter().map(|a| a.id.clone()).collect(),
        }),
    }
}

/// Groups actions by tag, sorted by tag and then by name.
/// An action with several tags appears in each of its groups.
pub fn group_by_tag(actions: &[ActionDefinition]) -> BTreeMap<String, Vec<&ActionDefinition>> {
    let mut groups: BTreeMap<String, Vec<&ActionDefinition>> = BTreeMap::new();
    for action in actions {
        for tag in action.groups() {
            groups.entry(tag.to_string()).or_default().push(action);
        }
    }
    for members in groups.values_mut() {
        members.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    }
    groups
}
