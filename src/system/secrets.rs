// src/system/secrets.rs

use crate::core::paths::{self, PathError};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Path error: {0}")]
    Path(#[from] PathError),
    #[error("Failed to decode secrets file: {0}")]
    BincodeDecode(#[from] bincode::error::DecodeError),
    #[error("Failed to encode secrets file: {0}")]
    BincodeEncode(#[from] bincode::error::EncodeError),
}

/// Key/value vault for secret environment values.
/// Keys are opaque strings of the form `runbox:<actionId>:<envKey>`.
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SecretError>;
    fn store(&self, key: &str, value: &str) -> Result<(), SecretError>;
    fn delete(&self, key: &str) -> Result<(), SecretError>;
}

/// Secrets kept in a binary file readable only by its owner.
#[derive(Debug)]
pub struct FileSecretStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSecretStore {
    pub fn open_default() -> Result<Self, SecretError> {
        Ok(Self::open(paths::get_secrets_path()?))
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<HashMap<String, String>, SecretError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };
        let (secrets, _): (HashMap<String, String>, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
        Ok(secrets)
    }

    fn write_all(&self, secrets: &HashMap<String, String>) -> Result<(), SecretError> {
        let bytes = bincode::serde::encode_to_vec(secrets, bincode::config::standard())?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, bytes)?;
        restrict_to_owner(&self.path)?;
        Ok(())
    }

    fn with_lock<T>(&self, f: impl FnOnce() -> Result<T, SecretError>) -> Result<T, SecretError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        f()
    }
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl SecretStore for FileSecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
        self.with_lock(|| Ok(self.read_all()?.get(key).cloned()))
    }

    fn store(&self, key: &str, value: &str) -> Result<(), SecretError> {
        self.with_lock(|| {
            let mut secrets = self.read_all()?;
            secrets.insert(key.to_string(), value.to_string());
            self.write_all(&secrets)
        })
    }

    fn delete(&self, key: &str) -> Result<(), SecretError> {
        self.with_lock(|| {
            let mut secrets = self.read_all()?;
            if secrets.remove(key).is_some() {
                self.write_all(&secrets)?;
            }
            Ok(())
        })
    }
}

/// Process-local secrets, used by embedders that bring their own vault and by tests.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.into(), value.into());
        self
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
        Ok(self
            .secrets
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), SecretError> {
        self.secrets
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), SecretError> {
        self.secrets
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_round_trip_and_delete() {
        let dir = tempdir().unwrap();
        let store = FileSecretStore::open(dir.path().join("secrets.bin"));
        assert_eq!(store.get("runbox:a:TOKEN").unwrap(), None);

        store.store("runbox:a:TOKEN", "s3cr3t").unwrap();
        store.store("runbox:a:EMPTY", "").unwrap();
        assert_eq!(store.get("runbox:a:TOKEN").unwrap().as_deref(), Some("s3cr3t"));
        assert_eq!(store.get("runbox:a:EMPTY").unwrap().as_deref(), Some(""));

        store.delete("runbox:a:TOKEN").unwrap();
        store.delete("runbox:a:TOKEN").unwrap();
        assert_eq!(store.get("runbox:a:TOKEN").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let path = dir.path().join("secrets.bin");
        FileSecretStore::open(&path).store("k", "v").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
