//! The single persisted slot holding the raw credential.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::errors::ClientError;

/// Where the raw credential survives between runs.
/// Only one value is ever stored and it is replaced wholesale.
pub trait CredentialStore: fmt::Debug {
    fn load(&self) -> Result<Option<String>, ClientError>;
    fn save(&mut self, token: &str) -> Result<(), ClientError>;
    fn clear(&mut self) -> Result<(), ClientError>;
}

/// Keeps the credential for the lifetime of the process only.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    token: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        Ok(self.token.clone())
    }

    fn save(&mut self, token: &str) -> Result<(), ClientError> {
        self.token = Some(token.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ClientError> {
        self.token = None;
        Ok(())
    }
}

/// Stores the credential in a single file. A missing file means no credential.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ClientError::Storage(err.to_string())),
        }
    }

    fn save(&mut self, token: &str) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ClientError::Storage(e.to_string()))?;
        }

        fs::write(&self.path, token).map_err(|e| ClientError::Storage(e.to_string()))
    }

    fn clear(&mut self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ClientError::Storage(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    #[test]
    fn memory_slot_is_replaced_wholesale() -> TestResult {
        let mut store = MemoryStore::with_token("old");

        store.save("new")?;
        assert_eq!(store.load()?.as_deref(), Some("new"));

        store.clear()?;
        assert_eq!(store.load()?, None);
        Ok(())
    }

    #[test]
    fn file_slot_lifecycle() -> TestResult {
        let dir = tempfile::tempdir()?;
        let mut store = FileStore::new(dir.path().join("nested").join("token"));

        assert_eq!(store.load()?, None);

        store.save("abc.def.ghi")?;
        assert_eq!(store.load()?.as_deref(), Some("abc.def.ghi"));

        store.clear()?;
        store.clear()?;
        assert_eq!(store.load()?, None);
        Ok(())
    }
}
