//! Client-local state: who is logged in and the budget each user declared.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Amount;
use crate::transactions::UserId;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("unable to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not a valid state file: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub trait LocalStorage: Send + Sync {
    fn session(&self) -> Result<Option<UserId>, StorageError>;
    fn set_session(&self, user: Option<UserId>) -> Result<(), StorageError>;
    fn budget(&self, user: UserId) -> Result<Option<Amount>, StorageError>;
    fn set_budget(&self, user: UserId, budget: Amount) -> Result<(), StorageError>;
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct LocalState {
    #[serde(default)]
    session: Option<UserId>,
    #[serde(default)]
    budgets: BTreeMap<UserId, Amount>,
}

#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<LocalState>,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }

    fn state(&self) -> MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalStorage for MemoryStorage {
    fn session(&self) -> Result<Option<UserId>, StorageError> {
        Ok(self.state().session)
    }
    fn set_session(&self, user: Option<UserId>) -> Result<(), StorageError> {
        self.state().session = user;
        Ok(())
    }
    fn budget(&self, user: UserId) -> Result<Option<Amount>, StorageError> {
        Ok(self.state().budgets.get(&user).copied())
    }
    fn set_budget(&self, user: UserId, budget: Amount) -> Result<(), StorageError> {
        self.state().budgets.insert(user, budget);
        Ok(())
    }
}

/// JSON document on disk. Every write replaces the file atomically.
pub struct FileStorage {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> FileStorage {
        FileStorage {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read(&self) -> Result<LocalState, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(LocalState::default()),
            Err(err) => return Err(self.io_error(err)),
        };
        serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, state: &LocalState) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(state).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content).map_err(|err| self.io_error(err))?;
        fs::rename(&tmp, &self.path).map_err(|err| self.io_error(err))
    }

    fn modify(&self, change: impl FnOnce(&mut LocalState)) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.read()?;
        change(&mut state);
        self.write(&state)
    }
}

impl LocalStorage for FileStorage {
    fn session(&self) -> Result<Option<UserId>, StorageError> {
        Ok(self.read()?.session)
    }
    fn set_session(&self, user: Option<UserId>) -> Result<(), StorageError> {
        self.modify(|state| state.session = user)
    }
    fn budget(&self, user: UserId) -> Result<Option<Amount>, StorageError> {
        Ok(self.read()?.budgets.get(&user).copied())
    }
    fn set_budget(&self, user: UserId, budget: Amount) -> Result<(), StorageError> {
        self.modify(|state| {
            state.budgets.insert(user, budget);
        })
    }
}
