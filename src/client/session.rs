//! Durable client-side storage of the session token and display name.
use std::{
    fs,
    io::Write,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{NotesError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub token: String,
    pub user: String,
}

pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<PersistedSession>>;
    fn save(&self, session: &PersistedSession) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Session kept in a JSON file, surviving restarts of the client.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for FileSessionStore {
    /// A missing or unreadable file means "logged out".
    fn load(&self) -> Result<Option<PersistedSession>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(
                    "Ignoring unreadable session file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        fs::create_dir_all(&dir).map_err(|e| {
            error!("Failed to create session directory {}: {}", dir.display(), e);
            NotesError::DirectoryError { path: dir.clone() }
        })?;

        // temp files are created owner-only, so the token never sits in a
        // world-readable file
        let mut temp_file = NamedTempFile::new_in(&dir)?;
        temp_file.write_all(serde_json::to_string_pretty(session)?.as_bytes())?;
        temp_file.flush()?;
        temp_file
            .persist(&self.path)
            .map_err(|e| NotesError::Io(e.error))?;

        debug!("Session saved to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(NotesError::Io(e)),
        }
    }
}

/// Session held in memory only. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    slot: Arc<Mutex<Option<PersistedSession>>>,
}

impl MemorySessionStore {
    pub fn new(initial: Option<PersistedSession>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(initial)),
        }
    }

    fn with_slot<T>(&self, f: impl FnOnce(&mut Option<PersistedSession>) -> T) -> Result<T> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| NotesError::LockAcquisitionFailed {
                message: "Failed to acquire lock on session slot".to_string(),
            })?;
        Ok(f(&mut slot))
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<PersistedSession>> {
        self.with_slot(|slot| slot.clone())
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        self.with_slot(|slot| *slot = Some(session.clone()))
    }

    fn clear(&self) -> Result<()> {
        self.with_slot(|slot| *slot = None)
    }
}
