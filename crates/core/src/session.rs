use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::watch;

use crate::api::{LoginResponse, User};

/// The locally cached proof of authentication. The three parts are always
/// written and cleared together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: User,
}

impl From<LoginResponse> for Session {
    fn from(response: LoginResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            user: response.user,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read session file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write session file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to remove session file at {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stored session is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("session store backend failed: {0}")]
    Backend(String),
}

pub trait SessionStore: Send {
    fn load(&self) -> Result<Option<Session>, SessionError>;
    fn save(&mut self, session: &Session) -> Result<(), SessionError>;
    fn clear(&mut self) -> Result<(), SessionError>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Option<Session>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        Ok(self.session.clone())
    }

    fn save(&mut self, session: &Session) -> Result<(), SessionError> {
        self.session = Some(session.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), SessionError> {
        self.session = None;
        Ok(())
    }
}

/// JSON file holding the whole session, readable by its owner only.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path).map_err(|source| SessionError::Read {
            path: self.path.clone(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Writes through an owner-only temp file in the same directory, then
    /// renames it over the session file.
    fn save(&mut self, session: &Session) -> Result<(), SessionError> {
        let parent_dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent_dir).map_err(|source| SessionError::Write {
            path: parent_dir.to_path_buf(),
            source,
        })?;

        let rendered = serde_json::to_string_pretty(session)?;
        let mut temp_file =
            NamedTempFile::new_in(parent_dir).map_err(|source| SessionError::Write {
                path: parent_dir.to_path_buf(),
                source,
            })?;
        temp_file
            .write_all(rendered.as_bytes())
            .map_err(|source| SessionError::Write {
                path: temp_file.path().to_path_buf(),
                source,
            })?;
        temp_file
            .persist(&self.path)
            .map_err(|error| SessionError::Write {
                path: self.path.clone(),
                source: error.error,
            })?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Shared session handle. Reads come from the last value published on the
/// watch channel, writes go through the store first and are then broadcast
/// to every subscriber.
pub struct SessionContext {
    store: Mutex<Box<dyn SessionStore>>,
    current: watch::Sender<Option<Session>>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    /// Loads whatever the store holds. A malformed stored session is dropped
    /// and cleared instead of failing start-up.
    pub fn load(store: Box<dyn SessionStore>) -> Result<Self, SessionError> {
        let mut store = store;
        let initial = match store.load() {
            Ok(session) => session,
            Err(SessionError::Malformed(error)) => {
                tracing::warn!(%error, "discarding malformed stored session");
                store.clear()?;
                None
            }
            Err(error) => return Err(error),
        };

        let (current, _) = watch::channel(initial);
        Ok(Self {
            store: Mutex::new(store),
            current,
        })
    }

    #[must_use]
    pub fn in_memory() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            store: Mutex::new(Box::new(MemorySessionStore::new())),
            current,
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.current
            .borrow()
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.current
            .borrow()
            .as_ref()
            .map(|session| session.user.clone())
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current
            .borrow()
            .as_ref()
            .is_some_and(|session| !session.access_token.is_empty())
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }

    pub fn store_session(&self, session: Session) -> Result<(), SessionError> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .save(&session)?;
        self.current.send_replace(Some(session));
        Ok(())
    }

    /// Clears the stored trio. Subscribers see `None` even when the store
    /// fails.
    pub fn clear(&self) -> Result<(), SessionError> {
        let result = self
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.current.send_replace(None);
        result
    }
}
