use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

/// Default session lifetime: 24 hours
pub const SESSION_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Per-session state
#[derive(Debug, Clone)]
pub struct Session {
    /// Absolute path of the most recently uploaded file
    pub file_path: PathBuf,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// Session id -> last uploaded file, shared by every handler.
///
/// Entries are refreshed on every upload and vanish once expired.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        SessionStore::new(SESSION_DURATION)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Mint a fresh session id
    pub fn new_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Point a session at a newly uploaded file, replacing any previous one
    pub fn set_file(&self, session_id: &str, path: impl AsRef<Path>) {
        let session = Session {
            file_path: path.as_ref().to_path_buf(),
            expires_at: SystemTime::now() + self.ttl,
        };

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(session_id.to_string(), session);
        log::debug!("session {} now points at {}", session_id, path.as_ref().display());
    }

    /// The file the session last uploaded, unless the session is unknown or expired
    pub fn file_for(&self, session_id: &str) -> Option<PathBuf> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(session_id)
            .filter(|s| s.expires_at > SystemTime::now())
            .map(|s| s.file_path.clone())
    }

    /// Drop expired sessions, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
