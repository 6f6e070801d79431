//! Session store trait and the in-memory backend.

use crate::error::SessionResult;
use crate::session::Session;
use mabs_core::logging::{debug, trace};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Storage backend for sessions.
///
/// Called synchronously from lifecycle listeners; implementations must be
/// safe to share across connections.
pub trait SessionStore: Send + Sync {
    /// Get a session by ID.
    ///
    /// Returns `Ok(None)` if not found or expired.
    fn load(&self, session_id: &str) -> SessionResult<Option<Session>>;

    /// Save or replace a session.
    fn save(&self, session: &Session) -> SessionResult<()>;

    /// Delete a session. Deleting an unknown ID is not an error.
    fn destroy(&self, session_id: &str) -> SessionResult<()>;

    /// Number of stored sessions.
    fn count(&self) -> SessionResult<usize>;

    /// Remove expired sessions, returning how many were dropped.
    fn cleanup_expired(&self) -> SessionResult<usize>;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, session_id: &str) -> SessionResult<Option<Session>> {
        let session = self.sessions.read().get(session_id).cloned();
        match session {
            Some(session) if session.is_expired() => {
                debug!(session_id, "Session expired, dropping");
                self.sessions.write().remove(session_id);
                Ok(None)
            }
            found => {
                trace!(session_id, found = found.is_some(), "Session lookup");
                Ok(found)
            }
        }
    }

    fn save(&self, session: &Session) -> SessionResult<()> {
        let mut stored = session.clone();
        stored.mark_clean();
        self.sessions.write().insert(session.id.clone(), stored);
        trace!(session_id = %session.id, "Session saved");
        Ok(())
    }

    fn destroy(&self, session_id: &str) -> SessionResult<()> {
        if self.sessions.write().remove(session_id).is_some() {
            debug!(session_id, "Session destroyed");
        }
        Ok(())
    }

    fn count(&self) -> SessionResult<usize> {
        Ok(self.sessions.read().len())
    }

    fn cleanup_expired(&self) -> SessionResult<usize> {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        Ok(before - sessions.len())
    }
}
