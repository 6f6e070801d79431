//! Session data and the request-scoped handle.

use crate::error::{SessionError, SessionResult};
use chrono::{DateTime, Utc};
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Session data structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub data: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Changed since it was loaded or created.
    #[serde(skip)]
    dirty: bool,
}

impl Session {
    /// Create a new session with the given ID and TTL.
    pub fn new(id: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            data: HashMap::new(),
            created_at: now,
            last_accessed_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
            dirty: false,
        }
    }

    /// Create a session with a random v4 UUID as its ID.
    pub fn generate(ttl: Duration) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), ttl)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Get a value from the session data.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set a value in the session data.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> SessionResult<()> {
        let json_value =
            serde_json::to_value(value).map_err(|e| SessionError::Serialization(e.to_string()))?;
        self.data.insert(key.to_string(), json_value);
        self.dirty = true;
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        let removed = self.data.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> Vec<&String> {
        self.data.keys().collect()
    }

    pub fn clear(&mut self) {
        if !self.data.is_empty() {
            self.data.clear();
            self.dirty = true;
        }
    }

    /// Update the last accessed timestamp.
    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }

    /// Push the expiration `ttl` into the future.
    pub fn extend(&mut self, ttl: Duration) {
        self.expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

#[derive(Debug)]
struct HandleState {
    session: Session,
    is_new: bool,
    destroyed: bool,
}

/// Shared handle to the session of the current request.
///
/// Stored in the request extensions by the session adapter; handlers reach
/// it through [`RequestSessionExt::session`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<RwLock<HandleState>>,
}

impl SessionHandle {
    /// Wrap a session loaded from the store.
    pub fn existing(session: Session) -> Self {
        Self::wrap(session, false)
    }

    /// Wrap a session that has never been persisted.
    pub fn fresh(session: Session) -> Self {
        Self::wrap(session, true)
    }

    fn wrap(session: Session, is_new: bool) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HandleState {
                session,
                is_new,
                destroyed: false,
            })),
        }
    }

    pub fn id(&self) -> String {
        self.inner.read().session.id.clone()
    }

    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.inner.read().session.get(key)
    }

    pub fn set<T: Serialize>(&self, key: &str, value: T) -> SessionResult<()> {
        self.inner.write().session.set(key, value)
    }

    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.write().session.remove(key)
    }

    /// Drop the session at the end of the request and expire its cookie.
    pub fn destroy(&self) {
        self.inner.write().destroyed = true;
    }

    pub fn is_new(&self) -> bool {
        self.inner.read().is_new
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.read().destroyed
    }

    pub fn read(&self) -> MappedRwLockReadGuard<'_, Session> {
        RwLockReadGuard::map(self.inner.read(), |state| &state.session)
    }

    pub fn write(&self) -> MappedRwLockWriteGuard<'_, Session> {
        RwLockWriteGuard::map(self.inner.write(), |state| &mut state.session)
    }
}

/// Session access on [`mabs_core::HttpRequest`].
pub trait RequestSessionExt {
    fn session(&self) -> Option<&SessionHandle>;
}

impl RequestSessionExt for mabs_core::HttpRequest {
    fn session(&self) -> Option<&SessionHandle> {
        self.extensions.get::<SessionHandle>()
    }
}
