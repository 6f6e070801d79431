//! Service adapter wiring sessions into the request lifecycle.

use crate::config::SessionConfig;
use crate::session::{RequestSessionExt, Session, SessionHandle};
use crate::store::{MemorySessionStore, SessionStore};
use mabs_core::logging::{debug, trace};
use mabs_core::{
    Container, Cookie, EventBus, EventPayload, Events, HttpRequest, HttpResponse, Result,
    ServiceAdapter,
};
use std::sync::Arc;

/// Container key of the [`SessionConfig`].
pub const CONFIG_SERVICE: &str = "session.config";
/// Container key of the cookie name (`String`).
pub const COOKIE_NAME_SERVICE: &str = "session.cookie_name";
/// Container key of the store, an `Arc<dyn SessionStore>`.
pub const STORE_SERVICE: &str = "session.store";

/// Priority of both session listeners; runs ahead of default-priority listeners.
pub const SESSION_PRIORITY: i32 = 128;

/// Attaches a session to every request and persists it when the response is
/// about to be sent.
///
/// Without an explicit store, an in-memory one is registered as a factory and
/// built on the first request.
pub struct SessionAdapter {
    config: SessionConfig,
    store: Option<Arc<dyn SessionStore>>,
}

impl SessionAdapter {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            config,
            store: None,
        }
    }

    /// Use `store` instead of the in-memory default.
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }
}

impl Default for SessionAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceAdapter for SessionAdapter {
    fn name(&self) -> &str {
        "session"
    }

    fn load(&self, container: &Container) -> Result<()> {
        container.set(CONFIG_SERVICE, self.config.clone())?;
        container.set(COOKIE_NAME_SERVICE, self.config.cookie_name.clone())?;

        match &self.store {
            Some(store) => container.set(STORE_SERVICE, Arc::clone(store))?,
            None => container.set_factory(STORE_SERVICE, |_| {
                debug!("Creating in-memory session store");
                let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
                Ok(store)
            })?,
        }
        Ok(())
    }

    fn boot(&self, _container: &Container, events: &EventBus) -> Result<()> {
        events
            .register(Events::HANDLE_REQUEST, SESSION_PRIORITY, |container, payload| {
                match payload.request_mut() {
                    Some(request) => start_session(container, request),
                    None => Ok(()),
                }
            })
            .register(Events::ON_TERMINATE, SESSION_PRIORITY, |container, payload| {
                match payload {
                    EventPayload::Exchange { request, response } => {
                        persist_session(container, *request, &mut **response)
                    }
                    _ => Ok(()),
                }
            });
        Ok(())
    }
}

fn start_session(container: &Container, request: &mut HttpRequest) -> Result<()> {
    let config = container.get_as::<SessionConfig>(CONFIG_SERVICE)?;
    let store = container.get_as::<Arc<dyn SessionStore>>(STORE_SERVICE)?;

    let existing = match request.cookie(&config.cookie_name) {
        Some(id) => store.load(id)?,
        None => None,
    };

    let handle = match existing {
        Some(mut session) => {
            trace!(session_id = %session.id, "Resuming session");
            session.touch();
            SessionHandle::existing(session)
        }
        None => {
            let session = Session::generate(config.ttl);
            trace!(session_id = %session.id, "Starting new session");
            SessionHandle::fresh(session)
        }
    };

    request.extensions.insert(handle);
    Ok(())
}

fn persist_session(
    container: &Container,
    request: &HttpRequest,
    response: &mut HttpResponse,
) -> Result<()> {
    let Some(handle) = request.session() else {
        return Ok(());
    };
    let config = container.get_as::<SessionConfig>(CONFIG_SERVICE)?;
    let store = container.get_as::<Arc<dyn SessionStore>>(STORE_SERVICE)?;

    if handle.is_destroyed() {
        store.destroy(&handle.id())?;
        if !handle.is_new() {
            response.add_cookie(
                Cookie::new(config.cookie_name.clone(), "")
                    .path(config.cookie_path.clone())
                    .max_age(0),
            );
        }
        return Ok(());
    }

    // A new session is only stored once something was written to it.
    if !handle.read().is_dirty() {
        return Ok(());
    }

    let session_id = {
        let mut session = handle.write();
        store.save(&session)?;
        session.mark_clean();
        session.id.clone()
    };
    debug!(session_id = %session_id, "Session persisted");

    response.add_cookie(
        Cookie::new(config.cookie_name.clone(), session_id)
            .path(config.cookie_path.clone())
            .max_age(config.ttl.as_secs())
            .http_only(config.http_only)
            .secure(config.secure),
    );
    Ok(())
}
