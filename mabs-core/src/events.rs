//! Priority-ordered event bus and the lifecycle event names.
//!
//! Listeners are registered against a named channel with an integer
//! priority. [`EventBus::dispatch`] calls them from the highest priority to
//! the lowest; listeners sharing a priority run in registration order.
//!
//! Dispatch is fire-and-forget: listener return values are discarded, and
//! the first listener error stops the channel and is returned to the caller.
//!
//! ```
//! use mabs_core::{Container, EventBus, EventPayload};
//! use std::sync::{Arc, Mutex};
//!
//! let bus = EventBus::new(Container::new());
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let low = seen.clone();
//! let high = seen.clone();
//! bus.register("greet", 0, move |_, _| {
//!     low.lock().unwrap().push("low");
//!     Ok(())
//! })
//! .register("greet", 10, move |_, _| {
//!     high.lock().unwrap().push("high");
//!     Ok(())
//! });
//!
//! bus.dispatch("greet", EventPayload::None).unwrap();
//! assert_eq!(*seen.lock().unwrap(), vec!["high", "low"]);
//! ```

use crate::logging::{debug, trace, warn};
use crate::{Container, Error, HttpRequest, HttpResponse, Result};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle event names.
///
/// Adapters subscribe by exact name; renaming any of these breaks them.
pub struct Events;

impl Events {
    pub const BEFORE_LOAD: &'static str = "mabs.before.load";
    pub const ON_LOCKED: &'static str = "mabs.on.locked";
    pub const ON_BOOT: &'static str = "mabs.on.boot";
    pub const HANDLE_REQUEST: &'static str = "mabs.handle.request";
    pub const HANDLE_EXCEPTION: &'static str = "mabs.handle.exception";
    pub const ON_TERMINATE: &'static str = "mabs.on.terminate";
    pub const ON_FINISH: &'static str = "mabs.on.finish";

    /// All lifecycle events, in declaration order.
    pub const ALL: [&'static str; 7] = [
        Self::BEFORE_LOAD,
        Self::ON_LOCKED,
        Self::ON_BOOT,
        Self::HANDLE_REQUEST,
        Self::HANDLE_EXCEPTION,
        Self::ON_TERMINATE,
        Self::ON_FINISH,
    ];
}

/// Data handed to listeners alongside the container.
pub enum EventPayload<'a> {
    None,
    /// The incoming request, before routing.
    Request(&'a mut HttpRequest),
    /// A request and the response produced for it.
    Exchange {
        request: &'a HttpRequest,
        response: &'a mut HttpResponse,
    },
    /// The error that aborted request handling.
    Error(&'a Error),
    Custom(&'a (dyn Any + Send + Sync)),
}

impl<'a> EventPayload<'a> {
    pub fn request(&self) -> Option<&HttpRequest> {
        match self {
            EventPayload::Request(request) => Some(&**request),
            EventPayload::Exchange { request, .. } => Some(*request),
            _ => None,
        }
    }

    pub fn request_mut(&mut self) -> Option<&mut HttpRequest> {
        match self {
            EventPayload::Request(request) => Some(&mut **request),
            _ => None,
        }
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            EventPayload::Exchange { response, .. } => Some(&**response),
            _ => None,
        }
    }

    pub fn response_mut(&mut self) -> Option<&mut HttpResponse> {
        match self {
            EventPayload::Exchange { response, .. } => Some(&mut **response),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            EventPayload::Error(error) => Some(*error),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            EventPayload::Custom(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }
}

/// A listener callback.
pub type ListenerFn = Arc<dyn Fn(&Container, &mut EventPayload<'_>) -> Result<()> + Send + Sync>;

#[derive(Clone)]
struct Listener {
    callback: ListenerFn,
    priority: i32,
    sequence: u64,
}

/// Introspection record for a registered listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerInfo {
    pub event: String,
    pub priority: i32,
    /// Global registration sequence number.
    pub sequence: u64,
}

/// Named-channel event bus.
///
/// Cloning yields another handle to the same channels.
#[derive(Clone)]
pub struct EventBus {
    container: Container,
    channels: Arc<RwLock<HashMap<String, Vec<Listener>>>>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a bus whose listeners receive `container` as their read context.
    pub fn new(container: Container) -> Self {
        Self {
            container,
            channels: Arc::new(RwLock::new(HashMap::new())),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Add a listener to `event`. Higher priorities run first.
    pub fn register<F>(&self, event: &str, priority: i32, callback: F) -> &Self
    where
        F: Fn(&Container, &mut EventPayload<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let event = event.trim();
        let listener = Listener {
            callback: Arc::new(callback),
            priority,
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
        };

        let mut channels = self.channels.write();
        let channel = channels.entry(event.to_string()).or_default();
        channel.push(listener);
        if channel.len() > 1 {
            // Vec::sort_by is stable, equal priorities keep registration order.
            channel.sort_by(|a, b| b.priority.cmp(&a.priority));
        }

        debug!(event, priority, listener_count = channel.len(), "Listener registered");
        self
    }

    /// Call every listener of `event` in priority order.
    ///
    /// Without listeners this is a no-op. A failing listener aborts the
    /// remaining ones and its error is returned unchanged.
    pub fn dispatch(&self, event: &str, mut payload: EventPayload<'_>) -> Result<&Self> {
        let event = event.trim();
        // Snapshot so listeners may register or detach while running.
        let listeners = match self.channels.read().get(event) {
            Some(listeners) => listeners.clone(),
            None => {
                trace!(event, "No listeners for event");
                return Ok(self);
            }
        };

        trace!(event, listener_count = listeners.len(), "Dispatching event");
        for listener in &listeners {
            if let Err(err) = (listener.callback)(&self.container, &mut payload) {
                warn!(
                    event,
                    priority = listener.priority,
                    error = %err,
                    "Listener failed, aborting dispatch"
                );
                return Err(err);
            }
        }

        Ok(self)
    }

    /// Remove every listener of `event`.
    pub fn detach(&self, event: &str) -> &Self {
        if let Some(removed) = self.channels.write().remove(event.trim()) {
            debug!(event, listener_count = removed.len(), "Detached event channel");
        }
        self
    }

    /// All channels with their listeners in dispatch order.
    pub fn listeners(&self) -> HashMap<String, Vec<ListenerInfo>> {
        self.channels
            .read()
            .iter()
            .map(|(event, listeners)| (event.clone(), Self::describe(event, listeners)))
            .collect()
    }

    /// Listeners of one channel in dispatch order, `None` when it has none.
    pub fn listeners_by_event(&self, event: &str) -> Option<Vec<ListenerInfo>> {
        let event = event.trim();
        self.channels
            .read()
            .get(event)
            .map(|listeners| Self::describe(event, listeners))
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.channels
            .read()
            .get(event.trim())
            .is_some_and(|listeners| !listeners.is_empty())
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    fn describe(event: &str, listeners: &[Listener]) -> Vec<ListenerInfo> {
        listeners
            .iter()
            .map(|listener| ListenerInfo {
                event: event.to_string(),
                priority: listener.priority,
                sequence: listener.sequence,
            })
            .collect()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let channels = self.channels.read();
        let mut names: Vec<&String> = channels.keys().collect();
        names.sort();
        f.debug_struct("EventBus").field("channels", &names).finish()
    }
}
