// Service container with lazily resolved, memoized factories

use crate::logging::{debug, trace};
use crate::{Error, Result};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A resolved service value.
pub type Service = Arc<dyn Any + Send + Sync>;

/// A deferred service constructor. Receives the container so services can
/// depend on other services.
pub type Factory = Arc<dyn Fn(&Container) -> Result<Service> + Send + Sync>;

struct LazySlot {
    factory: Factory,
    cell: OnceCell<Service>,
}

enum Entry {
    Value(Service),
    Factory(Arc<LazySlot>),
}

/// Keyed store of services and lazily evaluated factories.
///
/// Reading a factory-backed key runs the factory once, then replaces the
/// entry with the produced value; every later read observes that same
/// instance. After [`Container::lock`] the key set is frozen: `set`,
/// `set_factory` and `unset` all fail with [`Error::LockedContainer`].
///
/// A factory must not read its own key, that would never complete.
#[derive(Clone)]
pub struct Container {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    locked: Arc<AtomicBool>,
}

impl Container {
    pub fn new() -> Self {
        debug!("Creating new service container");
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            locked: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Store a plain value under `key`.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> Result<()> {
        self.insert(key.into(), Entry::Value(Arc::new(value)))
    }

    /// Store an already shared service under `key`.
    pub fn set_service(&self, key: impl Into<String>, service: Service) -> Result<()> {
        self.insert(key.into(), Entry::Value(service))
    }

    /// Store a factory under `key`; it runs on first [`Container::get`].
    pub fn set_factory<T, F>(&self, key: impl Into<String>, factory: F) -> Result<()>
    where
        T: Any + Send + Sync,
        F: Fn(&Container) -> Result<T> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |container: &Container| {
            factory(container).map(|value| Arc::new(value) as Service)
        });
        self.insert(
            key.into(),
            Entry::Factory(Arc::new(LazySlot {
                factory,
                cell: OnceCell::new(),
            })),
        )
    }

    fn insert(&self, key: String, entry: Entry) -> Result<()> {
        trace!(key = %key, "Acquiring write lock for registration");
        let mut entries = self.entries.write();
        if self.is_locked() {
            debug!(key = %key, "Rejected write to locked container");
            return Err(Error::LockedContainer(key));
        }
        let kind = match entry {
            Entry::Value(_) => "value",
            Entry::Factory(_) => "factory",
        };
        entries.insert(key.clone(), entry);
        debug!(key = %key, kind, "Service registered in container");
        Ok(())
    }

    /// Resolve the service stored under `key`, running its factory if this
    /// is the first read.
    pub fn get(&self, key: &str) -> Result<Service> {
        trace!(key, "Attempting to resolve service");
        let slot = {
            let entries = self.entries.read();
            match entries.get(key) {
                None => {
                    debug!(key, "Service not found in container");
                    return Err(Error::ServiceNotFound(key.to_string()));
                }
                Some(Entry::Value(value)) => return Ok(Arc::clone(value)),
                Some(Entry::Factory(slot)) => Arc::clone(slot),
            }
        };

        // The read lock is released so the factory may resolve its own dependencies.
        let value = slot
            .cell
            .get_or_try_init(|| {
                debug!(key, "Constructing service from factory");
                (slot.factory)(self)
            })?
            .clone();

        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(key) {
            let unchanged = matches!(entry, Entry::Factory(current) if Arc::ptr_eq(current, &slot));
            if unchanged {
                *entry = Entry::Value(Arc::clone(&value));
            }
        }

        Ok(value)
    }

    /// Resolve and downcast the service stored under `key`.
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>> {
        self.get(key)?
            .downcast::<T>()
            .map_err(|_| Error::ServiceTypeMismatch {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Check if a key is registered. Never runs a factory.
    pub fn has(&self, key: &str) -> bool {
        let exists = self.entries.read().contains_key(key);
        trace!(key, exists, "Checked service existence");
        exists
    }

    /// Whether `key` holds a constructed value rather than a pending factory.
    pub fn is_resolved(&self, key: &str) -> bool {
        matches!(self.entries.read().get(key), Some(Entry::Value(_)))
    }

    /// Remove `key`. Removing an absent key is a no-op.
    pub fn unset(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write();
        if self.is_locked() {
            return Err(Error::LockedContainer(key.to_string()));
        }
        if entries.remove(key).is_some() {
            debug!(key, "Service removed from container");
        }
        Ok(())
    }

    /// Freeze the container. There is no way back.
    pub fn lock(&self) {
        let entries = self.entries.write();
        if !self.locked.swap(true, Ordering::SeqCst) {
            debug!(service_count = entries.len(), "Container locked");
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("keys", &self.keys())
            .field("locked", &self.is_locked())
            .finish()
    }
}
