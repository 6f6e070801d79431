// Extension points of the Mabs application lifecycle

use crate::{Container, EventBus, HttpResponse, Result};

/// A bundle of services and listeners plugged into an [`Application`].
///
/// `load` runs while the container is still open and is the only place an
/// adapter may register services. `boot` runs after the container has been
/// locked, so it can resolve services and subscribe to lifecycle events.
///
/// [`Application`]: crate::Application
pub trait ServiceAdapter: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn load(&self, container: &Container) -> Result<()>;

    fn boot(&self, container: &Container, events: &EventBus) -> Result<()>;
}

/// Writes a finished response to the client.
pub trait ResponseEmitter {
    fn emit(&mut self, response: &HttpResponse) -> Result<()>;
}
