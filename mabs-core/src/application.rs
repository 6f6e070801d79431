// Application bootstrapping and the request lifecycle

use crate::emitter::BufferedEmitter;
use crate::events::ListenerFn;
use crate::logging::{debug, error, info};
use crate::traits::{ResponseEmitter, ServiceAdapter};
use crate::{
    AppConfig, Container, EventBus, EventPayload, Events, HttpMethod, HttpRequest, HttpResponse,
    IntoResponse, Result, Route, Router,
};
use std::sync::Arc;

/// Container key of the shared [`Router`].
pub const ROUTER_SERVICE: &str = "router";
/// Container key of the [`AppConfig`].
pub const CONFIG_SERVICE: &str = "config";
/// Container key of the debug flag (`bool`).
pub const DEBUG_SERVICE: &str = "debug";

/// Collects configuration, adapters and early listeners for an [`Application`].
#[derive(Default)]
pub struct ApplicationBuilder {
    config: AppConfig,
    adapters: Vec<Arc<dyn ServiceAdapter>>,
    listeners: Vec<(String, i32, ListenerFn)>,
}

impl ApplicationBuilder {
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Add an adapter. Adapters are loaded and booted in insertion order.
    pub fn adapter<A: ServiceAdapter>(mut self, adapter: A) -> Self {
        self.adapters.push(Arc::new(adapter));
        self
    }

    /// Subscribe before the application is built, so the listener also sees
    /// `mabs.before.load`, `mabs.on.locked` and `mabs.on.boot`.
    pub fn on<F>(mut self, event: &str, priority: i32, callback: F) -> Self
    where
        F: Fn(&Container, &mut EventPayload<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let callback: ListenerFn = Arc::new(callback);
        self.listeners.push((event.to_string(), priority, callback));
        self
    }

    /// Load, lock and boot the application.
    pub fn build(self) -> Result<Application> {
        let container = Container::new();
        let events = EventBus::new(container.clone());
        for (event, priority, callback) in self.listeners {
            events.register(&event, priority, move |container, payload| {
                callback(container, payload)
            });
        }

        let mut app = Application {
            config: self.config,
            container,
            events,
            router: Arc::new(Router::new()),
            adapters: self.adapters,
            loaded: false,
        };

        app.load()?;
        app.lock()?;
        app.boot()?;
        Ok(app)
    }
}

/// The Mabs application.
///
/// Owns the service container, the event bus and the router. Building an
/// application runs the bootstrap sequence once: `mabs.before.load`, core
/// services and adapter `load`, container lock and `mabs.on.locked`, then
/// adapter `boot` and `mabs.on.boot`. From then on the container is
/// read-only while routes and listeners can still be added.
pub struct Application {
    config: AppConfig,
    container: Container,
    events: EventBus,
    router: Arc<Router>,
    adapters: Vec<Arc<dyn ServiceAdapter>>,
    loaded: bool,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::default()
    }

    /// Build an application without adapters.
    pub fn new(config: AppConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    fn load(&mut self) -> Result<()> {
        info!(name = %self.config.name, debug = self.config.debug, "Bootstrapping Mabs application");
        self.events
            .dispatch(Events::BEFORE_LOAD, EventPayload::None)?;

        self.container.set(CONFIG_SERVICE, self.config.clone())?;
        self.container.set(DEBUG_SERVICE, self.config.debug)?;
        self.container
            .set_service(ROUTER_SERVICE, self.router.clone())?;

        for adapter in &self.adapters {
            debug!(adapter = adapter.name(), "Loading adapter");
            adapter.load(&self.container)?;
        }

        self.loaded = true;
        Ok(())
    }

    fn lock(&self) -> Result<()> {
        self.container.lock();
        self.events.dispatch(Events::ON_LOCKED, EventPayload::None)?;
        Ok(())
    }

    fn boot(&self) -> Result<()> {
        for adapter in &self.adapters {
            debug!(adapter = adapter.name(), "Booting adapter");
            adapter.boot(&self.container, &self.events)?;
        }
        self.events.dispatch(Events::ON_BOOT, EventPayload::None)?;
        info!(
            adapters = self.adapters.len(),
            routes = self.router.len(),
            "Application booted"
        );
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_debug(&self) -> bool {
        self.config.debug
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Names of the registered adapters, in load order.
    pub fn adapters(&self) -> Vec<&str> {
        self.adapters.iter().map(|adapter| adapter.name()).collect()
    }

    /// Mount a prepared route under `methods` (all methods when empty).
    pub fn mount(&self, route: Route, methods: &[HttpMethod]) -> &Self {
        self.router.mount(route, methods);
        self
    }

    /// Mount `handler` at `path` for the given methods.
    pub fn match_methods<F, R>(&self, methods: &[HttpMethod], path: &str, handler: F) -> Result<&Self>
    where
        F: Fn(&HttpRequest) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        let route = Route::new(path, handler)?;
        Ok(self.mount(route, methods))
    }

    pub fn get<F, R>(&self, path: &str, handler: F) -> Result<&Self>
    where
        F: Fn(&HttpRequest) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.match_methods(&[HttpMethod::GET], path, handler)
    }

    pub fn post<F, R>(&self, path: &str, handler: F) -> Result<&Self>
    where
        F: Fn(&HttpRequest) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.match_methods(&[HttpMethod::POST], path, handler)
    }

    pub fn put<F, R>(&self, path: &str, handler: F) -> Result<&Self>
    where
        F: Fn(&HttpRequest) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.match_methods(&[HttpMethod::PUT], path, handler)
    }

    pub fn patch<F, R>(&self, path: &str, handler: F) -> Result<&Self>
    where
        F: Fn(&HttpRequest) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.match_methods(&[HttpMethod::PATCH], path, handler)
    }

    pub fn delete<F, R>(&self, path: &str, handler: F) -> Result<&Self>
    where
        F: Fn(&HttpRequest) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.match_methods(&[HttpMethod::DELETE], path, handler)
    }

    pub fn head<F, R>(&self, path: &str, handler: F) -> Result<&Self>
    where
        F: Fn(&HttpRequest) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.match_methods(&[HttpMethod::HEAD], path, handler)
    }

    pub fn options<F, R>(&self, path: &str, handler: F) -> Result<&Self>
    where
        F: Fn(&HttpRequest) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.match_methods(&[HttpMethod::OPTIONS], path, handler)
    }

    /// Mount `handler` for every HTTP method.
    pub fn any<F, R>(&self, path: &str, handler: F) -> Result<&Self>
    where
        F: Fn(&HttpRequest) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.match_methods(&[], path, handler)
    }

    /// Subscribe to an event. Higher priorities run first.
    pub fn on<F>(&self, event: &str, priority: i32, callback: F) -> &Self
    where
        F: Fn(&Container, &mut EventPayload<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.events.register(event, priority, callback);
        self
    }

    /// Remove every listener of `event`.
    pub fn detach(&self, event: &str) -> &Self {
        self.events.detach(event);
        self
    }

    pub fn dispatch(&self, event: &str, payload: EventPayload<'_>) -> Result<&Self> {
        self.events.dispatch(event, payload)?;
        Ok(self)
    }

    /// Build a URL for a named route.
    pub fn generate_url<I, K, V>(&self, name: &str, params: I) -> Result<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.router.generate_url(name, params)
    }

    /// Produce the response for `request`.
    ///
    /// Runs `mabs.handle.request` listeners, then routes. Any error along the
    /// way is reported once on `mabs.handle.exception` and turned into a
    /// generic 500 response; the error itself never reaches the client.
    pub fn handle_request(&self, request: &mut HttpRequest) -> HttpResponse {
        match self.try_handle(request) {
            Ok(response) => response,
            Err(err) => {
                self.report(&err);
                HttpResponse::internal_server_error()
            }
        }
    }

    fn try_handle(&self, request: &mut HttpRequest) -> Result<HttpResponse> {
        self.events
            .dispatch(Events::HANDLE_REQUEST, EventPayload::Request(request))?;
        self.router.handle(request)
    }

    /// Run the full cycle for one request: handle, `mabs.on.terminate`, emit,
    /// `mabs.on.finish`.
    ///
    /// A failing terminate listener replaces the response with a 500 before it
    /// is sent. Only a failing emitter is returned to the caller; every error
    /// is also reported on `mabs.handle.exception`.
    pub fn run<E>(&self, mut request: HttpRequest, emitter: &mut E) -> Result<()>
    where
        E: ResponseEmitter + ?Sized,
    {
        let mut response = self.handle_request(&mut request);

        if let Err(err) = self.events.dispatch(
            Events::ON_TERMINATE,
            EventPayload::Exchange {
                request: &request,
                response: &mut response,
            },
        ) {
            self.report(&err);
            response = HttpResponse::internal_server_error();
        }

        if let Err(err) = emitter.emit(&response) {
            self.report(&err);
            return Err(err);
        }
        debug!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            "Response sent"
        );

        if let Err(err) = self.events.dispatch(
            Events::ON_FINISH,
            EventPayload::Exchange {
                request: &request,
                response: &mut response,
            },
        ) {
            self.report(&err);
        }
        Ok(())
    }

    /// Run one request through the full cycle and return what was sent.
    pub fn respond(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut emitter = BufferedEmitter::new();
        self.run(request, &mut emitter)?;
        Ok(emitter
            .take()
            .unwrap_or_else(HttpResponse::internal_server_error))
    }

    fn report(&self, err: &crate::Error) {
        error!(error = %err, "Request handling failed");
        if let Err(listener_err) = self
            .events
            .dispatch(Events::HANDLE_EXCEPTION, EventPayload::Error(err))
        {
            error!(error = %listener_err, "Exception listener failed");
        }
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.config.name)
            .field("debug", &self.config.debug)
            .field("adapters", &self.adapters())
            .field("router", &self.router)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use parking_lot::Mutex;

    struct Greeter;

    impl ServiceAdapter for Greeter {
        fn name(&self) -> &str {
            "greeter"
        }

        fn load(&self, container: &Container) -> Result<()> {
            container.set("greeting", "Hello".to_string())
        }

        fn boot(&self, _container: &Container, events: &EventBus) -> Result<()> {
            events.register(Events::HANDLE_REQUEST, 0, |container, payload| {
                let greeting = container.get_as::<String>("greeting")?;
                if let Some(request) = payload.request_mut() {
                    request
                        .headers
                        .insert("X-Greeting".to_string(), greeting.to_string());
                }
                Ok(())
            });
            Ok(())
        }
    }

    #[test]
    fn test_bootstrap_registers_core_services_and_locks() {
        let app = Application::new(AppConfig::default().debug(true)).unwrap();

        assert!(app.is_loaded());
        assert!(app.is_debug());
        assert!(app.container().is_locked());
        assert!(app.container().has(ROUTER_SERVICE));
        assert!(*app.container().get_as::<bool>(DEBUG_SERVICE).unwrap());
        assert!(app.container().get_as::<Router>(ROUTER_SERVICE).is_ok());
    }

    #[test]
    fn test_adapter_load_and_boot() {
        let app = Application::builder().adapter(Greeter).build().unwrap();
        app.get("/", |req: &HttpRequest| {
            req.header("X-Greeting").unwrap_or_default().to_string()
        })
        .unwrap();

        assert_eq!(app.adapters(), vec!["greeter"]);
        let response = app.handle_request(&mut HttpRequest::new("GET", "/"));
        assert_eq!(response.body_str(), "Hello");
    }

    #[test]
    fn test_adapter_load_failure_aborts_build() {
        struct Broken;
        impl ServiceAdapter for Broken {
            fn load(&self, _: &Container) -> Result<()> {
                Err(Error::Config("missing".into()))
            }
            fn boot(&self, _: &Container, _: &EventBus) -> Result<()> {
                Ok(())
            }
        }

        assert!(Application::builder().adapter(Broken).build().is_err());
    }

    #[test]
    fn test_container_rejects_writes_after_boot() {
        let app = Application::new(AppConfig::default()).unwrap();
        assert!(matches!(
            app.container().set("late", 1_u8),
            Err(Error::LockedContainer(_))
        ));
    }

    #[test]
    fn test_handler_error_becomes_500() {
        let app = Application::new(AppConfig::default()).unwrap();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        app.on(Events::HANDLE_EXCEPTION, 0, move |_, payload| {
            if let Some(err) = payload.error() {
                sink.lock().push(err.to_string());
            }
            Ok(())
        });
        app.get("/boom", |_: &HttpRequest| -> Result<String> {
            Err(Error::handler("exploded"))
        })
        .unwrap();

        let response = app.handle_request(&mut HttpRequest::new("GET", "/boom"));
        assert_eq!(response.status, 500);
        assert_eq!(response.body_str(), "500 Internal Server Error");
        assert_eq!(*errors.lock(), vec!["Handler error: exploded".to_string()]);
    }

    #[test]
    fn test_failing_terminate_listener_sends_500() {
        let app = Application::new(AppConfig::default()).unwrap();
        app.get("/", |_: &HttpRequest| "fine").unwrap();
        app.on(Events::ON_TERMINATE, 0, |_, _| {
            Err(Error::listener(Events::ON_TERMINATE, "nope"))
        });

        let response = app.respond(HttpRequest::new("GET", "/")).unwrap();
        assert_eq!(response.status, 500);
    }
}
