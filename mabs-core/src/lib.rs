// Core library for the Mabs framework
// Service container, event bus, router and the application request lifecycle

pub mod application;
pub mod config;
pub mod container;
pub mod emitter;
pub mod error;
pub mod events;
pub mod http;
pub mod logging;
pub mod route;
pub mod routing;
pub mod server;
pub mod traits;

// Re-export commonly used types
pub use application::*;
pub use config::AppConfig;
pub use container::*;
pub use emitter::*;
pub use error::*;
pub use events::*;
pub use self::http::*;
pub use route::{Placeholder, Route, RouteHandler, RouteParams, normalize_path};
pub use routing::Router;
pub use server::serve;
pub use traits::*;
