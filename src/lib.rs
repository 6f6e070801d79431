// Mabs - a minimal web framework for Rust
//
// A lazily resolving service container, a priority-ordered event bus and a
// regex-based router, tied together by the application request lifecycle.

// Re-export core functionality
pub use mabs_core::*;

// Re-export optional crates
#[cfg(feature = "session")]
pub use mabs_session;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        AppConfig, Application, Container, Cookie, Error, EventBus, EventPayload, Events,
        HttpMethod, HttpRequest, HttpResponse, IntoResponse, Json, ResponseEmitter, Result, Route,
        Router, ServiceAdapter,
    };

    #[cfg(feature = "session")]
    pub use mabs_session::{RequestSessionExt, SessionAdapter, SessionConfig};
}
