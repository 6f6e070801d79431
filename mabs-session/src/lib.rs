//! Cookie-backed sessions for Mabs applications.
//!
//! [`SessionAdapter`] plugs into the application lifecycle: at load time it
//! registers its configuration and a session store in the container; at boot
//! it subscribes two listeners at priority 128:
//!
//! - `mabs.handle.request` reads the session cookie, loads the session from
//!   the store (or starts a new one) and attaches a [`SessionHandle`] to the
//!   request extensions;
//! - `mabs.on.terminate` saves modified sessions and sets the cookie on the
//!   response.
//!
//! # Examples
//!
//! ```
//! use mabs_core::{Application, HttpRequest};
//! use mabs_session::{RequestSessionExt, SessionAdapter};
//!
//! let app = Application::builder()
//!     .adapter(SessionAdapter::new())
//!     .build()
//!     .unwrap();
//!
//! app.get("/visit", |req: &HttpRequest| {
//!     let Some(session) = req.session() else {
//!         return "no session".to_string();
//!     };
//!     let visits = session.get::<u32>("visits").unwrap_or(0) + 1;
//!     session.set("visits", visits).ok();
//!     format!("visit #{}", visits)
//! })
//! .unwrap();
//!
//! let response = app.respond(HttpRequest::new("GET", "/visit")).unwrap();
//! assert_eq!(response.body_str(), "visit #1");
//! assert!(response.cookie("MABS_SESSION").is_some());
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod session;
pub mod store;

pub use adapter::*;
pub use config::*;
pub use error::*;
pub use session::*;
pub use store::*;
