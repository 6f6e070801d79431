//! Minimal Mabs server.
//!
//! ```bash
//! MABS_LOG_FORMAT=pretty cargo run --example hello --features session
//! curl http://localhost:8080/hello/Ada
//! ```

use mabs::logging::error;
use mabs::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_dotenv()?;
    let _guard = config.log_config().init()?;

    let app = Application::builder()
        .config(config)
        .adapter(SessionAdapter::new())
        .build()?;

    app.get("/", |_: &HttpRequest| "Welcome to Mabs")?
        .get("/hello/{name}", |req: &HttpRequest| {
            format!("Hello {}", req.param("name").unwrap_or("world"))
        })?
        .get("/visits", |req: &HttpRequest| -> Result<String> {
            let Some(session) = req.session() else {
                return Ok("sessions disabled".to_string());
            };
            let visits = session.get::<u32>("visits").unwrap_or(0) + 1;
            session.set("visits", visits)?;
            Ok(format!("You have been here {} times", visits))
        })?;

    app.on(Events::HANDLE_EXCEPTION, 0, |_, payload| {
        if let Some(err) = payload.error() {
            error!(error = %err, "Request failed");
        }
        Ok(())
    });

    app.start().await
}
