// HTTP/1 transport on hyper

use crate::logging::{error, info, warn};
use crate::{Application, HttpRequest, HttpResponse, Result};
use bytes::Bytes;
use http::header::SET_COOKIE;
use http::{Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper::body::Incoming as IncomingBody;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

impl Application {
    /// Serve on `0.0.0.0:port` until the listener fails.
    pub async fn listen(self, port: u16) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        serve(Arc::new(self), listener).await
    }

    /// Serve on the host and port from the application configuration.
    pub async fn start(self) -> Result<()> {
        let addr = format!("{}:{}", self.config().server.host, self.config().server.port);
        let listener = TcpListener::bind(addr).await?;
        serve(Arc::new(self), listener).await
    }
}

/// Accept connections on `listener` and run each request through the
/// application's full request cycle.
///
/// The cycle runs on tokio's blocking pool, so a slow handler does not stall
/// other connections.
pub async fn serve(app: Arc<Application>, listener: TcpListener) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "Server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let app = app.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<IncomingBody>| {
                let app = app.clone();
                async move { handle_request(req, app).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(%peer, error = %err, "Error serving connection");
            }
        });
    }
}

async fn handle_request(
    req: Request<IncomingBody>,
    app: Arc<Application>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().to_string();
    // The router splits the query string off itself.
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let mut request = HttpRequest::new(method, target);
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            request.headers.insert(name.to_string(), value.to_string());
        }
    }
    request.body = req.collect().await?.to_bytes().to_vec();

    // Handlers and listeners are synchronous; keep them off the reactor.
    let response = match tokio::task::spawn_blocking(move || app.respond(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            error!(error = %err, "Failed to produce a response");
            HttpResponse::internal_server_error()
        }
        Err(err) => {
            error!(error = %err, "Request task failed");
            HttpResponse::internal_server_error()
        }
    };
    Ok(into_hyper_response(response))
}

fn into_hyper_response(response: HttpResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    for cookie in &response.cookies {
        builder = builder.header(SET_COOKIE, cookie.to_string());
    }

    builder
        .body(Full::new(Bytes::from(response.body)))
        .unwrap_or_else(|err| {
            error!(error = %err, "Invalid response parts");
            let mut fallback = Response::new(Full::new(Bytes::from_static(
                b"500 Internal Server Error",
            )));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}
