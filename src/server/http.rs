//! HTTP server implementation
//!
//! hyper http1 over a tokio accept loop, one task per connection. Each
//! request owns a cancellation token that fires when the request future is
//! dropped (client went away) or its deadline expires.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::Authenticator;
use crate::routes;
use crate::signatory::Signer;
use crate::types::{KeystoneError, Result};

/// Default upper bound on a single signatory call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state, read-only once the server starts
pub struct AppState {
    pub signer: Arc<dyn Signer>,
    pub auth: Authenticator,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(signer: Arc<dyn Signer>, auth: Authenticator) -> Self {
        Self {
            signer,
            auth,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// Start the HTTP server and serve until SIGINT/SIGTERM
pub async fn run(state: Arc<AppState>, listen: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(listen).await?;

    info!(
        "Keystone listening on {} ({} keys, authentication {})",
        listen,
        state.signer.key_count(),
        if state.auth.is_enabled() { "on" } else { "off" }
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { handle_request(state, req).await }
                        });

                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                            debug!("Error serving connection from {}: {:?}", addr, err);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {:?}", e);
                }
            },
            () = &mut shutdown => {
                info!("Shutting down, no longer accepting connections");
                break;
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}

/// Route one request. Never fails: every error becomes an envelope.
pub async fn handle_request<B>(state: Arc<AppState>, req: Request<B>) -> std::result::Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let (parts, body) = req.into_parts();
    let method = parts.method;
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_string);

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let response = match route(&state, &cancel, &method, &path, query.as_deref(), body).await {
        Ok(response) => response,
        Err(err) => {
            if err.status_code().is_server_error() {
                warn!(method = %method, path = %path, error = %err, "Request failed");
            } else {
                debug!(method = %method, path = %path, error = %err, "Request rejected");
            }
            routes::error_response(&err)
        }
    };

    info!(method = %method, path = %path, status = response.status().as_u16(), "Request handled");
    Ok(response)
}

async fn route<B>(
    state: &AppState,
    cancel: &CancellationToken,
    method: &Method,
    path: &str,
    query: Option<&str>,
    body: B,
) -> Result<Response<Full<Bytes>>>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let key_hash = path
        .strip_prefix("/keys/")
        .filter(|hash| !hash.is_empty() && !hash.contains('/'));

    match (method, key_hash) {
        (&Method::POST, Some(key_hash)) => {
            let body = read_body(body).await?;
            routes::handle_sign(state, cancel, path, key_hash, query, &body).await
        }
        (&Method::GET, Some(key_hash)) => routes::handle_get_public_key(state, cancel, key_hash).await,
        (&Method::GET, None) if path == "/health" => Ok(routes::health_check(state)),
        (&Method::GET, None) if path == "/authorized_keys" => Ok(routes::authorized_keys(state)),
        _ => Err(KeystoneError::NotFound(format!("{} {}", method, path))),
    }
}

async fn read_body<B>(body: B) -> Result<Bytes>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| KeystoneError::Decode(e.to_string()))
}
