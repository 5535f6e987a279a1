//! Stream server implementation
//!
//! Wires the shared state, the routes and the cross-cutting layers:
//! - Bearer authentication on the browsing and token routes
//! - CORS
//! - Request tracing and security response headers

use std::collections::HashSet;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::{auth_middleware, IdentityVerifier};
use super::error::ServerError;
use super::routes::{issue_token, list_directory, list_root, serve_audio, serve_mix, welcome};
use crate::config::ServerConfig;
use crate::token::CapabilityStore;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ServerState {
    /// Capability tokens, shared with the sweep task
    pub tokens: Arc<CapabilityStore>,
    /// External identity provider
    pub verifier: Arc<dyn IdentityVerifier>,
    /// Emails allowed past the bearer check
    pub whitelist: Arc<HashSet<String>>,
    /// FLAC / MP3 catalog
    pub library_root: Arc<PathBuf>,
    /// MP3 mirror used for mixes
    pub mp3_root: Arc<PathBuf>,
    /// CORS origins, empty allows any
    pub cors_origins: Vec<String>,
}

impl ServerState {
    pub fn new(
        config: &ServerConfig,
        tokens: Arc<CapabilityStore>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            tokens,
            verifier,
            whitelist: Arc::new(config.whitelist.iter().cloned().collect()),
            library_root: Arc::new(config.library_root.clone()),
            mp3_root: Arc::new(config.mp3_root.clone()),
            cors_origins: config.cors_origins.clone(),
        }
    }

    /// Check whether an email may use the authenticated routes
    pub fn is_whitelisted(&self, email: &str) -> bool {
        self.whitelist.contains(email)
    }
}

/// Build the router with all routes and middleware
pub fn build_router(state: ServerState) -> Router {
    let allow_origin = if state.cors_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            state
                .cors_origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok()),
        )
    };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::RANGE])
        .expose_headers([header::CONTENT_RANGE, header::ACCEPT_RANGES, header::CONTENT_LENGTH])
        .allow_origin(allow_origin);

    let authenticated = Router::new()
        .route("/", get(welcome))
        .route("/list", get(list_root))
        .route("/list/*dir", get(list_directory))
        .route("/token/*path", get(issue_token))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(authenticated)
        .route("/mp3/:token", get(serve_mix))
        .route("/mix/:token", get(serve_mix))
        .route("/audio/*file", get(serve_audio))
        .route("/health", get(|| async { "OK" }))
        .layer(middleware::from_fn(security_headers))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Add security response headers
async fn security_headers(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers
        .entry(header::CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("private, no-store"));

    response
}

/// Audio stream server
pub struct StreamServer {
    state: ServerState,
    addr: SocketAddr,
}

impl StreamServer {
    /// Create a server from configuration and the process-wide token store
    pub fn new(
        config: &ServerConfig,
        tokens: Arc<CapabilityStore>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Result<Self, ServerError> {
        let addr = config
            .socket_addr()
            .map_err(|e| ServerError::BindFailed { reason: e.to_string() })?;

        Ok(Self {
            state: ServerState::new(config, tokens, verifier),
            addr,
        })
    }

    /// Configured listening address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Build the router over this server's state
    pub fn build_router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| ServerError::BindFailed { reason: e.to_string() })?;

        tracing::info!(
            "Stream server listening on {} (library {:?}, mp3 {:?})",
            self.addr,
            self.state.library_root,
            self.state.mp3_root
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal { reason: e.to_string() })?;

        tracing::info!("Stream server stopped");
        Ok(())
    }

    /// Start the server in a background task
    pub fn start_background<F>(self, shutdown: F) -> tokio::task::JoinHandle<Result<(), ServerError>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move { self.serve(shutdown).await })
    }
}
