//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the demo handler
//! - Wire up middleware (request ID, client IP, request logging)
//! - Bind server to listener
//! - Graceful shutdown

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    extract::Request,
    http::HeaderName,
    middleware,
    routing::any,
    Router,
};
use tower::util::MapRequestLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::config::ServerConfig;
use crate::http::middleware::{real_ip_middleware, RealIpState, RequestLogLayer};
use crate::logger::{RequestLogger, Value};

const DEFAULT_REQUEST_ID_HEADER: &str = "x-request-id";

/// Demo HTTP server with request logging.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server logging to the sink named in the configuration.
    pub fn new(config: ServerConfig) -> Self {
        let layer = RequestLogLayer::from_config(&config.request_log);
        Self::with_layer(config, layer)
    }

    /// Create a server with an explicit request logging layer.
    pub fn with_layer(config: ServerConfig, layer: RequestLogLayer) -> Self {
        let router = Self::build_router(&config, layer);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Requests pass, outermost first: request id scrubbing (unless the
    /// client's id is trusted) → request id → id propagation → client IP →
    /// request log (when enabled) → handler.
    fn build_router(config: &ServerConfig, layer: RequestLogLayer) -> Router {
        let log_config = &config.request_log;
        let header = HeaderName::from_bytes(log_config.request_id_header.as_bytes())
            .unwrap_or_else(|_| {
                tracing::warn!(
                    header = %log_config.request_id_header,
                    "Invalid request id header, using x-request-id"
                );
                HeaderName::from_static(DEFAULT_REQUEST_ID_HEADER)
            });
        let real_ip = RealIpState {
            trust_forwarded_for: log_config.trust_forwarded_for,
        };

        let mut router = Router::new()
            .route("/{*path}", any(echo_handler))
            .route("/", any(echo_handler));

        if log_config.enabled {
            router = router.layer(layer);
        } else {
            tracing::info!("Request logging disabled");
        }

        router = router
            .layer(middleware::from_fn_with_state(real_ip, real_ip_middleware))
            .layer(PropagateRequestIdLayer::new(header.clone()))
            .layer(SetRequestIdLayer::new(header.clone(), MakeRequestUuid));

        if !log_config.trust_request_id {
            router = router.layer(MapRequestLayer::new(move |mut request: Request| {
                request.headers_mut().remove(&header);
                request
            }));
        }

        router
    }

    /// The router, for driving the server without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` resolves.
    pub async fn run<F>(self, listener: tokio::net::TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Echoes the request path, logging through the per-request logger if any.
async fn echo_handler(logger: Option<RequestLogger>, request: Request) -> String {
    if let Some(logger) = &logger {
        logger.log(&[("evt", Value::from("handler.start"))]);
    }
    let body = format!("{}\n", request.uri().path());
    if let Some(logger) = &logger {
        logger.log(&[("evt", Value::from("handler.end"))]);
    }
    body
}

/// Wait for shutdown signal (Ctrl+C).
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
