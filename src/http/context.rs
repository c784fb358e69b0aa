//! Request-scoped context accessors.
//!
//! # Responsibilities
//! - Read upstream enrichment (request id, client IP) from request extensions
//! - Store and retrieve the per-request logger
//!
//! # Design Decisions
//! - Missing enrichment degrades to an empty string; `try_*` variants report
//!   absence explicitly
//! - The logger lives under a crate-private extension type, so no other
//!   extension user can collide with or replace it
//! - The logger is also installed in a task-local scope while the inner
//!   service runs, for code that has no access to the request

use std::convert::Infallible;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts, OptionalFromRequestParts, OriginalUri};
use axum::http::{request::Parts, Extensions, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::task::futures::TaskLocalFuture;
use tower_http::request_id::RequestId;

use crate::logger::{LoggerError, RequestLogger};

tokio::task_local! {
    static CURRENT_LOGGER: RequestLogger;
}

/// Extension slot holding the per-request logger.
#[derive(Clone)]
pub(crate) struct LoggerSlot(pub(crate) RequestLogger);

/// Client address resolved by an upstream real-IP middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// The request identifier set by `SetRequestIdLayer`, if any.
pub fn try_request_id(extensions: &Extensions) -> Option<&str> {
    extensions
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
}

/// The request identifier, or `""` when absent.
pub fn request_id(extensions: &Extensions) -> &str {
    try_request_id(extensions).unwrap_or_default()
}

/// The resolved client IP, falling back to the peer address.
pub fn try_client_ip(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ClientIp>()
        .map(|ClientIp(ip)| *ip)
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
}

/// The client IP as text, or `""` when unknown.
pub fn client_ip(extensions: &Extensions) -> String {
    try_client_ip(extensions)
        .map(|ip| ip.to_string())
        .unwrap_or_default()
}

/// Path and query of the request as it reached the router.
///
/// Prefers [`OriginalUri`] so nested routers still log the full path, and
/// drops the scheme and authority of absolute-form URIs.
pub fn request_uri<B>(request: &Request<B>) -> String {
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri)
        .unwrap_or_else(|| request.uri());
    uri.path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| uri.path().to_owned())
}

/// Run `f` with `logger` as the current task-local logger.
pub(crate) fn sync_scope<R>(logger: RequestLogger, f: impl FnOnce() -> R) -> R {
    CURRENT_LOGGER.sync_scope(logger, f)
}

/// Poll `future` with `logger` as the current task-local logger.
pub(crate) fn scope<F: Future>(logger: RequestLogger, future: F) -> TaskLocalFuture<RequestLogger, F> {
    CURRENT_LOGGER.scope(logger, future)
}

impl RequestLogger {
    /// The logger attached to `request` by the request logging middleware.
    pub fn from_request<B>(request: &Request<B>) -> Result<&RequestLogger, LoggerError> {
        Self::from_extensions(request.extensions())
    }

    pub fn from_extensions(extensions: &Extensions) -> Result<&RequestLogger, LoggerError> {
        extensions
            .get::<LoggerSlot>()
            .map(|LoggerSlot(logger)| logger)
            .ok_or(LoggerError::NotInScope)
    }

    /// The logger of the request currently being handled on this task.
    ///
    /// Only available while the inner service future is polled; spawned
    /// tasks do not inherit it.
    pub fn current() -> Result<RequestLogger, LoggerError> {
        CURRENT_LOGGER
            .try_with(RequestLogger::clone)
            .map_err(|_| LoggerError::NotInScope)
    }
}

impl IntoResponse for LoggerError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

impl<S> FromRequestParts<S> for RequestLogger
where
    S: Send + Sync,
{
    type Rejection = LoggerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_extensions(&parts.extensions).cloned()
    }
}

/// `Option<RequestLogger>` for handlers that also run without the middleware.
impl<S> OptionalFromRequestParts<S> for RequestLogger
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        Ok(Self::from_extensions(&parts.extensions).ok().cloned())
    }
}
