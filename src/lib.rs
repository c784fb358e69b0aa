//! Request/response logging middleware for axum and tower HTTP servers.

pub mod config;
pub mod http;
pub mod logger;
pub mod observability;

pub use config::schema::ServerConfig;
pub use http::{HttpServer, ObservedBody, RequestLogLayer, ResponseStats};
pub use logger::{LogSink, LoggerError, RequestLogger};
