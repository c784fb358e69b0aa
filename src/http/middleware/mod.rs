//! HTTP middleware.

pub mod real_ip;
pub mod request_log;

pub use real_ip::{real_ip_middleware, RealIpState};
pub use request_log::{RequestLogLayer, RequestLogService, ResponseFuture};
