//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! incoming request
//!     → SetRequestIdLayer (tower-http, assigns x-request-id)
//!     → middleware/real_ip.rs (ClientIp extension)
//!     → middleware/request_log.rs (request.start, per-request logger)
//!     → handler (logs through RequestLogger)
//!     → observer.rs (status + bytes as the body streams out)
//!     → request.end
//! ```

pub mod context;
pub mod middleware;
pub mod observer;
pub mod server;

pub use context::{client_ip, request_id, request_uri, try_client_ip, try_request_id, ClientIp};
pub use middleware::{RequestLogLayer, RequestLogService};
pub use observer::{ObservedBody, ResponseStats};
pub use server::HttpServer;
