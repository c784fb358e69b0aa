//! Structured logging primitives used by the request logging middleware.
//!
//! # Data Flow
//! ```text
//! RequestLogLayer (base logger, owns the sink)
//!     → RequestLogger::with("rid", ..) per request
//!     → request.start / handler lines / request.end
//!     → LogRecord (borrowed fields)
//!     → LogSink (tracing events: owned fmt subscriber or the process one)
//! ```
//!
//! # Design Decisions
//! - Field sets are immutable; derived loggers never share mutable state
//! - Encoding is owned by the sink, not by the middleware

pub mod record;
pub mod request_logger;
pub mod sink;

pub use record::{Field, LogRecord, Value};
pub use request_logger::{LoggerError, RequestLogger};
pub use sink::{sink_from_config, Discard, LogSink, TracingSink, TARGET, TIMESTAMP_FORMAT};
