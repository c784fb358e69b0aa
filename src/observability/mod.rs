//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request lines:
//!     → logger (RequestLogger → LogSink)
//!
//! Process diagnostics (startup, shutdown, sink failures):
//!     → logging.rs (tracing subscriber, EnvFilter + fmt)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every request line as `rid`
//! - The `tracing` output bridges request lines into the same subscriber

pub mod logging;

pub use logging::init_tracing;
