//! The per-request logger.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::logger::record::{Field, LogRecord, Value};
use crate::logger::sink::LogSink;

/// Errors returned by the logger accessors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LoggerError {
    /// Looked up outside an active request logging scope.
    #[error("no request logger in scope (is RequestLogLayer installed?)")]
    NotInScope,
}

/// A structured logger bound to a fixed set of context fields.
///
/// The request logging middleware derives one per request with the request
/// identifier (`rid`) as context, and hands it to downstream handlers so their
/// lines correlate with the request start/end lines.
///
/// Loggers are immutable. [`RequestLogger::with`] returns a new logger and
/// fields given to [`RequestLogger::log`] apply to that call only, so two
/// calls never see each other's fields.
#[derive(Clone)]
pub struct RequestLogger {
    sink: Arc<dyn LogSink>,
    context: Arc<[Field]>,
}

impl RequestLogger {
    /// Create a logger with no context fields.
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            context: Arc::from(Vec::new()),
        }
    }

    /// Derive a logger with one more context field.
    pub fn with(&self, key: &'static str, value: impl Into<Value>) -> Self {
        let mut context = Vec::with_capacity(self.context.len() + 1);
        context.extend_from_slice(&self.context);
        context.push((key, value.into()));
        Self {
            sink: Arc::clone(&self.sink),
            context: context.into(),
        }
    }

    /// Emit one record: the context fields followed by `fields`.
    pub fn log(&self, fields: &[Field]) {
        self.sink.log(&LogRecord::new(&self.context, fields));
    }

    /// Emit a plain message under the `msg` key.
    pub fn message(&self, msg: impl Into<Value>) {
        self.log(&[("msg", msg.into())]);
    }

    pub fn context(&self) -> &[Field] {
        &self.context
    }

    /// Value of a context field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.context
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Whether both handles came from the same derivation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.context, &other.context)
    }
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
