//! Configuration schema definitions.
//!
//! This module defines the configuration structure for the demo server and
//! the request logging middleware. All types derive Serde traits for
//! deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Request logging middleware settings.
    pub request_log: RequestLogConfig,

    /// Process diagnostics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Where request log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Forward to the process `tracing` subscriber.
    Tracing,
    Discard,
}

/// Line format of the stdout and stderr outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `key=value` fields, one event per line.
    #[default]
    Logfmt,
    /// One flattened JSON object per line.
    Json,
}

/// Request logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestLogConfig {
    /// Install the request logging middleware.
    pub enabled: bool,

    /// Log destination.
    pub output: LogOutput,

    /// Line encoding (ignored by the tracing and discard outputs).
    pub format: LogFormat,

    /// Prefix each line with a UTC timestamp.
    pub timestamps: bool,

    /// Header carrying the request identifier.
    pub request_id_header: String,

    /// Keep a request identifier supplied by the client. When false the
    /// inbound header is dropped and a fresh identifier is generated.
    pub trust_request_id: bool,

    /// Resolve the client IP from `X-Forwarded-For` / `X-Real-IP`.
    /// Only enable behind a trusted proxy.
    pub trust_forwarded_for: bool,
}

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output: LogOutput::Stdout,
            format: LogFormat::Logfmt,
            timestamps: true,
            request_id_header: "x-request-id".to_string(),
            trust_request_id: false,
            trust_forwarded_for: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or `EnvFilter` directive for process diagnostics.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
