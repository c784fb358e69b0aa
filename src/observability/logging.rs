//! Process diagnostics logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber for the binary
//! - Resolve the log level from `RUST_LOG`, falling back to config
//!
//! # Design Decisions
//! - Request lines go through `LogSink`s; this subscriber carries the
//!   server's own diagnostics, plus request lines when the `tracing` output
//!   is selected

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter used when neither `RUST_LOG` nor the config parses.
const FALLBACK_FILTER: &str = "request_log=info";

/// Build the filter: `RUST_LOG` wins over the configured level.
pub fn env_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let config = ObservabilityConfig::default();
        let _ = init_tracing(&config);
        let second = init_tracing(&config);
        assert!(second.is_err());
    }
}
