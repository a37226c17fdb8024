//! Logging channels and subscriber setup.
//!
//! The engine reports on two independently filterable tracing targets:
//!
//! - [`SESSION`]: scheduling, dispatch and decode lifecycle
//! - [`NETWORKING`]: raw request/response events and header negotiation
//!
//! Filter them with the `JSONPOLL_LOG` environment variable, e.g.
//! `JSONPOLL_LOG=jsonpoll::networking=debug`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Target for session and decode lifecycle events.
pub const SESSION: &str = "jsonpoll::session";

/// Target for raw networking events.
pub const NETWORKING: &str = "jsonpoll::networking";

/// Environment variable consulted for the log filter.
pub const LOG_ENV: &str = "JSONPOLL_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber is installed.
    Silent,
    /// Compact stderr output at `info`.
    Development,
    /// Verbose output with targets and line numbers at `debug`.
    Debug,
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter in {LOG_ENV}: {0}")]
    InvalidFilter(String),
}

/// Install the global tracing subscriber for `mode`.
pub fn init(mode: LoggingMode) -> Result<(), LoggingError> {
    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = env_filter("info")?;
            Registry::default()
                .with(fmt::layer().with_target(true).compact())
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = env_filter("debug")?;
            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

fn env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    match std::env::var(LOG_ENV) {
        Ok(directives) => {
            EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter(e.to_string()))
        }
        Err(_) => Ok(EnvFilter::new(default_level)),
    }
}
