//! Tracing setup shared by the stream server binary and integration tests.
//!
//! `RUST_LOG` wins over the built-in directives when set.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Directives used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVES: &str = "warn,sponge_server=info,sponge_core=info";

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Single-line human readable output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}

/// Build the env filter, falling back to `default_directives`.
pub fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Install the global subscriber.
pub fn init_tracing(format: LogFormat) -> Result<(), InitError> {
    init_tracing_with(format, DEFAULT_DIRECTIVES)
}

pub fn init_tracing_with(format: LogFormat, default_directives: &str) -> Result<(), InitError> {
    let registry = tracing_subscriber::registry().with(env_filter(default_directives));
    let result = match format {
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false).flatten_event(true))
            .try_init(),
    };
    result.map_err(|_| InitError::AlreadyInstalled)
}
