// crates/server/src/config.rs
//! Command line and environment configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use sponge_observability::LogFormat;

/// Default port for the stream server.
pub const DEFAULT_PORT: u16 = 47892;

#[derive(Parser, Debug, Clone)]
#[command(name = "sponge-stream", version, about = "Job progress streaming server")]
pub struct Config {
    /// Address to bind.
    #[arg(long, env = "SPONGE_HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// Port to bind.
    #[arg(long, env = "SPONGE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Keep-alive comment interval, in seconds.
    #[arg(long, env = "SPONGE_HEARTBEAT_SECS", default_value_t = 15)]
    pub heartbeat_secs: u64,

    /// Interval of the job store fallback check, in seconds.
    #[arg(long, env = "SPONGE_POLL_SECS", default_value_t = 30)]
    pub poll_secs: u64,

    /// Hard limit on a single stream session, in seconds.
    #[arg(long, env = "SPONGE_SESSION_TIMEOUT_SECS", default_value_t = 300)]
    pub session_timeout_secs: u64,

    /// Lifetime of a cached progress snapshot, in seconds.
    #[arg(long, env = "SPONGE_CACHE_TTL_SECS", default_value_t = 300)]
    pub cache_ttl_secs: u64,

    #[arg(long, env = "SPONGE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Expose endpoints that create and cancel simulated jobs.
    #[arg(long, env = "SPONGE_DEMO")]
    pub demo: bool,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            heartbeat: Duration::from_secs(self.heartbeat_secs),
            poll_interval: Duration::from_secs(self.poll_secs),
            session_timeout: Duration::from_secs(self.session_timeout_secs),
        }
    }
}

/// Timers of a stream session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub heartbeat: Duration,
    pub poll_interval: Duration,
    pub session_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(15),
            poll_interval: Duration::from_secs(30),
            session_timeout: Duration::from_secs(300),
        }
    }
}
