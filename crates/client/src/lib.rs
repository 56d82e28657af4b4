// crates/client/src/lib.rs
//! Client for job progress streams.
//!
//! [`StreamClient::watch`] spawns a driver that loads the job, follows its
//! event stream and reconciles every event into a [`ClientState`] published
//! through a `tokio::sync::watch` channel.

pub mod api;
pub mod config;
pub mod error;
pub mod state;
pub mod transport;

pub use config::ClientConfig;
pub use error::ClientError;
pub use state::{ClientState, Effect, Input, Phase, STALL_MESSAGE};
pub use transport::{StreamClient, StreamHandle};
