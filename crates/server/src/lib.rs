// crates/server/src/lib.rs
//! Job progress stream server.
//!
//! Serves the point-read and SSE stream endpoints for generation jobs, fed by
//! a state cache and an event bus from `sponge-core`.

pub mod config;
pub mod demo;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod session;
pub mod state;

pub use config::{Config, StreamConfig};
pub use error::*;
pub use metrics::init_metrics;
pub use routes::api_routes;
pub use session::{StreamBackends, StreamSession};
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, job read, job stream, demo endpoints when enabled)
/// - `/metrics`
/// - CORS (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api_routes(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
