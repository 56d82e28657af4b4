//! API route handlers for the stream server.

pub mod health;
pub mod jobs;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health - Health check
/// - GET  /api/jobs/{id} - Point-read of a job
/// - GET  /api/jobs/{id}/stream - SSE stream of job progress
/// - POST /api/jobs - Start a simulated job (demo mode only)
/// - POST /api/jobs/{id}/cancel - Cancel a job (demo mode only)
/// - GET  /metrics - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .nest("/api", health::router())
        .nest("/api", jobs::router());
    if state.demo.is_some() {
        router = router.nest("/api", jobs::demo_router());
    }
    router.merge(crate::metrics::router()).with_state(state)
}
