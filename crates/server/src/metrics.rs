//! Prometheus metrics for stream sessions.
//!
//! - `stream_sessions_opened_total`
//! - `stream_sessions_closed_total{reason}`
//! - `stream_sessions_active`
//! - `stream_events_sent_total{event}`
//!
//! Rendered at `GET /metrics` once [`init_metrics`] has run.

use std::sync::{Arc, OnceLock};

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Failed to set global metrics recorder (already set)");
        return false;
    }

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Failed to store Prometheus handle (already set)");
    }

    describe_metrics();

    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    describe_counter!(
        "stream_sessions_opened_total",
        "Total number of progress stream sessions opened"
    );
    describe_counter!(
        "stream_sessions_closed_total",
        "Total number of progress stream sessions closed, by reason"
    );
    describe_gauge!(
        "stream_sessions_active",
        "Number of progress stream sessions currently open"
    );
    describe_counter!(
        "stream_events_sent_total",
        "Total number of stream events written, by event type"
    );
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

pub fn record_session_opened() {
    counter!("stream_sessions_opened_total").increment(1);
    gauge!("stream_sessions_active").increment(1.0);
}

pub fn record_session_closed(reason: &'static str) {
    counter!("stream_sessions_closed_total", "reason" => reason).increment(1);
    gauge!("stream_sessions_active").decrement(1.0);
}

/// `event` is the wire event name, or `keepalive` for comments.
pub fn record_event_sent(event: &'static str) {
    counter!("stream_events_sent_total", "event" => event).increment(1);
}

async fn scrape() -> Response {
    let Some(body) = render_metrics() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Metrics not initialized").into_response();
    };
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response()
}

/// `GET /metrics`, mounted outside `/api`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/metrics", get(scrape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_session_opened();
        record_event_sent("progress");
        record_session_closed("terminal");
    }

    #[test]
    fn test_init_then_render() {
        init_metrics();
        assert!(!init_metrics());
        record_event_sent("complete");
        let output = render_metrics().expect("initialized");
        assert!(output.contains("stream_events_sent_total"));
    }

    #[tokio::test]
    async fn test_scrape_serves_prometheus_text() {
        init_metrics();
        record_session_opened();

        let response = crate::create_app(AppState::in_memory())
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            PROMETHEUS_CONTENT_TYPE
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&body).contains("stream_sessions_opened_total"));
    }
}
