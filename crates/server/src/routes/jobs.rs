// crates/server/src/routes/jobs.rs
//! Job read and progress stream routes.
//!
//! - GET /jobs/{id} - point-read of a job with its cached progress
//! - GET /jobs/{id}/stream - SSE stream of job progress
//! - POST /jobs - start a simulated job (demo mode)
//! - POST /jobs/{id}/cancel - cancel a job (demo mode)

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sponge_core::{Job, JobOutcome, Snapshot};
use sponge_types::{JobSnapshot, ProgressView, StreamEvent};
use tokio_stream::StreamExt;

use crate::demo::run_demo_pipeline;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::session::{StreamSession, JOB_NOT_FOUND_ERROR};
use crate::state::AppState;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// GET /api/jobs/{id} - current job state.
async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let job = state
        .store()
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::JobNotFound(id.clone()))?;

    let progress = match state.cache().get(&id).await {
        Ok(Some(Snapshot::Progress(event))) => Some(ProgressView::from(event)),
        Ok(Some(Snapshot::Terminal(snapshot))) => snapshot.progress,
        Ok(None) => None,
        Err(e) => {
            tracing::debug!(job_id = %id, error = %e, "State cache read failed");
            None
        }
    };

    Ok(Json(job.snapshot(progress)))
}

/// GET /api/jobs/{id}/stream - SSE stream of job progress.
///
/// # Events
///
/// | Event name | Payload                                   |
/// |------------|-------------------------------------------|
/// | `progress` | progress delta, or a full job snapshot    |
/// | `complete` | terminal job snapshot; stream ends        |
/// | `error`    | `{"error": "..."}`; stream ends           |
///
/// A `: heartbeat` comment is sent between events.
async fn stream_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.store().get(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                sse_headers(),
                StreamEvent::error(JOB_NOT_FOUND_ERROR).to_sse_text(),
            )
                .into_response();
        }
        Err(e) => return ApiError::from(e).into_response(),
    }

    let session = StreamSession::new(id, state.backends.clone(), state.stream_config.clone());
    let events = session
        .into_stream()
        .map(|event| Ok::<_, Infallible>(to_sse_event(&event)));

    (sse_headers(), Sse::new(events)).into_response()
}

fn sse_headers() -> [(HeaderName, HeaderValue); 3] {
    [
        (header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream")),
        (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        (X_ACCEL_BUFFERING, HeaderValue::from_static("no")),
    ]
}

fn to_sse_event(event: &StreamEvent) -> Event {
    match (event.event_name(), event.data_json()) {
        (Some(name), Some(data)) => {
            metrics::record_event_sent(name);
            Event::default().event(name).data(data)
        }
        _ => {
            metrics::record_event_sent("keepalive");
            Event::default().comment("heartbeat")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct CancelResponse {
    pub id: String,
    pub cancelled: bool,
}

/// POST /api/jobs - create a job and run the simulated pipeline.
async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<JobSnapshot>)> {
    let url = body.url.trim().to_string();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ApiError::BadRequest("url must start with http:// or https://".into()));
    }
    let step = state
        .demo
        .ok_or_else(|| ApiError::Internal("demo endpoints mounted without demo mode".into()))?;

    let job = Job::new(uuid::Uuid::new_v4().to_string(), url.clone());
    let snapshot = job.snapshot(None);
    state.store().insert(job).await?;

    tracing::info!(job_id = %snapshot.id, url = %url, "Demo job created");
    state
        .runner
        .start(snapshot.id.clone(), move |reporter| run_demo_pipeline(reporter, url, step));

    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// POST /api/jobs/{id}/cancel - cancel a running job.
async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<CancelResponse>)> {
    let job = state
        .store()
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::JobNotFound(id.clone()))?;
    if job.status.is_terminal() {
        return Err(ApiError::Conflict(format!("Job already {}", job.status)));
    }

    if !state.runner.cancel(&id) {
        // Not running here; write the outcome directly.
        state.publisher.finish(&id, JobOutcome::Cancelled).await?;
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(CancelResponse {
            id,
            cancelled: true,
        }),
    ))
}

/// Build the jobs router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/stream", get(stream_job))
}

/// Routes that create and cancel simulated jobs.
pub fn demo_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", post(create_job))
        .route("/jobs/{id}/cancel", post(cancel_job))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use sponge_core::{MemoryEventBus, MemoryJobStore, MemoryStateCache};
    use sponge_types::{JobResult, JobStatus, ProgressEvent, SseParser};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(state: Arc<AppState>) -> Router {
        crate::routes::api_routes(state)
    }

    fn demo_state() -> Arc<AppState> {
        AppState::new(
            Arc::new(MemoryStateCache::default()),
            Arc::new(MemoryEventBus::new()),
            Arc::new(MemoryJobStore::new()),
            StreamConfig::default(),
            Some(Duration::ZERO),
        )
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn decode_all(text: &str) -> Vec<StreamEvent> {
        SseParser::new()
            .feed(text.as_bytes())
            .iter()
            .map(|frame| StreamEvent::from_frame(frame).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_get_job_not_found() {
        let response = get(app(AppState::in_memory()), "/api/jobs/nope").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, r#"{"error":"Job not found"}"#);
    }

    #[tokio::test]
    async fn test_get_job_includes_cached_progress() {
        let state = AppState::in_memory();
        state.store().insert(Job::new("j1", "https://example.com")).await.unwrap();
        state
            .publisher
            .publish(ProgressEvent::new("j1", JobStatus::Extracting, "Fetching").with_counts(3, 7))
            .await;

        let response = get(app(state), "/api/jobs/j1").await;
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot: JobSnapshot = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(snapshot.status, JobStatus::Pending);
        let progress = snapshot.progress.unwrap();
        assert_eq!(progress.completed, Some(3));
        assert_eq!(progress.total, Some(7));
        assert!(snapshot.result.is_none());
    }

    #[tokio::test]
    async fn test_stream_unknown_job_is_404_error_frame() {
        let response = get(app(AppState::in_memory()), "/api/jobs/nope/stream").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(
            decode_all(&body_string(response).await),
            vec![StreamEvent::error("Job not found")]
        );
    }

    #[tokio::test]
    async fn test_stream_terminal_job_sends_complete_and_ends() {
        let state = AppState::in_memory();
        state.store().insert(Job::new("j1", "https://example.com")).await.unwrap();
        let result = JobResult {
            total_pages: 10,
            pages_processed: 9,
            pages_failed: 1,
            ..Default::default()
        };
        state
            .publisher
            .finish("j1", JobOutcome::Completed(result.clone()))
            .await
            .unwrap();

        let response = get(app(state), "/api/jobs/j1/stream").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(response.headers()["x-accel-buffering"], "no");

        let events = decode_all(&body_string(response).await);
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Complete(snapshot) => {
                assert_eq!(snapshot.status, JobStatus::Completed);
                assert_eq!(snapshot.result.as_ref(), Some(&result));
            }
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stream_forwards_live_progress() {
        let state = AppState::in_memory();
        state.store().insert(Job::new("j1", "https://example.com")).await.unwrap();
        state
            .publisher
            .publish(ProgressEvent::new("j1", JobStatus::Discovering, "Analyzing website structure..."))
            .await;

        let response = get(app(state.clone()), "/api/jobs/j1/stream").await;
        let mut body = response.into_body().into_data_stream();
        let mut parser = SseParser::new();

        let first = body.next().await.unwrap().unwrap();
        let frames = parser.feed(&first);
        assert_eq!(frames[0].event.as_deref(), Some("progress"));

        state
            .publisher
            .finish("j1", JobOutcome::Cancelled)
            .await
            .unwrap();

        let mut last = None;
        while let Some(chunk) = body.next().await {
            for frame in parser.feed(&chunk.unwrap()) {
                last = Some(StreamEvent::from_frame(&frame).unwrap());
            }
        }
        match last {
            Some(StreamEvent::Complete(snapshot)) => assert_eq!(snapshot.status, JobStatus::Cancelled),
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_demo_routes_hidden_without_demo_mode() {
        let response = post_json(
            app(AppState::in_memory()),
            "/api/jobs",
            serde_json::json!({"url": "https://example.com"}),
        )
        .await;
        assert!(response.status().is_client_error());
        assert_ne!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_demo_job_runs_to_completion_over_stream() {
        let state = demo_state();
        let response = post_json(
            app(state.clone()),
            "/api/jobs",
            serde_json::json!({"url": "https://docs.example.com"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: JobSnapshot = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(created.status, JobStatus::Pending);

        let response = get(app(state), &format!("/api/jobs/{}/stream", created.id)).await;
        let events = decode_all(&body_string(response).await);
        match events.last() {
            Some(StreamEvent::Complete(snapshot)) => {
                assert_eq!(snapshot.status, JobStatus::Completed);
                assert_eq!(snapshot.result.as_ref().unwrap().total_pages, crate::demo::DEMO_PAGES);
            }
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_job_rejects_bad_url() {
        let response = post_json(
            app(demo_state()),
            "/api/jobs",
            serde_json::json!({"url": "ftp://example.com"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cancel_statuses() {
        let state = demo_state();
        state.store().insert(Job::new("idle", "https://example.com")).await.unwrap();

        let response = post_json(app(state.clone()), "/api/jobs/idle/cancel", serde_json::json!({})).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            state.store().get("idle").await.unwrap().unwrap().status,
            JobStatus::Cancelled
        );

        let response = post_json(app(state.clone()), "/api/jobs/idle/cancel", serde_json::json!({})).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = post_json(app(state), "/api/jobs/nope/cancel", serde_json::json!({})).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
