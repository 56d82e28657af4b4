// crates/client/src/api.rs
//! Point-read of a job.

use reqwest::StatusCode;
use sponge_types::JobSnapshot;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// `GET /api/jobs/{id}`.
pub async fn fetch_job(
    http: &reqwest::Client,
    config: &ClientConfig,
    job_id: &str,
) -> Result<JobSnapshot, ClientError> {
    let response = http.get(config.job_url(job_id)).send().await?;
    match response.status() {
        StatusCode::NOT_FOUND => Err(ClientError::NotFound(job_id.to_string())),
        status if status.is_success() => {
            let body = response.bytes().await?;
            Ok(serde_json::from_slice(&body)?)
        }
        status => Err(ClientError::Status {
            status: status.as_u16(),
        }),
    }
}
