// crates/client/src/config.rs
use std::time::Duration;

/// Stream client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server origin, e.g. `http://127.0.0.1:47892`.
    pub base_url: String,
    /// Inactivity window after which a stream counts as stalled.
    pub stall_window: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            stall_window: Duration::from_secs(300),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }

    pub fn with_stall_window(mut self, window: Duration) -> Self {
        self.stall_window = window;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn job_url(&self, job_id: &str) -> String {
        format!("{}/api/jobs/{}", self.base_url, job_id)
    }

    pub fn stream_url(&self, job_id: &str) -> String {
        format!("{}/api/jobs/{}/stream", self.base_url, job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_strip_trailing_slash() {
        let config = ClientConfig::new("http://localhost:47892/");
        assert_eq!(config.job_url("j1"), "http://localhost:47892/api/jobs/j1");
        assert_eq!(config.stream_url("j1"), "http://localhost:47892/api/jobs/j1/stream");
        assert_eq!(config.stall_window, Duration::from_secs(300));
    }
}
