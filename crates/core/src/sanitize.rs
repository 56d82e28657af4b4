// crates/core/src/sanitize.rs
//! User-facing job error messages.
//!
//! Messages that mention a known, user-actionable condition are shown as-is
//! (truncated); anything that looks like an internal failure is replaced with
//! a generic message. The raw message stays in the job store and the logs.

/// Shown in place of errors that are not safe to expose.
pub const GENERIC_JOB_ERROR: &str = "Something went wrong during generation. Please try again.";

const MAX_ERROR_CHARS: usize = 300;

const SAFE_PHRASES: &[&str] = &[
    "rate limit",
    "timed out",
    "timeout",
    "not found",
    "not set",
    "api key",
    "ssrf",
    "security",
    "exceeded",
    "please try",
    "too many",
    "unavailable",
];

/// Return the user-safe form of a raw job error, or `None` for no error.
pub fn sanitize_error(raw: Option<&str>) -> Option<String> {
    let raw = raw.filter(|s| !s.is_empty())?;
    let lower = raw.to_lowercase();
    if SAFE_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        Some(raw.chars().take(MAX_ERROR_CHARS).collect())
    } else {
        Some(GENERIC_JOB_ERROR.to_string())
    }
}
