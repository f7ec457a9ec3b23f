//! Tempo source abstraction
//!
//! A tempo source answers "what is the BPM of this recording?" from one external
//! service. Sources are queried in a fixed priority order by the
//! [`TempoResolver`](super::tempo_resolver::TempoResolver).

use async_trait::async_trait;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

use crate::models::RecordingCode;
use crate::utils::TimedOut;

/// Errors shared by the external service clients (tempo sources and catalog)
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network communication error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Service rejected the request for rate limiting
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Service returned a non-success status
    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    /// Response body could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Configured endpoint is not a usable base URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Attempt exceeded the per-call timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl From<TimedOut> for SourceError {
    fn from(t: TimedOut) -> Self {
        SourceError::Timeout(t.0)
    }
}

/// What a source may use to find a recording's tempo
#[derive(Debug, Clone, PartialEq)]
pub struct TempoLookup {
    pub recording_code: RecordingCode,
    /// Track title, used by free-text sources
    pub title: Option<String>,
    /// Primary artist, used by free-text sources
    pub artist: Option<String>,
}

impl TempoLookup {
    /// `"<artist> <title>"` when both hints are present and non-blank
    pub fn search_text(&self) -> Option<String> {
        let title = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        let artist = self.artist.as_deref().map(str::trim).filter(|a| !a.is_empty())?;
        Some(format!("{} {}", artist, title))
    }
}

/// One external tempo-data service
#[async_trait]
pub trait TempoSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &'static str;

    /// Whether this source can answer `lookup` at all (no network call is made otherwise)
    fn accepts(&self, _lookup: &TempoLookup) -> bool {
        true
    }

    /// Fetch the raw tempo for `lookup`.
    ///
    /// `Ok(None)` means the service answered but has no tempo for the recording;
    /// it is final and not retried.
    async fn fetch_tempo(&self, lookup: &TempoLookup) -> Result<Option<f64>, SourceError>;
}

/// Interpret a JSON tempo field (number or numeric string); only positive finite
/// values count as a tempo.
pub fn parse_tempo_value(value: &serde_json::Value) -> Option<f64> {
    let bpm = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if bpm.is_finite() && bpm > 0.0 {
        Some(bpm)
    } else {
        None
    }
}

/// Direct (unkeyed) rate limiter shared by the HTTP clients
pub type DirectRateLimiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Build a rate limiter allowing `per_second` requests per second
pub fn rate_limiter(per_second: NonZeroU32) -> DirectRateLimiter {
    governor::RateLimiter::direct(governor::Quota::per_second(per_second))
}

pub(crate) const USER_AGENT: &str = concat!("Cadence/", env!("CARGO_PKG_VERSION"));

/// Build the shared reqwest client configuration
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| SourceError::NetworkError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tempo_value() {
        assert_eq!(parse_tempo_value(&json!(128.5)), Some(128.5));
        assert_eq!(parse_tempo_value(&json!(120)), Some(120.0));
        assert_eq!(parse_tempo_value(&json!(" 96 ")), Some(96.0));
        assert_eq!(parse_tempo_value(&json!(0)), None);
        assert_eq!(parse_tempo_value(&json!(-3.0)), None);
        assert_eq!(parse_tempo_value(&json!("fast")), None);
        assert_eq!(parse_tempo_value(&json!(null)), None);
    }

    #[test]
    fn test_search_text_requires_both_hints() {
        let mut lookup = TempoLookup {
            recording_code: RecordingCode::parse("USRC17607839").unwrap(),
            title: Some("Everlong".into()),
            artist: Some("Foo Fighters".into()),
        };
        assert_eq!(lookup.search_text().as_deref(), Some("Foo Fighters Everlong"));

        lookup.artist = Some("  ".into());
        assert_eq!(lookup.search_text(), None);

        lookup.artist = None;
        assert_eq!(lookup.search_text(), None);
    }
}
