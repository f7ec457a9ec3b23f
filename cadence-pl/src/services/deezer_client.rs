//! Deezer API client
//!
//! Primary tempo source: Deezer exposes a `bpm` field on its track resource,
//! addressable directly by ISRC (`/track/isrc:<code>`).
//!
//! Deezer answers unknown recordings with HTTP 200 and an `error` object, and
//! reports `bpm: 0` when it has no tempo analysis for a track.

use async_trait::async_trait;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;

use super::tempo_source::{
    build_http_client, parse_tempo_value, rate_limiter, DirectRateLimiter, SourceError,
    TempoLookup, TempoSource,
};

pub const DEEZER_BASE_URL: &str = "https://api.deezer.com";
/// Deezer allows 50 requests per 5 seconds
const REQUESTS_PER_SECOND: u32 = 10;
/// Deezer error code for quota exhaustion
const QUOTA_EXCEEDED_CODE: i64 = 4;

/// Deezer track resource (only the fields used here)
#[derive(Debug, Clone, Deserialize)]
pub struct DeezerTrack {
    pub id: Option<u64>,
    pub title: Option<String>,
    pub isrc: Option<String>,
    /// Tempo, number or absent; `0` means "not analysed"
    #[serde(default)]
    pub bpm: serde_json::Value,
}

impl DeezerTrack {
    pub fn tempo(&self) -> Option<f64> {
        parse_tempo_value(&self.bpm)
    }
}

#[derive(Debug, Deserialize)]
struct DeezerErrorBody {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
    code: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DeezerResponse {
    Error { error: DeezerErrorBody },
    Track(DeezerTrack),
}

/// Deezer API client
pub struct DeezerClient {
    http_client: reqwest::Client,
    rate_limiter: DirectRateLimiter,
    base_url: String,
}

impl DeezerClient {
    /// Create new Deezer client
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        // Safe: constant is non-zero
        let per_second = NonZeroU32::new(REQUESTS_PER_SECOND).unwrap();

        Ok(Self {
            http_client: build_http_client(timeout)?,
            rate_limiter: rate_limiter(per_second),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Lookup a track by ISRC.
    ///
    /// Returns `Ok(None)` when Deezer does not know the recording.
    pub async fn track_by_isrc(&self, isrc: &str) -> Result<Option<DeezerTrack>, SourceError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/track/isrc:{}", self.base_url, isrc);
        tracing::debug!(isrc = %isrc, url = %url, "Querying Deezer API");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status.as_u16() == 429 {
            return Err(SourceError::RateLimitExceeded);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::ApiError(status.as_u16(), error_text));
        }

        let body: DeezerResponse = response
            .json()
            .await
            .map_err(|e| SourceError::ParseError(e.to_string()))?;

        match body {
            DeezerResponse::Track(track) => Ok(Some(track)),
            DeezerResponse::Error { error } if error.code == Some(QUOTA_EXCEEDED_CODE) => {
                Err(SourceError::RateLimitExceeded)
            }
            DeezerResponse::Error { error } => {
                tracing::debug!(
                    isrc = %isrc,
                    error_type = error.error_type.as_deref().unwrap_or("unknown"),
                    message = error.message.as_deref().unwrap_or(""),
                    "Deezer has no track for ISRC"
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TempoSource for DeezerClient {
    fn name(&self) -> &'static str {
        "deezer"
    }

    async fn fetch_tempo(&self, lookup: &TempoLookup) -> Result<Option<f64>, SourceError> {
        let track = self.track_by_isrc(lookup.recording_code.as_str()).await?;
        Ok(track.and_then(|t| t.tempo()))
    }
}
