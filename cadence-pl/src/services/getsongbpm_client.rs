//! GetSongBPM API client
//!
//! Secondary tempo source. One `/search/` endpoint serves two lookups:
//! - by ISRC (`isrc=<code>`)
//! - by free text (`type=both&lookup=<artist> <title>`)
//!
//! Both return a list of candidate songs carrying a string `tempo` field.
//! A miss is reported as `{"search": {"error": "no result"}}`.

use async_trait::async_trait;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::tempo_source::{
    build_http_client, parse_tempo_value, rate_limiter, DirectRateLimiter, SourceError,
    TempoLookup, TempoSource,
};

pub const GETSONGBPM_BASE_URL: &str = "https://api.getsongbpm.com";
const REQUESTS_PER_SECOND: u32 = 2;

/// One search hit (only the fields used here)
#[derive(Debug, Clone, Deserialize)]
pub struct SongHit {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub tempo: serde_json::Value,
}

impl SongHit {
    pub fn tempo(&self) -> Option<f64> {
        parse_tempo_value(&self.tempo)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search: serde_json::Value,
}

impl SearchResponse {
    /// Hits in response order; the "no result" object yields an empty list
    fn into_hits(self) -> Vec<SongHit> {
        match self.search {
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// First hit carrying a usable tempo
pub fn first_tempo(hits: &[SongHit]) -> Option<f64> {
    hits.iter().find_map(SongHit::tempo)
}

/// GetSongBPM API client
pub struct GetSongBpmClient {
    http_client: reqwest::Client,
    rate_limiter: DirectRateLimiter,
    base_url: String,
    api_key: String,
}

impl GetSongBpmClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        // Safe: constant is non-zero
        let per_second = NonZeroU32::new(REQUESTS_PER_SECOND).unwrap();

        Ok(Self {
            http_client: build_http_client(timeout)?,
            rate_limiter: rate_limiter(per_second),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Search songs by ISRC
    pub async fn search_by_isrc(&self, isrc: &str) -> Result<Vec<SongHit>, SourceError> {
        self.search(&[("isrc", isrc)]).await
    }

    /// Search songs by free text (`"<artist> <title>"`)
    pub async fn search_by_text(&self, text: &str) -> Result<Vec<SongHit>, SourceError> {
        self.search(&[("type", "both"), ("lookup", text)]).await
    }

    async fn search(&self, params: &[(&str, &str)]) -> Result<Vec<SongHit>, SourceError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/search/", self.base_url);
        tracing::debug!(url = %url, params = ?params, "Querying GetSongBPM API");

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
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

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::ParseError(e.to_string()))?;

        Ok(body.into_hits())
    }
}

/// Which GetSongBPM lookup a [`GetSongBpmSource`] performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    Isrc,
    Search,
}

/// [`TempoSource`] adapter over a shared [`GetSongBpmClient`]
pub struct GetSongBpmSource {
    client: Arc<GetSongBpmClient>,
    mode: LookupMode,
}

impl GetSongBpmSource {
    pub fn new(client: Arc<GetSongBpmClient>, mode: LookupMode) -> Self {
        Self { client, mode }
    }
}

#[async_trait]
impl TempoSource for GetSongBpmSource {
    fn name(&self) -> &'static str {
        match self.mode {
            LookupMode::Isrc => "getsongbpm-isrc",
            LookupMode::Search => "getsongbpm-search",
        }
    }

    fn accepts(&self, lookup: &TempoLookup) -> bool {
        match self.mode {
            LookupMode::Isrc => true,
            LookupMode::Search => lookup.search_text().is_some(),
        }
    }

    async fn fetch_tempo(&self, lookup: &TempoLookup) -> Result<Option<f64>, SourceError> {
        let hits = match self.mode {
            LookupMode::Isrc => {
                self.client
                    .search_by_isrc(lookup.recording_code.as_str())
                    .await?
            }
            LookupMode::Search => match lookup.search_text() {
                Some(text) => self.client.search_by_text(&text).await?,
                None => return Ok(None),
            },
        };

        Ok(first_tempo(&hits))
    }
}
