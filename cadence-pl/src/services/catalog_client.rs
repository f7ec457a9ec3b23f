//! Music catalog client
//!
//! [`CatalogService`] is the pipeline's view of the music catalog: track and
//! artist search, artist top tracks, track detail and playlist creation.
//! [`SpotifyClient`] implements it against the Spotify Web API.
//!
//! Authentication uses either a configured user access token or an app token
//! obtained with the client-credentials grant. App tokens can only read; the
//! playlist operations need a user token.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::models::{RecordingCode, Track};

use super::tempo_source::{build_http_client, rate_limiter, DirectRateLimiter, SourceError};

pub const SPOTIFY_API_BASE_URL: &str = "https://api.spotify.com/v1";
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Largest `limit` the search endpoint accepts
pub const MAX_SEARCH_LIMIT: usize = 50;
/// Most URIs accepted by one add-tracks call
pub const MAX_ADD_BATCH: usize = 100;

const REQUESTS_PER_SECOND: u32 = 10;
/// Refresh app tokens this long before they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Catalog artist (only the fields used here)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogArtist {
    pub id: String,
    pub name: String,
}

/// Music catalog operations used by the pipeline
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Free-text track search, at most `limit` tracks
    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>, SourceError>;

    /// Artist search (`query` may carry field filters such as `genre:"rock"`)
    async fn search_artists(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CatalogArtist>, SourceError>;

    /// An artist's top tracks in `market`
    async fn artist_top_tracks(
        &self,
        artist_id: &str,
        market: &str,
    ) -> Result<Vec<Track>, SourceError>;

    /// Full track detail
    async fn get_track(&self, track_id: &str) -> Result<Track, SourceError>;

    /// Create a playlist owned by `user_id`, returning its id
    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        public: bool,
        description: &str,
    ) -> Result<String, SourceError>;

    /// Append `uris` (at most [`MAX_ADD_BATCH`]) to a playlist
    async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SourceError>;
}

/// How the client authenticates
#[derive(Debug, Clone)]
pub enum CatalogAuth {
    /// Pre-issued user access token
    AccessToken(String),
    /// Client-credentials grant (read-only app token)
    ClientCredentials {
        client_id: String,
        client_secret: String,
        token_url: String,
    },
}

// ============================================================================
// Spotify wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SpotifyArtistRef {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SpotifyExternalIds {
    isrc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: Option<String>,
    uri: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtistRef>,
    #[serde(default)]
    external_ids: SpotifyExternalIds,
}

impl SpotifyTrack {
    /// Local tracks and unavailable items lack an id or URI and are skipped
    fn into_track(self) -> Option<Track> {
        let catalog_id = self.id?;
        let uri = self.uri?;
        let recording_code = self.external_ids.isrc.as_deref().and_then(RecordingCode::parse);

        Some(Track {
            catalog_id,
            uri,
            title: self.name,
            primary_artist: self.artists.into_iter().find_map(|a| a.name),
            recording_code,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<Option<T>>,
}

#[derive(Debug, Deserialize)]
struct TrackSearchResponse {
    tracks: Page<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct ArtistSearchResponse {
    artists: Page<CatalogArtist>,
}

#[derive(Debug, Deserialize)]
struct TopTracksResponse {
    #[serde(default)]
    tracks: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct CreatedPlaylist {
    id: String,
}

#[derive(Debug, Serialize)]
struct CreatePlaylistBody<'a> {
    name: &'a str,
    public: bool,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct AddTracksBody<'a> {
    uris: &'a [String],
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

fn tracks_from(items: impl IntoIterator<Item = SpotifyTrack>) -> Vec<Track> {
    items.into_iter().filter_map(SpotifyTrack::into_track).collect()
}

// ============================================================================
// Client
// ============================================================================

/// Spotify Web API client
pub struct SpotifyClient {
    http_client: reqwest::Client,
    rate_limiter: DirectRateLimiter,
    base_url: reqwest::Url,
    auth: CatalogAuth,
    app_token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    /// Create new Spotify client
    pub fn new(
        base_url: impl Into<String>,
        auth: CatalogAuth,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        // Safe: constant is non-zero
        let per_second = NonZeroU32::new(REQUESTS_PER_SECOND).unwrap();

        let base_url = base_url.into();
        let base_url = reqwest::Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| SourceError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::InvalidUrl(base_url.to_string()));
        }

        Ok(Self {
            http_client: build_http_client(timeout)?,
            rate_limiter: rate_limiter(per_second),
            base_url,
            auth,
            app_token: Mutex::new(None),
        })
    }

    /// Bearer token for the next request
    async fn bearer_token(&self) -> Result<String, SourceError> {
        let (client_id, client_secret, token_url) = match &self.auth {
            CatalogAuth::AccessToken(token) => return Ok(token.clone()),
            CatalogAuth::ClientCredentials {
                client_id,
                client_secret,
                token_url,
            } => (client_id, client_secret, token_url),
        };

        let mut cached = self.app_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!(token_url = %token_url, "Requesting catalog app token");

        let response = self
            .http_client
            .post(token_url.as_str())
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| SourceError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::ApiError(status.as_u16(), error_text));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SourceError::ParseError(e.to_string()))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }

    /// Send an authenticated request and map error statuses
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, SourceError> {
        self.rate_limiter.until_ready().await;
        let token = self.bearer_token().await?;

        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SourceError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status.as_u16() == 429 {
            return Err(SourceError::RateLimitExceeded);
        }

        if status.as_u16() == 404 {
            let url = response.url().to_string();
            return Err(SourceError::NotFound(url));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::ApiError(status.as_u16(), error_text));
        }

        Ok(response)
    }

    /// Base URL with `segments` appended, each percent-encoded as one segment
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, SourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
        params: &[(&str, &str)],
    ) -> Result<T, SourceError> {
        let url = self.endpoint(segments)?;
        tracing::debug!(url = %url, params = ?params, "Querying catalog API");

        let response = self.send(self.http_client.get(url).query(params)).await?;
        response
            .json()
            .await
            .map_err(|e| SourceError::ParseError(e.to_string()))
    }

    async fn search<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        kind: &str,
        limit: usize,
    ) -> Result<T, SourceError> {
        let limit = limit.min(MAX_SEARCH_LIMIT).to_string();
        self.get_json(&["search"], &[("q", query), ("type", kind), ("limit", limit.as_str())])
            .await
    }
}

#[async_trait]
impl CatalogService for SpotifyClient {
    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>, SourceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let body: TrackSearchResponse = self.search(query, "track", limit).await?;
        Ok(tracks_from(body.tracks.items.into_iter().flatten()))
    }

    async fn search_artists(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CatalogArtist>, SourceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let body: ArtistSearchResponse = self.search(query, "artist", limit).await?;
        Ok(body.artists.items.into_iter().flatten().collect())
    }

    async fn artist_top_tracks(
        &self,
        artist_id: &str,
        market: &str,
    ) -> Result<Vec<Track>, SourceError> {
        let body: TopTracksResponse = self
            .get_json(&["artists", artist_id, "top-tracks"], &[("market", market)])
            .await?;
        Ok(tracks_from(body.tracks))
    }

    async fn get_track(&self, track_id: &str) -> Result<Track, SourceError> {
        let body: SpotifyTrack = self.get_json(&["tracks", track_id], &[]).await?;
        body.into_track()
            .ok_or_else(|| SourceError::ParseError(format!("track {} has no id or uri", track_id)))
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        public: bool,
        description: &str,
    ) -> Result<String, SourceError> {
        let url = self.endpoint(&["users", user_id, "playlists"])?;
        tracing::debug!(url = %url, name = %name, public, "Creating playlist");

        let body = CreatePlaylistBody {
            name,
            public,
            description,
        };
        let response = self.send(self.http_client.post(url).json(&body)).await?;

        let created: CreatedPlaylist = response
            .json()
            .await
            .map_err(|e| SourceError::ParseError(e.to_string()))?;
        Ok(created.id)
    }

    async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SourceError> {
        if uris.len() > MAX_ADD_BATCH {
            return Err(SourceError::ApiError(
                400,
                format!("at most {} tracks per call, got {}", MAX_ADD_BATCH, uris.len()),
            ));
        }

        let url = self.endpoint(&["playlists", playlist_id, "tracks"])?;
        tracing::debug!(url = %url, count = uris.len(), "Adding tracks to playlist");

        self.send(self.http_client.post(url).json(&AddTracksBody { uris }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = SpotifyClient::new(
            SPOTIFY_API_BASE_URL,
            CatalogAuth::AccessToken("token".into()),
            Duration::from_secs(10),
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_track_mapping() {
        let body = r#"{
            "id": "4cOdK2wGLETKBW3PvgPWqT",
            "uri": "spotify:track:4cOdK2wGLETKBW3PvgPWqT",
            "name": "Everlong",
            "artists": [{"id": "7jy3rLJdDQY21OgRLCZ9sD", "name": "Foo Fighters"}],
            "external_ids": {"isrc": "usrw29600011"}
        }"#;
        let track = serde_json::from_str::<SpotifyTrack>(body)
            .unwrap()
            .into_track()
            .unwrap();

        assert_eq!(track.catalog_id, "4cOdK2wGLETKBW3PvgPWqT");
        assert_eq!(track.title, "Everlong");
        assert_eq!(track.primary_artist.as_deref(), Some("Foo Fighters"));
        assert_eq!(
            track.recording_code.as_ref().map(|c| c.as_str()),
            Some("USRW29600011")
        );
    }

    #[test]
    fn test_malformed_isrc_is_dropped() {
        let body = r#"{"id": "a", "uri": "spotify:track:a", "name": "x",
                       "external_ids": {"isrc": "not-an-isrc"}}"#;
        let track = serde_json::from_str::<SpotifyTrack>(body)
            .unwrap()
            .into_track()
            .unwrap();
        assert!(!track.has_recording_code());
        assert_eq!(track.primary_artist, None);
    }

    #[test]
    fn test_search_page_skips_null_items() {
        let body = r#"{"tracks": {"items": [
            null,
            {"id": "a", "uri": "spotify:track:a", "name": "A"},
            {"id": null, "uri": null, "name": "local file"}
        ]}}"#;
        let parsed: TrackSearchResponse = serde_json::from_str(body).unwrap();
        let tracks = tracks_from(parsed.tracks.items.into_iter().flatten());
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].catalog_id, "a");
    }

    #[test]
    fn test_artist_search_parsing() {
        let body = r#"{"artists": {"items": [{"id": "1", "name": "Muse", "genres": ["rock"]}]}}"#;
        let parsed: ArtistSearchResponse = serde_json::from_str(body).unwrap();
        let artists: Vec<CatalogArtist> = parsed.artists.items.into_iter().flatten().collect();
        assert_eq!(
            artists,
            vec![CatalogArtist {
                id: "1".into(),
                name: "Muse".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_oversized_batch_rejected_without_request() {
        let client = SpotifyClient::new(
            "http://127.0.0.1:9",
            CatalogAuth::AccessToken("token".into()),
            Duration::from_millis(100),
        )
        .unwrap();

        let uris: Vec<String> = (0..101).map(|i| format!("spotify:track:{}", i)).collect();
        let result = client.add_tracks_to_playlist("p", &uris).await;
        assert!(matches!(result, Err(SourceError::ApiError(400, _))));
    }

    #[test]
    fn test_endpoint_escapes_path_segments() {
        let client = SpotifyClient::new(
            "http://127.0.0.1:9/v1/",
            CatalogAuth::AccessToken("token".into()),
            Duration::from_millis(100),
        )
        .unwrap();

        let url = client.endpoint(&["users", "a/b?c", "playlists"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9/v1/users/a%2Fb%3Fc/playlists");

        let url = client.endpoint(&["search"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9/v1/search");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = SpotifyClient::new(
            "not a url",
            CatalogAuth::AccessToken("token".into()),
            Duration::from_millis(100),
        );
        assert!(matches!(result, Err(SourceError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_zero_limit_search_is_empty() {
        let client = SpotifyClient::new(
            "http://127.0.0.1:9",
            CatalogAuth::AccessToken("token".into()),
            Duration::from_millis(100),
        )
        .unwrap();

        assert!(client.search_tracks("x", 0).await.unwrap().is_empty());
        assert!(client.search_artists("x", 0).await.unwrap().is_empty());
    }
}
