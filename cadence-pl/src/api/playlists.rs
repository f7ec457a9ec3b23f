//! Playlist build endpoint
//!
//! POST /build_playlist runs one pipeline build and returns its summary.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::models::{BuildRequest, PlaylistSummary, TuningOverrides};
use crate::AppState;

const DEFAULT_PLAYLIST_NAME: &str = "BPM Playlist";

/// POST /build_playlist request body
#[derive(Debug, Deserialize)]
pub struct BuildPlaylistRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub queries: Vec<String>,
    pub min_bpm: Option<f64>,
    pub max_bpm: Option<f64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub public: bool,
    /// Partial tuning overrides; unset fields keep the configured defaults
    #[serde(default)]
    pub tuning: Option<TuningOverrides>,
}

fn default_name() -> String {
    DEFAULT_PLAYLIST_NAME.to_string()
}

impl BuildPlaylistRequest {
    fn into_build_request(self) -> ApiResult<(BuildRequest, TuningOverrides)> {
        let min_bpm = self
            .min_bpm
            .ok_or_else(|| ApiError::BadRequest("min_bpm is required".into()))?;
        let max_bpm = self
            .max_bpm
            .ok_or_else(|| ApiError::BadRequest("max_bpm is required".into()))?;

        let request = BuildRequest {
            user_id: self.user_id,
            name: self.name,
            queries: self.queries,
            min_bpm,
            max_bpm,
            description: self.description,
            public: self.public,
        };

        Ok((request, self.tuning.unwrap_or_default()))
    }
}

/// POST /build_playlist
pub async fn build_playlist(
    State(state): State<AppState>,
    Json(body): Json<BuildPlaylistRequest>,
) -> ApiResult<Json<PlaylistSummary>> {
    let (request, overrides) = body.into_build_request()?;
    let tuning = overrides.apply(&state.default_tuning);

    tracing::info!(
        user_id = %request.user_id,
        queries = request.queries.len(),
        min_bpm = request.min_bpm,
        max_bpm = request.max_bpm,
        "Playlist build requested"
    );

    let summary = state.pipeline.build(&request, &tuning).await?;
    Ok(Json(summary))
}

/// Build playlist routes
pub fn playlist_routes() -> Router<AppState> {
    Router::new().route("/build_playlist", post(build_playlist))
}
