//! cadence-pl library interface
//!
//! Builds tempo-targeted playlists: candidate tracks are collected from the
//! music catalog, their tempos resolved through cached third-party lookups
//! with octave correction toward the requested BPM band, and the tracks with
//! a known tempo written to a new playlist.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult, PipelineError};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::models::PlaylistTuning;
use crate::services::PlaylistPipeline;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Pipeline shared by all requests (owns the tempo cache handle)
    pub pipeline: Arc<PlaylistPipeline>,
    /// Tuning applied when a request carries no overrides
    pub default_tuning: Arc<PlaylistTuning>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: Arc<PlaylistPipeline>, default_tuning: PlaylistTuning) -> Self {
        Self {
            pipeline,
            default_tuning: Arc::new(default_tuning),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::playlist_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
