//! Playlist build tuning parameters
//!
//! Defaults come from the `[tuning]` section of the config file; individual
//! requests may override any subset via [`TuningOverrides`].

use serde::{Deserialize, Serialize};

/// Tuning options for one playlist build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistTuning {
    /// Artists kept per `genre:` query (default: 10)
    #[serde(default = "default_artists_per_genre")]
    pub artists_per_genre: usize,

    /// Top tracks kept per artist (default: 3)
    #[serde(default = "default_tracks_per_artist")]
    pub tracks_per_artist: usize,

    /// Track limit for free-text queries (default: 15)
    #[serde(default = "default_per_query_track_limit")]
    pub per_query_track_limit: usize,

    /// Market code for artist top tracks (default: "US")
    #[serde(default = "default_market")]
    pub market: String,

    /// Randomize artist selection, top tracks and the final order (default: true)
    #[serde(default = "default_true")]
    pub shuffle: bool,

    /// Maximum tracks added to the playlist (default: 100)
    #[serde(default = "default_max_total_tracks")]
    pub max_total_tracks: usize,

    /// Fall back to unfiltered candidates when too few tracks match (default: true)
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,

    /// Kept-track count below which the fallback triggers (default: 15)
    #[serde(default = "default_fallback_threshold")]
    pub fallback_threshold: usize,

    /// Concurrent tempo lookups and track enrichments (default: 4)
    #[serde(default = "default_resolve_concurrency")]
    pub resolve_concurrency: usize,

    /// Overall deadline for one build in seconds (default: 300)
    #[serde(default = "default_run_deadline_secs")]
    pub run_deadline_secs: u64,
}

impl Default for PlaylistTuning {
    fn default() -> Self {
        Self {
            artists_per_genre: default_artists_per_genre(),
            tracks_per_artist: default_tracks_per_artist(),
            per_query_track_limit: default_per_query_track_limit(),
            market: default_market(),
            shuffle: true,
            max_total_tracks: default_max_total_tracks(),
            fallback_enabled: true,
            fallback_threshold: default_fallback_threshold(),
            resolve_concurrency: default_resolve_concurrency(),
            run_deadline_secs: default_run_deadline_secs(),
        }
    }
}

/// Per-request overrides; unset fields keep the configured default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TuningOverrides {
    pub artists_per_genre: Option<usize>,
    pub tracks_per_artist: Option<usize>,
    pub per_query_track_limit: Option<usize>,
    pub market: Option<String>,
    pub shuffle: Option<bool>,
    pub max_total_tracks: Option<usize>,
    pub fallback_enabled: Option<bool>,
    pub fallback_threshold: Option<usize>,
}

impl TuningOverrides {
    pub fn apply(&self, base: &PlaylistTuning) -> PlaylistTuning {
        PlaylistTuning {
            artists_per_genre: self.artists_per_genre.unwrap_or(base.artists_per_genre),
            tracks_per_artist: self.tracks_per_artist.unwrap_or(base.tracks_per_artist),
            per_query_track_limit: self
                .per_query_track_limit
                .unwrap_or(base.per_query_track_limit),
            market: self.market.clone().unwrap_or_else(|| base.market.clone()),
            shuffle: self.shuffle.unwrap_or(base.shuffle),
            max_total_tracks: self.max_total_tracks.unwrap_or(base.max_total_tracks),
            fallback_enabled: self.fallback_enabled.unwrap_or(base.fallback_enabled),
            fallback_threshold: self.fallback_threshold.unwrap_or(base.fallback_threshold),
            resolve_concurrency: base.resolve_concurrency,
            run_deadline_secs: base.run_deadline_secs,
        }
    }
}

fn default_artists_per_genre() -> usize {
    10
}

fn default_tracks_per_artist() -> usize {
    3
}

fn default_per_query_track_limit() -> usize {
    15
}

fn default_market() -> String {
    "US".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_total_tracks() -> usize {
    100
}

fn default_fallback_threshold() -> usize {
    15
}

fn default_resolve_concurrency() -> usize {
    4
}

fn default_run_deadline_secs() -> u64 {
    300
}
