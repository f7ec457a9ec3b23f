//! Playlist build request and result types

use serde::{Deserialize, Serialize};

use super::tempo::TempoBand;

/// One `build playlist` invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Catalog user that will own the playlist
    pub user_id: String,
    /// Playlist name
    pub name: String,
    /// Raw candidate queries (`genre:`, `artist:` or free text)
    pub queries: Vec<String>,
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// Playlist description, capped at [`MAX_DESCRIPTION_CHARS`]
    pub description: String,
    pub public: bool,
}

/// Longest description the catalog accepts
pub const MAX_DESCRIPTION_CHARS: usize = 290;

impl BuildRequest {
    /// Requested tempo band, `None` when the bounds are invalid
    pub fn band(&self) -> Option<TempoBand> {
        TempoBand::new(self.min_bpm, self.max_bpm)
    }
}

/// Tempo filter counters for one pipeline run
///
/// Every input track lands in exactly one of the three outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    /// Tracks handed to the filter
    pub total_input: usize,
    /// Tracks without a recording code
    pub missing_identifier: usize,
    /// Tracks whose tempo could not be resolved
    pub lookup_failed: usize,
    /// Tracks with a resolved tempo
    pub kept: usize,
}

/// Final output of one pipeline invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub playlist_id: String,
    pub added_count: usize,
    pub min_bpm: f64,
    pub max_bpm: f64,
    pub queries: Vec<String>,
    /// True when the unfiltered candidates replaced the tempo-filtered ones
    pub fell_back: bool,
    pub stats: FilterStats,
}
