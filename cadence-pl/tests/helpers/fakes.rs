//! In-memory fakes of the external services

use async_trait::async_trait;
use cadence_pl::models::{RecordingCode, Track};
use cadence_pl::services::{
    CatalogArtist, CatalogService, SourceError, TempoLookup, TempoSource,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Well-formed recording code `GBTST` + seven digits
pub fn isrc(n: u32) -> String {
    format!("GBTST{:07}", n)
}

/// Track with an optional recording code
pub fn track(id: &str, code: Option<&str>) -> Track {
    Track {
        catalog_id: id.to_string(),
        uri: format!("spotify:track:{}", id),
        title: format!("Song {}", id),
        primary_artist: Some("Test Artist".to_string()),
        recording_code: code.and_then(RecordingCode::parse),
    }
}

/// Playlist creation call as seen by the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPlaylist {
    pub user_id: String,
    pub name: String,
    pub public: bool,
    pub description: String,
}

/// Scriptable catalog that records playlist writes
#[derive(Default)]
pub struct FakeCatalog {
    pub track_searches: HashMap<String, Vec<Track>>,
    pub artist_searches: HashMap<String, Vec<CatalogArtist>>,
    pub top_tracks: HashMap<String, Vec<Track>>,
    /// Detail responses for `get_track`; unknown ids fail
    pub track_details: HashMap<String, Track>,
    pub fail_create: bool,
    /// Delay applied to every search
    pub search_delay: Option<Duration>,
    pub created: Mutex<Vec<CreatedPlaylist>>,
    pub added: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeCatalog {
    pub fn created(&self) -> Vec<CreatedPlaylist> {
        self.created.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<(String, Vec<String>)> {
        self.added.lock().unwrap().clone()
    }

    pub fn added_uris(&self) -> Vec<String> {
        self.batches().into_iter().flat_map(|(_, uris)| uris).collect()
    }

    async fn delay(&self) {
        if let Some(d) = self.search_delay {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl CatalogService for FakeCatalog {
    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>, SourceError> {
        self.delay().await;
        Ok(self
            .track_searches
            .get(query)
            .map(|t| t.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn search_artists(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CatalogArtist>, SourceError> {
        self.delay().await;
        Ok(self
            .artist_searches
            .get(query)
            .map(|a| a.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn artist_top_tracks(
        &self,
        artist_id: &str,
        _market: &str,
    ) -> Result<Vec<Track>, SourceError> {
        Ok(self.top_tracks.get(artist_id).cloned().unwrap_or_default())
    }

    async fn get_track(&self, track_id: &str) -> Result<Track, SourceError> {
        self.track_details
            .get(track_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(track_id.to_string()))
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        public: bool,
        description: &str,
    ) -> Result<String, SourceError> {
        if self.fail_create {
            return Err(SourceError::ApiError(403, "Insufficient client scope".into()));
        }

        let mut created = self.created.lock().unwrap();
        created.push(CreatedPlaylist {
            user_id: user_id.to_string(),
            name: name.to_string(),
            public,
            description: description.to_string(),
        });
        Ok(format!("playlist-{}", created.len()))
    }

    async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SourceError> {
        assert!(uris.len() <= 100, "batch of {} exceeds catalog limit", uris.len());
        self.added
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), uris.to_vec()));
        Ok(())
    }
}

/// Tempo source answering from a fixed ISRC → BPM table
pub struct TableTempoSource {
    name: &'static str,
    table: HashMap<String, f64>,
    calls: AtomicUsize,
}

impl TableTempoSource {
    pub fn new(name: &'static str, table: &[(String, f64)]) -> Self {
        Self {
            name,
            table: table.iter().cloned().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TempoSource for TableTempoSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_tempo(&self, lookup: &TempoLookup) -> Result<Option<f64>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.table.get(lookup.recording_code.as_str()).copied())
    }
}
