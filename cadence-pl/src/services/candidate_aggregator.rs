//! Candidate aggregation
//!
//! Expands parsed queries into catalog tracks:
//! - `Genre` → artists matching `genre:"<g>"`, then their top tracks
//! - `Artist` → artists matching `artist:"<name>"`, then their top tracks
//! - `FreeText` → plain track search
//!
//! Queries are collected concurrently but concatenated in query order, then
//! deduplicated by catalog id (first occurrence wins).

use futures::future::join_all;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;

use crate::models::{CandidateQuery, PlaylistTuning, Track};

use super::catalog_client::{CatalogArtist, CatalogService};

/// Artists kept for an `artist:` query
const ARTIST_MATCH_LIMIT: usize = 3;

/// Ordered, deduplicated candidate tracks
pub type CandidatePool = Vec<Track>;

/// Shuffle in place when enabled
fn shuffle_if(enabled: bool, items: &mut [impl Sized]) {
    if enabled {
        items.shuffle(&mut rand::thread_rng());
    }
}

/// Drop repeated catalog ids, keeping the first occurrence
pub fn dedupe_by_catalog_id(tracks: Vec<Track>) -> CandidatePool {
    let mut seen = HashSet::new();
    tracks
        .into_iter()
        .filter(|t| seen.insert(t.catalog_id.clone()))
        .collect()
}

/// Collects candidate tracks from the catalog
pub struct CandidateAggregator {
    catalog: Arc<dyn CatalogService>,
}

impl CandidateAggregator {
    pub fn new(catalog: Arc<dyn CatalogService>) -> Self {
        Self { catalog }
    }

    /// Collect the candidate pool for `queries`.
    ///
    /// A failing query is logged and contributes no tracks.
    pub async fn collect(&self, queries: &[CandidateQuery], tuning: &PlaylistTuning) -> CandidatePool {
        let per_query = join_all(queries.iter().map(|q| self.collect_query(q, tuning))).await;

        let mut pool = dedupe_by_catalog_id(per_query.into_iter().flatten().collect());
        shuffle_if(tuning.shuffle, &mut pool);
        pool
    }

    async fn collect_query(&self, query: &CandidateQuery, tuning: &PlaylistTuning) -> Vec<Track> {
        let result = match query {
            CandidateQuery::FreeText(text) => self
                .catalog
                .search_tracks(text, tuning.per_query_track_limit)
                .await,
            CandidateQuery::Genre(genre) => {
                let filter = format!("genre:\"{}\"", genre);
                match self
                    .catalog
                    .search_artists(&filter, tuning.artists_per_genre * 2)
                    .await
                {
                    Ok(mut artists) => {
                        shuffle_if(tuning.shuffle, &mut artists);
                        artists.truncate(tuning.artists_per_genre);
                        Ok(self.top_tracks_for(&artists, tuning).await)
                    }
                    Err(e) => Err(e),
                }
            }
            CandidateQuery::Artist(name) => {
                let filter = format!("artist:\"{}\"", name);
                match self.catalog.search_artists(&filter, ARTIST_MATCH_LIMIT).await {
                    Ok(mut artists) => {
                        artists.truncate(ARTIST_MATCH_LIMIT);
                        Ok(self.top_tracks_for(&artists, tuning).await)
                    }
                    Err(e) => Err(e),
                }
            }
        };

        match result {
            Ok(tracks) => {
                tracing::debug!(query = %query, tracks = tracks.len(), "Query collected");
                tracks
            }
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Catalog search failed, skipping query");
                Vec::new()
            }
        }
    }

    /// Top tracks of each artist, in artist order; failing artists are skipped
    async fn top_tracks_for(&self, artists: &[CatalogArtist], tuning: &PlaylistTuning) -> Vec<Track> {
        let lookups = artists.iter().map(|artist| async move {
            match self
                .catalog
                .artist_top_tracks(&artist.id, &tuning.market)
                .await
            {
                Ok(mut tracks) => {
                    shuffle_if(tuning.shuffle, &mut tracks);
                    tracks.truncate(tuning.tracks_per_artist);
                    tracks
                }
                Err(e) => {
                    tracing::warn!(
                        artist = %artist.name,
                        artist_id = %artist.id,
                        error = %e,
                        "Top tracks lookup failed, skipping artist"
                    );
                    Vec::new()
                }
            }
        });

        join_all(lookups).await.into_iter().flatten().collect()
    }
}
