//! Playlist build pipeline
//!
//! aggregate → enrich → tempo filter → fallback → shuffle/truncate → create
//! playlist → add tracks in batches.

use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::{
    BuildRequest, CandidateQuery, PlaylistSummary, PlaylistTuning, TempoBand, Track,
    MAX_DESCRIPTION_CHARS,
};

use super::bpm_filter::BpmFilter;
use super::candidate_aggregator::CandidateAggregator;
use super::catalog_client::{CatalogService, MAX_ADD_BATCH};
use super::tempo_resolver::TempoResolver;

/// Check a request and parse its queries
pub fn validate_request(
    request: &BuildRequest,
) -> Result<(Vec<CandidateQuery>, TempoBand), PipelineError> {
    if request.user_id.trim().is_empty() {
        return Err(PipelineError::InvalidRequest("user_id must not be empty".into()));
    }

    if request.name.trim().is_empty() {
        return Err(PipelineError::InvalidRequest("name must not be empty".into()));
    }

    if !(request.min_bpm > 0.0 && request.max_bpm > 0.0) {
        return Err(PipelineError::InvalidRequest(format!(
            "BPM bounds must be positive, got {}-{}",
            request.min_bpm, request.max_bpm
        )));
    }

    let band = request.band().ok_or_else(|| {
        PipelineError::InvalidRequest(format!(
            "min_bpm must not exceed max_bpm, got {}-{}",
            request.min_bpm, request.max_bpm
        ))
    })?;

    let queries = CandidateQuery::parse_all(&request.queries);
    if queries.is_empty() {
        return Err(PipelineError::InvalidRequest(
            "at least one non-blank query is required".into(),
        ));
    }

    Ok((queries, band))
}

/// Description sent to the catalog: capped, with the fallback tag appended
/// only when it still fits.
pub fn playlist_description(description: &str, fell_back: bool, band: TempoBand) -> String {
    let mut text: String = description.chars().take(MAX_DESCRIPTION_CHARS).collect();

    if fell_back {
        let tag = format!(
            " [Fallback used: insufficient BPM matches for {}-{}]",
            band.min, band.max
        );
        if text.chars().count() + tag.chars().count() <= MAX_DESCRIPTION_CHARS {
            text.push_str(&tag);
        }
    }

    text
}

fn shuffle_if(enabled: bool, uris: &mut [String]) {
    if enabled {
        uris.shuffle(&mut rand::thread_rng());
    }
}

/// Orchestrates one playlist build end to end
pub struct PlaylistPipeline {
    catalog: Arc<dyn CatalogService>,
    aggregator: CandidateAggregator,
    resolver: Arc<TempoResolver>,
}

impl PlaylistPipeline {
    pub fn new(catalog: Arc<dyn CatalogService>, resolver: Arc<TempoResolver>) -> Self {
        Self {
            aggregator: CandidateAggregator::new(catalog.clone()),
            catalog,
            resolver,
        }
    }

    pub fn resolver(&self) -> &Arc<TempoResolver> {
        &self.resolver
    }

    /// Build a playlist for `request`.
    ///
    /// Tempo lookups never fail the build; playlist creation and track
    /// addition do. The whole run is bounded by `tuning.run_deadline_secs`.
    pub async fn build(
        &self,
        request: &BuildRequest,
        tuning: &PlaylistTuning,
    ) -> Result<PlaylistSummary, PipelineError> {
        let (queries, band) = validate_request(request)?;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("playlist_build", run_id = %run_id, user_id = %request.user_id);
        let deadline = Duration::from_secs(tuning.run_deadline_secs);

        tokio::time::timeout(
            deadline,
            self.run(request, &queries, band, tuning).instrument(span),
        )
        .await
        .map_err(|_| {
            tracing::warn!(run_id = %run_id, deadline_secs = tuning.run_deadline_secs, "Playlist build timed out");
            PipelineError::DeadlineExceeded(deadline)
        })?
    }

    async fn run(
        &self,
        request: &BuildRequest,
        queries: &[CandidateQuery],
        band: TempoBand,
        tuning: &PlaylistTuning,
    ) -> Result<PlaylistSummary, PipelineError> {
        tracing::info!(
            queries = queries.len(),
            min_bpm = band.min,
            max_bpm = band.max,
            "Starting playlist build"
        );

        let candidates = self.aggregator.collect(queries, tuning).await;
        tracing::debug!(count = candidates.len(), "Candidates collected");

        let enriched = self.enrich(candidates, tuning.resolve_concurrency).await;
        tracing::debug!(
            count = enriched.len(),
            with_isrc = enriched.iter().filter(|t| t.has_recording_code()).count(),
            "Enriched tracks"
        );

        let filter = BpmFilter::new(self.resolver.clone(), tuning.resolve_concurrency);
        let outcome = filter.filter(&enriched, band.min, band.max).await;
        let stats = outcome.stats;
        tracing::debug!(
            kept = stats.kept,
            min_bpm = band.min,
            max_bpm = band.max,
            "Tempo filter done"
        );
        tracing::debug!(?stats, "Tempo filter stats");

        let mut uris: Vec<String> = outcome.kept.into_iter().map(|(uri, _)| uri).collect();
        let mut fell_back = false;

        if tuning.fallback_enabled && uris.len() < tuning.fallback_threshold {
            tracing::info!(
                kept = uris.len(),
                threshold = tuning.fallback_threshold,
                "Too few tempo matches, falling back to unfiltered candidates"
            );
            fell_back = true;
            uris = enriched.iter().map(|t| t.uri.clone()).collect();
            shuffle_if(tuning.shuffle, &mut uris);
        }

        shuffle_if(tuning.shuffle, &mut uris);
        uris.truncate(tuning.max_total_tracks);

        let description = playlist_description(&request.description, fell_back, band);
        let playlist_id = self
            .catalog
            .create_playlist(&request.user_id, &request.name, request.public, &description)
            .await
            .map_err(|source| PipelineError::Catalog {
                operation: "create playlist",
                source,
            })?;

        for batch in uris.chunks(MAX_ADD_BATCH) {
            self.catalog
                .add_tracks_to_playlist(&playlist_id, batch)
                .await
                .map_err(|source| PipelineError::Catalog {
                    operation: "add tracks",
                    source,
                })?;
        }

        tracing::info!(
            playlist_id = %playlist_id,
            added = uris.len(),
            fell_back,
            "Playlist built"
        );

        Ok(PlaylistSummary {
            playlist_id,
            added_count: uris.len(),
            min_bpm: request.min_bpm,
            max_bpm: request.max_bpm,
            queries: request.queries.clone(),
            fell_back,
            stats,
        })
    }

    /// Re-fetch tracks that lack a recording code; tracks whose re-fetch fails
    /// are dropped. Order is preserved.
    async fn enrich(&self, tracks: Vec<Track>, concurrency: usize) -> Vec<Track> {
        stream::iter(tracks)
            .map(|track| async move {
                if track.has_recording_code() {
                    return Some(track);
                }

                match self.catalog.get_track(&track.catalog_id).await {
                    Ok(full) => Some(full),
                    Err(e) => {
                        tracing::debug!(
                            track = %track.catalog_id,
                            error = %e,
                            "Track detail fetch failed, dropping track"
                        );
                        None
                    }
                }
            })
            .buffered(concurrency.max(1))
            .filter_map(|t| async move { t })
            .collect()
            .await
    }
}
