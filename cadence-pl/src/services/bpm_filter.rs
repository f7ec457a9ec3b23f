//! Tempo band filter
//!
//! Resolves each candidate's tempo, preferring the octave that lands in the
//! requested band, and keeps every track with a resolved tempo. The others are
//! counted by why they were rejected.

use futures::stream::{self, StreamExt};
use std::sync::Arc;

use crate::models::{FilterStats, TempoBand, Track};

use super::tempo_resolver::TempoResolver;

/// Why a candidate did or did not make it through the filter
#[derive(Debug, Clone, Copy, PartialEq)]
enum Verdict {
    MissingIdentifier,
    LookupFailed,
    Kept(f64),
}

/// Result of one filter pass
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// `(uri, bpm)` of kept tracks, in input order
    pub kept: Vec<(String, f64)>,
    pub stats: FilterStats,
}

/// Applies the [`TempoResolver`] to candidate tracks
pub struct BpmFilter {
    resolver: Arc<TempoResolver>,
    concurrency: usize,
}

impl BpmFilter {
    /// `concurrency` bounds simultaneous resolutions (at least 1)
    pub fn new(resolver: Arc<TempoResolver>, concurrency: usize) -> Self {
        Self {
            resolver,
            concurrency: concurrency.max(1),
        }
    }

    /// Keep the tracks whose tempo resolves, normalized toward `[min_bpm, max_bpm]`
    ///
    /// A plausible tempo outside the band is still kept; the band only steers
    /// octave correction.
    pub async fn filter(&self, tracks: &[Track], min_bpm: f64, max_bpm: f64) -> FilterOutcome {
        let band = TempoBand::new(min_bpm, max_bpm);

        let lookups: Vec<_> = tracks.iter().map(|track| self.judge(track, band)).collect();
        let verdicts: Vec<Verdict> = stream::iter(lookups)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut stats = FilterStats {
            total_input: tracks.len(),
            ..Default::default()
        };
        let mut kept = Vec::new();

        for (track, verdict) in tracks.iter().zip(verdicts) {
            match verdict {
                Verdict::MissingIdentifier => stats.missing_identifier += 1,
                Verdict::LookupFailed => stats.lookup_failed += 1,
                Verdict::Kept(bpm) => {
                    stats.kept += 1;
                    kept.push((track.uri.clone(), bpm));
                }
            }
        }

        FilterOutcome { kept, stats }
    }

    async fn judge(&self, track: &Track, band: Option<TempoBand>) -> Verdict {
        let Some(code) = track.recording_code.as_ref() else {
            return Verdict::MissingIdentifier;
        };

        let resolved = self
            .resolver
            .resolve(
                Some(code),
                Some(track.title.as_str()),
                track.primary_artist.as_deref(),
                band,
            )
            .await;

        match resolved {
            Some(bpm) => {
                if !band.is_some_and(|band| band.contains(bpm)) {
                    tracing::debug!(
                        track = %track.catalog_id,
                        isrc = %code,
                        bpm,
                        "Kept tempo outside band"
                    );
                }
                Verdict::Kept(bpm)
            }
            None => Verdict::LookupFailed,
        }
    }
}
