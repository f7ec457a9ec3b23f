//! Tempo resolution
//!
//! Resolves a recording's tempo from the cache, then from the configured
//! sources in priority order, normalizing octave errors toward the requested
//! tempo band. External results are written back to the cache.

use std::sync::Arc;

use crate::models::tempo::is_plausible;
use crate::models::{RecordingCode, TempoBand, MAX_VALID_BPM, MIN_VALID_BPM};
use crate::utils::RetryPolicy;

use super::tempo_cache::TempoCache;
use super::tempo_source::{TempoLookup, TempoSource};

/// Correct octave errors in a raw tempo.
///
/// 1. Values above 240 are halved, values below 40 doubled (one pass only).
/// 2. With a band, the octave candidates `{bpm/2, bpm, bpm*2}` that fall inside
///    both the band and the plausible window compete; the one closest to the
///    band midpoint wins (earlier candidate on ties).
/// 3. Otherwise the clamped value is returned if plausible, else `None`.
pub fn normalize_tempo(raw: f64, band: Option<TempoBand>) -> Option<f64> {
    if !raw.is_finite() || raw <= 0.0 {
        return None;
    }

    let bpm = if raw > MAX_VALID_BPM {
        raw / 2.0
    } else if raw < MIN_VALID_BPM {
        raw * 2.0
    } else {
        raw
    };

    if let Some(band) = band {
        let center = band.midpoint();
        let best = [bpm / 2.0, bpm, bpm * 2.0]
            .into_iter()
            .filter(|c| band.contains(*c) && is_plausible(*c))
            .min_by(|a, b| (a - center).abs().total_cmp(&(b - center).abs()));

        if best.is_some() {
            return best;
        }
    }

    if is_plausible(bpm) {
        Some(bpm)
    } else {
        None
    }
}

/// Resolves tempos through the cache and the ordered tempo sources
pub struct TempoResolver {
    cache: Arc<TempoCache>,
    sources: Vec<Arc<dyn TempoSource>>,
    retry: RetryPolicy,
}

impl TempoResolver {
    /// `sources` are consulted in the given order
    pub fn new(cache: Arc<TempoCache>, sources: Vec<Arc<dyn TempoSource>>, retry: RetryPolicy) -> Self {
        Self {
            cache,
            sources,
            retry,
        }
    }

    pub fn cache(&self) -> &Arc<TempoCache> {
        &self.cache
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Resolve the tempo of `recording_code`.
    ///
    /// `fallback_title` / `fallback_artist` enable free-text sources; `band`
    /// steers octave normalization. Never fails: source errors only remove
    /// that source's contribution.
    pub async fn resolve(
        &self,
        recording_code: Option<&RecordingCode>,
        fallback_title: Option<&str>,
        fallback_artist: Option<&str>,
        band: Option<TempoBand>,
    ) -> Option<f64> {
        let code = recording_code?;

        if let Some(cached) = self.cache.get(code).await {
            tracing::debug!(isrc = %code, bpm = cached, "Tempo cache hit");
            return normalize_tempo(cached, band);
        }

        let lookup = TempoLookup {
            recording_code: code.clone(),
            title: fallback_title.map(str::to_string),
            artist: fallback_artist.map(str::to_string),
        };

        let (source_name, raw) = self.query_sources(&lookup).await?;

        let Some(bpm) = normalize_tempo(raw, band) else {
            tracing::debug!(isrc = %code, source = source_name, raw, "Source tempo not plausible");
            return None;
        };

        tracing::debug!(isrc = %code, source = source_name, raw, bpm, "Tempo resolved");
        self.cache.set(code, bpm).await;
        Some(bpm)
    }

    /// First positive tempo from the sources, in priority order
    async fn query_sources(&self, lookup: &TempoLookup) -> Option<(&'static str, f64)> {
        for source in &self.sources {
            if !source.accepts(lookup) {
                continue;
            }

            let operation = format!("{} lookup", source.name());
            match self
                .retry
                .run(&operation, || source.fetch_tempo(lookup))
                .await
            {
                Ok(Some(bpm)) if bpm.is_finite() && bpm > 0.0 => {
                    return Some((source.name(), bpm));
                }
                Ok(_) => {
                    tracing::debug!(
                        isrc = %lookup.recording_code,
                        source = source.name(),
                        "No tempo from source"
                    );
                }
                Err(e) => {
                    tracing::debug!(
                        isrc = %lookup.recording_code,
                        source = source.name(),
                        error = %e,
                        "Tempo source failed, trying next"
                    );
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tempo_cache::MemoryStore;
    use crate::services::tempo_source::SourceError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn band(min: f64, max: f64) -> Option<TempoBand> {
        TempoBand::new(min, max)
    }

    #[test]
    fn test_normalize_idempotent_in_window() {
        for x in [40.0, 41.5, 90.0, 128.0, 200.0, 239.9, 240.0] {
            let once = normalize_tempo(x, None);
            assert_eq!(once, Some(x));
            assert_eq!(normalize_tempo(once.unwrap(), None), once);
        }
    }

    #[test]
    fn test_normalize_single_halving_above_window() {
        assert_eq!(normalize_tempo(300.0, None), Some(150.0));
        assert_eq!(normalize_tempo(480.0, None), Some(240.0));
        // One pass only: 600 halves to 300, still implausible
        assert_eq!(normalize_tempo(600.0, None), None);

        for raw in [241.0, 300.0, 481.0, 1000.0, 5000.0] {
            if let Some(v) = normalize_tempo(raw, None) {
                assert!(v <= MAX_VALID_BPM, "{} normalized to {}", raw, v);
            }
        }
    }

    #[test]
    fn test_normalize_single_doubling_below_window() {
        assert_eq!(normalize_tempo(30.0, None), Some(60.0));
        assert_eq!(normalize_tempo(15.0, None), None);
    }

    #[test]
    fn test_normalize_rejects_non_positive() {
        assert_eq!(normalize_tempo(0.0, None), None);
        assert_eq!(normalize_tempo(-120.0, band(115.0, 135.0)), None);
        assert_eq!(normalize_tempo(f64::NAN, None), None);
    }

    #[test]
    fn test_octave_up_into_band() {
        // 67.5 * 2 = 135 is the only in-band octave candidate
        assert_eq!(normalize_tempo(67.5, band(115.0, 135.0)), Some(135.0));
    }

    #[test]
    fn test_octave_down_into_band() {
        assert_eq!(normalize_tempo(170.0, band(80.0, 90.0)), Some(85.0));
    }

    #[test]
    fn test_octave_into_band_from_80() {
        // 80 doubles into [160, 175]
        assert_eq!(normalize_tempo(80.0, band(160.0, 175.0)), Some(160.0));
    }

    #[test]
    fn test_midpoint_tie_break_is_policy() {
        // 60 and 120 are both 30 away from the midpoint 90; the earlier one wins
        assert_eq!(normalize_tempo(120.0, band(50.0, 130.0)), Some(60.0));
        // Closest to midpoint otherwise
        assert_eq!(normalize_tempo(120.0, band(55.0, 130.0)), Some(120.0));
    }

    #[test]
    fn test_out_of_band_plausible_value_returned_as_is() {
        assert_eq!(normalize_tempo(100.0, band(160.0, 175.0)), Some(100.0));
    }

    #[test]
    fn test_band_beyond_window_never_exceeds_window() {
        assert_eq!(normalize_tempo(600.0, band(200.0, 500.0)), None);
    }

    /// Scripted source: fixed answer per ISRC, counts calls
    struct ScriptedSource {
        name: &'static str,
        answers: HashMap<String, Result<Option<f64>, ()>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(name: &'static str, answers: &[(&str, Result<Option<f64>, ()>)]) -> Arc<Self> {
            Arc::new(Self {
                name,
                answers: answers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TempoSource for ScriptedSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_tempo(&self, lookup: &TempoLookup) -> Result<Option<f64>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answers.get(lookup.recording_code.as_str()) {
                Some(Ok(v)) => Ok(*v),
                Some(Err(())) => Err(SourceError::ApiError(500, "boom".into())),
                None => Ok(None),
            }
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(100), 2, Duration::from_millis(1))
    }

    fn resolver(sources: Vec<Arc<dyn TempoSource>>) -> TempoResolver {
        let cache = Arc::new(TempoCache::new(Arc::new(MemoryStore::new())));
        TempoResolver::new(cache, sources, fast_retry())
    }

    fn code(s: &str) -> RecordingCode {
        RecordingCode::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_absent_code_makes_no_calls() {
        let primary = ScriptedSource::new("primary", &[]);
        let r = resolver(vec![primary.clone()]);

        assert_eq!(r.resolve(None, Some("t"), Some("a"), None).await, None);
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn test_stops_at_first_positive_source() {
        let primary = ScriptedSource::new("primary", &[("USRC17607839", Ok(Some(0.0)))]);
        let secondary = ScriptedSource::new("secondary", &[("USRC17607839", Ok(Some(128.0)))]);
        let tertiary = ScriptedSource::new("tertiary", &[("USRC17607839", Ok(Some(90.0)))]);
        let r = resolver(vec![primary.clone(), secondary.clone(), tertiary.clone()]);

        let bpm = r.resolve(Some(&code("USRC17607839")), None, None, None).await;
        assert_eq!(bpm, Some(128.0));
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
        assert_eq!(tertiary.calls(), 0);
    }

    #[tokio::test]
    async fn test_failing_source_is_retried_then_skipped() {
        let primary = ScriptedSource::new("primary", &[("USRC17607839", Err(()))]);
        let secondary = ScriptedSource::new("secondary", &[("USRC17607839", Ok(Some(128.0)))]);
        let r = resolver(vec![primary.clone(), secondary.clone()]);

        let bpm = r.resolve(Some(&code("USRC17607839")), None, None, None).await;
        assert_eq!(bpm, Some(128.0));
        assert_eq!(primary.calls(), 3); // 1 + 2 retries
    }

    #[tokio::test]
    async fn test_resolution_written_to_cache_and_reused() {
        let primary = ScriptedSource::new("primary", &[("USRC17607839", Ok(Some(67.5)))]);
        let r = resolver(vec![primary.clone()]);
        let k = code("USRC17607839");

        let first = r.resolve(Some(&k), None, None, band(115.0, 135.0)).await;
        assert_eq!(first, Some(135.0));
        assert_eq!(r.cache().get(&k).await, Some(135.0));

        let second = r.resolve(Some(&k), None, None, band(115.0, 135.0)).await;
        assert_eq!(second, Some(135.0));
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_implausible_tempo_not_cached() {
        let primary = ScriptedSource::new("primary", &[("USRC17607839", Ok(Some(900.0)))]);
        let r = resolver(vec![primary]);
        let k = code("USRC17607839");

        assert_eq!(r.resolve(Some(&k), None, None, None).await, None);
        assert!(r.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_no_source_answers() {
        let primary = ScriptedSource::new("primary", &[]);
        let r = resolver(vec![primary]);

        assert_eq!(r.resolve(Some(&code("USRC17607839")), None, None, None).await, None);
    }
}
