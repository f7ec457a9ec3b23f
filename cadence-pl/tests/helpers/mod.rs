//! Test helper utilities
//!
//! In-memory fakes of the catalog and tempo sources, and builders for a
//! pipeline wired to them.

// Each test binary uses a different subset
#![allow(dead_code, unused_imports)]

pub mod fakes;

pub use fakes::{isrc, track, FakeCatalog, TableTempoSource};

use cadence_pl::services::{MemoryStore, PlaylistPipeline, TempoCache, TempoResolver, TempoSource};
use cadence_pl::utils::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;

/// Retry policy that keeps tests fast
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(Duration::from_secs(1), 1, Duration::from_millis(1))
}

/// Pipeline over `catalog` and `sources` with an in-memory tempo cache
pub fn pipeline_with(
    catalog: Arc<FakeCatalog>,
    sources: Vec<Arc<dyn TempoSource>>,
) -> PlaylistPipeline {
    let cache = Arc::new(TempoCache::new(Arc::new(MemoryStore::new())));
    let resolver = Arc::new(TempoResolver::new(cache, sources, fast_retry()));
    PlaylistPipeline::new(catalog, resolver)
}
