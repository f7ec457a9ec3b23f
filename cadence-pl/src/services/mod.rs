//! Service modules for the playlist builder
//!
//! Leaves first: tempo cache and sources, the resolver over them, catalog
//! access, candidate aggregation, the tempo filter and the pipeline.

pub mod bpm_filter;
pub mod candidate_aggregator;
pub mod catalog_client;
pub mod deezer_client;
pub mod getsongbpm_client;
pub mod playlist_pipeline;
pub mod tempo_cache;
pub mod tempo_resolver;
pub mod tempo_source;

pub use bpm_filter::{BpmFilter, FilterOutcome};
pub use candidate_aggregator::{CandidateAggregator, CandidatePool};
pub use catalog_client::{CatalogArtist, CatalogAuth, CatalogService, SpotifyClient};
pub use deezer_client::DeezerClient;
pub use getsongbpm_client::{GetSongBpmClient, GetSongBpmSource, LookupMode};
pub use playlist_pipeline::PlaylistPipeline;
pub use tempo_cache::{CacheStore, JsonFileStore, MemoryStore, TempoCache, TempoCacheEntry};
pub use tempo_resolver::{normalize_tempo, TempoResolver};
pub use tempo_source::{SourceError, TempoLookup, TempoSource};
