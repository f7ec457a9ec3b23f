//! Persistent tempo cache
//!
//! Maps `isrc:<code>` keys to a normalized tempo plus the time it was recorded.
//! Entries older than the freshness window (90 days by default) read as absent
//! but are never deleted; a later write supersedes them.
//!
//! The cache loads its whole store into memory on first access. Reads never
//! fail: a missing, malformed or expired entry is simply a miss, and an
//! unreadable store is treated as empty. Writes go through to the store before
//! `set` returns; store failures are logged and ignored.

use async_trait::async_trait;
use cadence_common::time::{self, from_epoch_secs, to_epoch_secs};
use cadence_common::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OnceCell, RwLock};

use crate::models::RecordingCode;

/// Default freshness window
pub const DEFAULT_MAX_AGE_DAYS: i64 = 90;

/// One cached tempo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoCacheEntry {
    pub bpm: f64,
    /// Stored as fractional Unix seconds under `_ts`
    #[serde(rename = "_ts", with = "epoch_secs")]
    pub recorded_at: DateTime<Utc>,
}

impl TempoCacheEntry {
    pub fn new(bpm: f64, recorded_at: DateTime<Utc>) -> Self {
        Self { bpm, recorded_at }
    }

    fn is_usable(&self) -> bool {
        self.bpm.is_finite() && self.bpm > 0.0
    }
}

mod epoch_secs {
    use super::*;

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_f64(to_epoch_secs(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(d)?;
        from_epoch_secs(secs)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", secs)))
    }
}

/// Durable key-value backend for [`TempoCache`]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Load every well-formed entry. Malformed entries are skipped.
    async fn load(&self) -> Result<HashMap<String, TempoCacheEntry>>;

    /// Persist `entry` under `key`.
    ///
    /// `snapshot` is the cache's full in-memory view, for backends that rewrite
    /// the whole store.
    async fn save(
        &self,
        key: &str,
        entry: &TempoCacheEntry,
        snapshot: &HashMap<String, TempoCacheEntry>,
    ) -> Result<()>;
}

/// Tempo cache shared by every pipeline run of the process
pub struct TempoCache {
    store: Arc<dyn CacheStore>,
    max_age: Duration,
    entries: OnceCell<RwLock<HashMap<String, TempoCacheEntry>>>,
    /// Serializes write-through so snapshots reach the store in order
    write_lock: Mutex<()>,
}

impl TempoCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_max_age(store, Duration::days(DEFAULT_MAX_AGE_DAYS))
    }

    pub fn with_max_age(store: Arc<dyn CacheStore>, max_age: Duration) -> Self {
        Self {
            store,
            max_age,
            entries: OnceCell::new(),
            write_lock: Mutex::new(()),
        }
    }

    async fn entries(&self) -> &RwLock<HashMap<String, TempoCacheEntry>> {
        self.entries
            .get_or_init(|| async {
                let loaded = match self.store.load().await {
                    Ok(entries) => {
                        tracing::info!(
                            store = self.store.name(),
                            entries = entries.len(),
                            "Tempo cache loaded"
                        );
                        entries
                    }
                    Err(e) => {
                        tracing::warn!(
                            store = self.store.name(),
                            error = %e,
                            "Tempo cache unreadable, starting empty"
                        );
                        HashMap::new()
                    }
                };
                RwLock::new(loaded)
            })
            .await
    }

    /// Cached tempo for `code`, if present and fresh
    pub async fn get(&self, code: &RecordingCode) -> Option<f64> {
        self.get_at(code, time::now()).await
    }

    /// [`get`](Self::get) evaluated at `now`
    pub async fn get_at(&self, code: &RecordingCode, now: DateTime<Utc>) -> Option<f64> {
        let entries = self.entries().await.read().await;
        let entry = entries.get(&code.cache_key())?;

        if !entry.is_usable() {
            return None;
        }
        if time::is_expired(entry.recorded_at, self.max_age, now) {
            tracing::debug!(isrc = %code, recorded_at = %entry.recorded_at, "Cached tempo expired");
            return None;
        }

        Some(entry.bpm)
    }

    /// Store `bpm` for `code`, stamped with the current time
    pub async fn set(&self, code: &RecordingCode, bpm: f64) {
        self.set_at(code, bpm, time::now()).await
    }

    /// [`set`](Self::set) with an explicit timestamp
    pub async fn set_at(&self, code: &RecordingCode, bpm: f64, recorded_at: DateTime<Utc>) {
        let entry = TempoCacheEntry::new(bpm, recorded_at);
        if !entry.is_usable() {
            tracing::warn!(isrc = %code, bpm, "Refusing to cache unusable tempo");
            return;
        }

        let key = code.cache_key();
        let _write = self.write_lock.lock().await;
        let entries = self.entries().await;

        entries.write().await.insert(key.clone(), entry.clone());

        let snapshot = entries.read().await;
        if let Err(e) = self.store.save(&key, &entry, &snapshot).await {
            tracing::warn!(
                store = self.store.name(),
                key = %key,
                error = %e,
                "Tempo cache write failed, keeping value in memory only"
            );
        }
    }

    /// Number of entries currently held in memory (fresh or not)
    pub async fn len(&self) -> usize {
        self.entries().await.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// Single JSON object file: `{ "isrc:<code>": {"bpm": 128.0, "_ts": 1700000000.0} }`
///
/// Writes merge with whatever is on disk (newest `_ts` wins per key), go to a
/// temporary file and are atomically renamed over the original, so a crash
/// mid-write leaves the previous file intact.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<HashMap<String, TempoCacheEntry>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };

        let raw: HashMap<String, serde_json::Value> = serde_json::from_str(&content)
            .map_err(|e| Error::Internal(format!("Parse {} failed: {}", self.path.display(), e)))?;

        let mut entries = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            match serde_json::from_value::<TempoCacheEntry>(value) {
                Ok(entry) => {
                    entries.insert(key, entry);
                }
                Err(e) => tracing::debug!(key = %key, error = %e, "Skipping malformed cache entry"),
            }
        }

        Ok(entries)
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tempo_cache.json".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
    }
}

#[async_trait]
impl CacheStore for JsonFileStore {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn load(&self) -> Result<HashMap<String, TempoCacheEntry>> {
        self.read_entries().await
    }

    async fn save(
        &self,
        key: &str,
        entry: &TempoCacheEntry,
        snapshot: &HashMap<String, TempoCacheEntry>,
    ) -> Result<()> {
        // Another process may have written since we loaded
        let mut merged = match self.read_entries().await {
            Ok(on_disk) => on_disk,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Replacing unreadable cache file");
                HashMap::new()
            }
        };

        for (k, v) in snapshot {
            merged
                .entry(k.clone())
                .and_modify(|existing| {
                    if v.recorded_at > existing.recorded_at {
                        *existing = v.clone();
                    }
                })
                .or_insert_with(|| v.clone());
        }
        merged.insert(key.to_string(), entry.clone());

        let body = serde_json::to_vec_pretty(&merged)
            .map_err(|e| Error::Internal(format!("Serialize tempo cache failed: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = self.temp_path();
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Non-durable store; entries live as long as the process
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, TempoCacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `entries`
    pub fn with_entries(entries: HashMap<String, TempoCacheEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self) -> Result<HashMap<String, TempoCacheEntry>> {
        Ok(self.entries.lock().await.clone())
    }

    async fn save(
        &self,
        key: &str,
        entry: &TempoCacheEntry,
        _snapshot: &HashMap<String, TempoCacheEntry>,
    ) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), entry.clone());
        Ok(())
    }
}
