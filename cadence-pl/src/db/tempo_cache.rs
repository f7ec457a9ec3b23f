//! SQLite-backed tempo cache store
//!
//! One row per cache key; writes are single-row upserts, so concurrent writers
//! from several processes resolve to last-writer-wins without partial rows.

use async_trait::async_trait;
use cadence_common::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;

use crate::services::tempo_cache::{CacheStore, TempoCacheEntry};

pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    /// Open (or create) the database at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = super::init_database_pool(db_path).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn load(&self) -> Result<HashMap<String, TempoCacheEntry>> {
        let rows: Vec<(String, f64, String)> =
            sqlx::query_as("SELECT cache_key, bpm, recorded_at FROM tempo_cache")
                .fetch_all(&self.pool)
                .await?;

        let mut entries = HashMap::with_capacity(rows.len());
        for (key, bpm, recorded_at) in rows {
            match DateTime::parse_from_rfc3339(&recorded_at) {
                Ok(ts) => {
                    entries.insert(key, TempoCacheEntry::new(bpm, ts.with_timezone(&Utc)));
                }
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "Skipping cache row with bad timestamp")
                }
            }
        }

        Ok(entries)
    }

    async fn save(
        &self,
        key: &str,
        entry: &TempoCacheEntry,
        _snapshot: &HashMap<String, TempoCacheEntry>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tempo_cache (cache_key, bpm, recorded_at)
            VALUES (?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET
                bpm = excluded.bpm,
                recorded_at = excluded.recorded_at
            "#,
        )
        .bind(key)
        .bind(entry.bpm)
        .bind(entry.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
