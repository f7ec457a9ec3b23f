//! Configuration for cadence-pl
//!
//! Bootstrap TOML (`cadence.toml`) plus ENV → TOML resolution for secrets and
//! the cache path, and builders that turn the config into live components.

use cadence_common::config::{
    load_toml_config, resolve_config_path, resolve_secret, LoggingConfig, ServerConfig,
};
use cadence_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::PlaylistTuning;
use crate::services::catalog_client::{SPOTIFY_API_BASE_URL, SPOTIFY_TOKEN_URL};
use crate::services::deezer_client::DEEZER_BASE_URL;
use crate::services::getsongbpm_client::GETSONGBPM_BASE_URL;
use crate::services::tempo_cache::DEFAULT_MAX_AGE_DAYS;
use crate::services::{
    CacheStore, CatalogAuth, CatalogService, DeezerClient, GetSongBpmClient, GetSongBpmSource,
    JsonFileStore, LookupMode, MemoryStore, SpotifyClient, TempoCache, TempoSource,
};
use crate::utils::RetryPolicy;

pub const CONFIG_ENV_VAR: &str = "CADENCE_CONFIG";
pub const CONFIG_FILE_NAME: &str = "cadence.toml";

pub const CATALOG_TOKEN_ENV_VAR: &str = "CADENCE_CATALOG_TOKEN";
pub const CATALOG_CLIENT_ID_ENV_VAR: &str = "CADENCE_CATALOG_CLIENT_ID";
pub const CATALOG_CLIENT_SECRET_ENV_VAR: &str = "CADENCE_CATALOG_CLIENT_SECRET";
pub const GETSONGBPM_KEY_ENV_VAR: &str = "GETSONGBPM_API_KEY";
pub const CACHE_PATH_ENV_VAR: &str = "BPM_CACHE_PATH";

/// Top-level `cadence.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Default tuning for every build
    #[serde(default)]
    pub tuning: PlaylistTuning,
}

/// Tempo cache persistence backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// `bpm_cache.json`-compatible JSON file
    #[default]
    Json,
    /// SQLite database via sqlx
    Sqlite,
    /// Process memory only
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    /// Store location; `BPM_CACHE_PATH` takes precedence
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Entry freshness window (default: 90 days)
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            path: None,
            max_age_days: default_max_age_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// User access token (needed for playlist creation)
    #[serde(default)]
    pub access_token: Option<String>,
    /// App credentials for the client-credentials grant
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_catalog_base_url")]
    pub base_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            client_id: None,
            client_secret: None,
            base_url: default_catalog_base_url(),
            token_url: default_token_url(),
        }
    }
}

/// Tempo source toggles, in priority order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_true")]
    pub deezer: bool,
    #[serde(default = "default_true")]
    pub getsongbpm_isrc: bool,
    #[serde(default = "default_true")]
    pub getsongbpm_search: bool,
    #[serde(default)]
    pub getsongbpm_api_key: Option<String>,
    #[serde(default = "default_deezer_base_url")]
    pub deezer_base_url: String,
    #[serde(default = "default_getsongbpm_base_url")]
    pub getsongbpm_base_url: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            deezer: true,
            getsongbpm_isrc: true,
            getsongbpm_search: true,
            getsongbpm_api_key: None,
            deezer_base_url: default_deezer_base_url(),
            getsongbpm_base_url: default_getsongbpm_base_url(),
        }
    }
}

/// Per-call timeout and retry settings for external services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.timeout(),
            self.retries,
            Duration::from_millis(self.backoff_ms),
        )
    }
}

fn default_max_age_days() -> i64 {
    DEFAULT_MAX_AGE_DAYS
}

fn default_catalog_base_url() -> String {
    SPOTIFY_API_BASE_URL.to_string()
}

fn default_token_url() -> String {
    SPOTIFY_TOKEN_URL.to_string()
}

fn default_deezer_base_url() -> String {
    DEEZER_BASE_URL.to_string()
}

fn default_getsongbpm_base_url() -> String {
    GETSONGBPM_BASE_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    500
}

impl CadenceConfig {
    /// Load config: CLI path → `CADENCE_CONFIG` → `~/.config/cadence/cadence.toml`
    /// → built-in defaults.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_path, CONFIG_ENV_VAR, CONFIG_FILE_NAME);
        match &path {
            Some(p) => info!("Loading config from {}", p.display()),
            None => info!("No config file found, using defaults"),
        }
        load_toml_config(path.as_deref())
    }

    /// Cache location: `BPM_CACHE_PATH` → `[cache] path` → backend default in
    /// the working directory.
    pub fn cache_path(&self) -> PathBuf {
        if let Ok(path) = std::env::var(CACHE_PATH_ENV_VAR) {
            if !path.trim().is_empty() {
                return PathBuf::from(path.trim());
            }
        }

        if let Some(path) = &self.cache.path {
            return path.clone();
        }

        match self.cache.backend {
            CacheBackend::Sqlite => PathBuf::from("bpm_cache.db"),
            CacheBackend::Json | CacheBackend::Memory => PathBuf::from("bpm_cache.json"),
        }
    }

    /// Open the tempo cache on the configured backend
    pub async fn build_cache(&self) -> Result<Arc<TempoCache>> {
        if self.cache.max_age_days <= 0 {
            return Err(Error::Config(format!(
                "cache.max_age_days must be positive, got {}",
                self.cache.max_age_days
            )));
        }

        let store: Arc<dyn CacheStore> = match self.cache.backend {
            CacheBackend::Json => {
                let path = self.cache_path();
                info!("Tempo cache: JSON file {}", path.display());
                Arc::new(JsonFileStore::new(path))
            }
            CacheBackend::Sqlite => {
                let path = self.cache_path();
                info!("Tempo cache: SQLite database {}", path.display());
                Arc::new(crate::db::SqliteCacheStore::open(&path).await?)
            }
            CacheBackend::Memory => {
                info!("Tempo cache: in-memory only");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Arc::new(TempoCache::with_max_age(
            store,
            chrono::Duration::days(self.cache.max_age_days),
        )))
    }

    /// Enabled tempo sources in priority order
    pub fn build_sources(&self) -> Result<Vec<Arc<dyn TempoSource>>> {
        let timeout = self.retry.timeout();
        let mut sources: Vec<Arc<dyn TempoSource>> = Vec::new();

        if self.sources.deezer {
            let client = DeezerClient::new(&self.sources.deezer_base_url, timeout)
                .map_err(|e| Error::Config(format!("Deezer client: {}", e)))?;
            sources.push(Arc::new(client));
        }

        if self.sources.getsongbpm_isrc || self.sources.getsongbpm_search {
            match resolve_secret(
                "GetSongBPM API key",
                GETSONGBPM_KEY_ENV_VAR,
                self.sources.getsongbpm_api_key.as_deref(),
            ) {
                Some(key) => {
                    let client = GetSongBpmClient::new(
                        &self.sources.getsongbpm_base_url,
                        key.value,
                        timeout,
                    )
                    .map_err(|e| Error::Config(format!("GetSongBPM client: {}", e)))?;
                    let client = Arc::new(client);

                    if self.sources.getsongbpm_isrc {
                        sources.push(Arc::new(GetSongBpmSource::new(
                            client.clone(),
                            LookupMode::Isrc,
                        )));
                    }
                    if self.sources.getsongbpm_search {
                        sources.push(Arc::new(GetSongBpmSource::new(client, LookupMode::Search)));
                    }
                }
                None => {
                    warn!(
                        "GetSongBPM API key not configured ({} or [sources] getsongbpm_api_key); \
                         GetSongBPM lookups disabled",
                        GETSONGBPM_KEY_ENV_VAR
                    );
                }
            }
        }

        if sources.is_empty() {
            warn!("No tempo sources enabled; only cached tempos will be used");
        }

        Ok(sources)
    }

    /// Catalog authentication: user token (ENV → TOML), else app credentials
    pub fn catalog_auth(&self) -> Result<CatalogAuth> {
        if let Some(token) = resolve_secret(
            "Catalog access token",
            CATALOG_TOKEN_ENV_VAR,
            self.catalog.access_token.as_deref(),
        ) {
            return Ok(CatalogAuth::AccessToken(token.value));
        }

        let client_id = resolve_secret(
            "Catalog client id",
            CATALOG_CLIENT_ID_ENV_VAR,
            self.catalog.client_id.as_deref(),
        );
        let client_secret = resolve_secret(
            "Catalog client secret",
            CATALOG_CLIENT_SECRET_ENV_VAR,
            self.catalog.client_secret.as_deref(),
        );

        match (client_id, client_secret) {
            (Some(id), Some(secret)) => {
                warn!("No catalog user token configured; playlist creation will be rejected by the catalog");
                Ok(CatalogAuth::ClientCredentials {
                    client_id: id.value,
                    client_secret: secret.value,
                    token_url: self.catalog.token_url.clone(),
                })
            }
            _ => Err(Error::Config(format!(
                "Catalog credentials not configured. Set one of:\n\
                 1. Environment: {}=<user access token>\n\
                 2. Environment: {} and {}\n\
                 3. TOML config: [catalog] access_token, or client_id and client_secret",
                CATALOG_TOKEN_ENV_VAR, CATALOG_CLIENT_ID_ENV_VAR, CATALOG_CLIENT_SECRET_ENV_VAR
            ))),
        }
    }

    /// Catalog client
    pub fn build_catalog(&self) -> Result<Arc<dyn CatalogService>> {
        let client = SpotifyClient::new(
            &self.catalog.base_url,
            self.catalog_auth()?,
            self.retry.timeout(),
        )
        .map_err(|e| Error::Config(format!("Catalog client: {}", e)))?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults_from_empty_file() {
        let config: CadenceConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 5725);
        assert_eq!(config.cache.backend, CacheBackend::Json);
        assert_eq!(config.cache.max_age_days, 90);
        assert!(config.sources.deezer);
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.tuning, PlaylistTuning::default());
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = RetryConfig::default().policy();
        assert_eq!(policy.timeout, Duration::from_secs(10));
        assert_eq!(policy.retries, 2);
        assert_eq!(policy.backoff, Duration::from_millis(500));
    }

    #[test]
    fn test_sections_parse() {
        let config: CadenceConfig = toml::from_str(
            r#"
            [cache]
            backend = "sqlite"
            max_age_days = 30

            [sources]
            getsongbpm_search = false

            [tuning]
            fallback_threshold = 5
            market = "GB"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.backend, CacheBackend::Sqlite);
        assert_eq!(config.cache.max_age_days, 30);
        assert!(!config.sources.getsongbpm_search);
        assert!(config.sources.getsongbpm_isrc);
        assert_eq!(config.tuning.fallback_threshold, 5);
        assert_eq!(config.tuning.market, "GB");
        assert_eq!(config.tuning.max_total_tracks, 100);
    }

    #[test]
    #[serial]
    fn test_cache_path_precedence() {
        std::env::remove_var(CACHE_PATH_ENV_VAR);
        let mut config = CadenceConfig::default();
        assert_eq!(config.cache_path(), PathBuf::from("bpm_cache.json"));

        config.cache.backend = CacheBackend::Sqlite;
        assert_eq!(config.cache_path(), PathBuf::from("bpm_cache.db"));

        config.cache.path = Some(PathBuf::from("/tmp/from-toml.db"));
        assert_eq!(config.cache_path(), PathBuf::from("/tmp/from-toml.db"));

        std::env::set_var(CACHE_PATH_ENV_VAR, "/tmp/from-env.json");
        assert_eq!(config.cache_path(), PathBuf::from("/tmp/from-env.json"));
        std::env::remove_var(CACHE_PATH_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_getsongbpm_disabled_without_key() {
        std::env::remove_var(GETSONGBPM_KEY_ENV_VAR);
        let config = CadenceConfig::default();
        let names: Vec<&str> = config
            .build_sources()
            .unwrap()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["deezer"]);
    }

    #[test]
    #[serial]
    fn test_source_order_and_toggles() {
        std::env::set_var(GETSONGBPM_KEY_ENV_VAR, "test-key");
        let mut config = CadenceConfig::default();
        let names: Vec<&str> = config
            .build_sources()
            .unwrap()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["deezer", "getsongbpm-isrc", "getsongbpm-search"]);

        config.sources.deezer = false;
        config.sources.getsongbpm_isrc = false;
        let names: Vec<&str> = config
            .build_sources()
            .unwrap()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["getsongbpm-search"]);
        std::env::remove_var(GETSONGBPM_KEY_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_catalog_auth_resolution() {
        std::env::remove_var(CATALOG_TOKEN_ENV_VAR);
        std::env::remove_var(CATALOG_CLIENT_ID_ENV_VAR);
        std::env::remove_var(CATALOG_CLIENT_SECRET_ENV_VAR);

        let mut config = CadenceConfig::default();
        assert!(matches!(config.catalog_auth(), Err(Error::Config(_))));

        config.catalog.client_id = Some("id".into());
        config.catalog.client_secret = Some("secret".into());
        assert!(matches!(
            config.catalog_auth(),
            Ok(CatalogAuth::ClientCredentials { .. })
        ));

        std::env::set_var(CATALOG_TOKEN_ENV_VAR, "user-token");
        match config.catalog_auth() {
            Ok(CatalogAuth::AccessToken(token)) => assert_eq!(token, "user-token"),
            other => panic!("expected access token, got {:?}", other),
        }
        std::env::remove_var(CATALOG_TOKEN_ENV_VAR);
    }

    #[tokio::test]
    async fn test_memory_cache_backend() {
        let mut config = CadenceConfig::default();
        config.cache.backend = CacheBackend::Memory;
        let cache = config.build_cache().await.unwrap();
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalid_max_age_rejected() {
        let mut config = CadenceConfig::default();
        config.cache.backend = CacheBackend::Memory;
        config.cache.max_age_days = 0;
        assert!(matches!(config.build_cache().await, Err(Error::Config(_))));
    }
}
