//! Shared error type for the Cadence crates
//!
//! Covers bootstrap and storage failures: reading `cadence.toml`, opening or
//! writing the tempo cache backends. Request-level failures (bad parameters,
//! catalog errors, deadlines) live in the service crate's own error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// SQLite tempo cache could not be opened, migrated or written
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Cache file or temp file could not be created, written or renamed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing credentials, unreadable config file or out-of-range setting
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persisted data that cannot be decoded or encoded
    #[error("Internal error: {0}")]
    Internal(String),
}
