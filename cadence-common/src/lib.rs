//! # Cadence Common Library
//!
//! Shared code for the Cadence crates:
//! - Error and result types
//! - TOML bootstrap configuration and secret resolution
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
