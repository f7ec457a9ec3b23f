//! HTTP API handlers for cadence-pl

pub mod health;
pub mod playlists;

pub use health::health_routes;
pub use playlists::playlist_routes;
