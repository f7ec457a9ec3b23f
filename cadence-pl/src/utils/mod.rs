//! Utility modules for cadence-pl

pub mod retry;

pub use retry::{RetryPolicy, TimedOut};
