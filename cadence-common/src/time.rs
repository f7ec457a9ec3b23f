//! Timestamp utilities

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert fractional Unix seconds (as stored by JSON stores) to a UTC timestamp.
///
/// Returns `None` for values outside chrono's representable range or non-finite input.
pub fn from_epoch_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1_000_000_000.0) as u32;
    Utc.timestamp_opt(whole as i64, nanos).single()
}

/// Convert a UTC timestamp to fractional Unix seconds.
pub fn to_epoch_secs(ts: DateTime<Utc>) -> f64 {
    ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_nanos()) / 1_000_000_000.0
}

/// True when `recorded_at` is strictly more than `max_age` before `now`.
pub fn is_expired(recorded_at: DateTime<Utc>, max_age: Duration, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(recorded_at) > max_age
}
