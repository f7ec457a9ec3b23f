//! Tempo value types

use serde::{Deserialize, Serialize};

/// Lowest tempo considered plausible for music
pub const MIN_VALID_BPM: f64 = 40.0;
/// Highest tempo considered plausible for music
pub const MAX_VALID_BPM: f64 = 240.0;

/// Inclusive tempo band requested by the user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoBand {
    pub min: f64,
    pub max: f64,
}

impl TempoBand {
    /// Build a band, rejecting non-finite, non-positive or inverted bounds.
    pub fn new(min: f64, max: f64) -> Option<Self> {
        if !min.is_finite() || !max.is_finite() || min <= 0.0 || min > max {
            return None;
        }
        Some(Self { min, max })
    }

    pub fn contains(&self, bpm: f64) -> bool {
        self.min <= bpm && bpm <= self.max
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

/// True when `bpm` lies in the plausible music-tempo window
pub fn is_plausible(bpm: f64) -> bool {
    (MIN_VALID_BPM..=MAX_VALID_BPM).contains(&bpm)
}
