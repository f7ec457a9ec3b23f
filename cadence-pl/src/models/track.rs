//! Catalog track and recording code types

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static ISRC_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // Safe: pattern is a compile-time constant
    Regex::new(r"^[A-Z]{2}[A-Z0-9]{3}[0-9]{7}$").unwrap()
});

/// International Standard Recording Code
///
/// Join key between the catalog and the tempo services. Stored in its
/// canonical form: uppercase, no separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordingCode(String);

impl RecordingCode {
    /// Parse a recording code, accepting lowercase letters and `-` separators
    /// (`us-rc1-76-07839` → `USRC17607839`).
    pub fn parse(raw: &str) -> Option<Self> {
        let canonical: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if ISRC_PATTERN.is_match(&canonical) {
            Some(Self(canonical))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which this recording's tempo is cached
    pub fn cache_key(&self) -> String {
        format!("isrc:{}", self.0)
    }
}

impl fmt::Display for RecordingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RecordingCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid recording code: {}", value))
    }
}

impl From<RecordingCode> for String {
    fn from(code: RecordingCode) -> Self {
        code.0
    }
}

/// A catalog track, immutable once fetched. Identity is `catalog_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Catalog-assigned track id (unique)
    pub catalog_id: String,
    /// URI used when adding the track to a playlist
    pub uri: String,
    /// Track title
    pub title: String,
    /// First credited artist, if any
    pub primary_artist: Option<String>,
    /// ISRC, when the catalog supplied a well-formed one
    pub recording_code: Option<RecordingCode>,
}

impl Track {
    pub fn has_recording_code(&self) -> bool {
        self.recording_code.is_some()
    }
}
