//! Candidate query parsing
//!
//! User queries carry an optional structured prefix:
//! - `genre:<g>` → artists tagged with the genre, then their top tracks
//! - `artist:<name>` → matching artists, then their top tracks
//! - anything else → free-text track search

use serde::{Deserialize, Serialize};
use std::fmt;

const GENRE_PREFIX: &str = "genre:";
const ARTIST_PREFIX: &str = "artist:";

/// One parsed candidate query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CandidateQuery {
    FreeText(String),
    Genre(String),
    Artist(String),
}

impl CandidateQuery {
    /// Parse a raw query string.
    ///
    /// Prefixes match case-insensitively. The value is trimmed and surrounding
    /// double quotes are stripped. Returns `None` for blank input or a prefix
    /// with no value.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some(value) = strip_prefix_ignore_case(trimmed, GENRE_PREFIX) {
            return clean_value(value).map(CandidateQuery::Genre);
        }
        if let Some(value) = strip_prefix_ignore_case(trimmed, ARTIST_PREFIX) {
            return clean_value(value).map(CandidateQuery::Artist);
        }

        Some(CandidateQuery::FreeText(trimmed.to_string()))
    }

    /// Parse many queries, dropping the blank ones
    pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Vec<Self> {
        raw.iter()
            .filter_map(|q| {
                let parsed = Self::parse(q.as_ref());
                if parsed.is_none() {
                    tracing::debug!(query = %q.as_ref(), "Skipping blank query");
                }
                parsed
            })
            .collect()
    }
}

impl fmt::Display for CandidateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateQuery::FreeText(q) => write!(f, "{}", q),
            CandidateQuery::Genre(g) => write!(f, "{}{}", GENRE_PREFIX, g),
            CandidateQuery::Artist(a) => write!(f, "{}{}", ARTIST_PREFIX, a),
        }
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn clean_value(value: &str) -> Option<String> {
    let cleaned = value.trim().trim_matches('"').trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
