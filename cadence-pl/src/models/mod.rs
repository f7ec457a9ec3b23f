//! Data models for the playlist builder

pub mod parameters;
pub mod playlist;
pub mod query;
pub mod tempo;
pub mod track;

pub use parameters::{PlaylistTuning, TuningOverrides};
pub use playlist::{BuildRequest, FilterStats, PlaylistSummary, MAX_DESCRIPTION_CHARS};
pub use query::CandidateQuery;
pub use tempo::{TempoBand, MAX_VALID_BPM, MIN_VALID_BPM};
pub use track::{RecordingCode, Track};
