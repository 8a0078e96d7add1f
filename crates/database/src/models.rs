//! Record types stored in the sidecar.
//!
//! Unknown fields are kept in `extra` and written back untouched, so a file
//! produced by a newer tool survives a round-trip through this one.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// What kind of content a slot holds. Decides how multi-track slots name
/// their tracks, and is what a player uses to pick a playback mode.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[display("audiobook")]
    Audiobook,
    #[display("album")]
    Album,
    #[display("story")]
    Story,
    #[display("single")]
    Single,
}
impl ContentType {
    pub const ALL: [ContentType; 4] = [Self::Audiobook, Self::Album, Self::Story, Self::Single];
}

#[derive(Debug, Display, Error)]
#[display("unknown content type: {_0:?}")]
pub struct UnknownContentType(#[error(not(source))] pub String);

impl FromStr for ContentType {
    type Err = UnknownContentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownContentType(s.to_string()))
    }
}

/// One track inside a slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Zero-padded sequence number, identical to the track file's stem.
    pub index: String,
    /// Display name.
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
impl TrackRecord {
    pub fn new(index: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            name: name.into(),
            extra: Map::new(),
        }
    }
}

/// Everything the database knows about one occupied slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    /// Older sidecars sometimes omit this; it's filled in from `tracks` on load.
    #[serde(default)]
    pub track_count: usize,
    /// Slot fingerprint at the time of the last ingest or repair. Empty
    /// means unknown, which never matches a real slot.
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
impl ContentRecord {
    /// Builds a record whose `track_count` agrees with `tracks`.
    pub fn new(
        name: impl Into<String>,
        content_type: ContentType,
        hash: impl Into<String>,
        tracks: Vec<TrackRecord>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type,
            track_count: tracks.len(),
            hash: hash.into(),
            tracks,
            extra: Map::new(),
        }
    }
}
