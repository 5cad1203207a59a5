use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};

use super::FileType;

/// The metadata field catalogue.
///
/// Attention: the declaration order is the column order of the CSV play
/// log and the canonical order of the cache JSON. Renaming or appending
/// is fine, reordering is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Ext,
    Playlist,
    OriginalFilename,
    ImportTimestamp,
    Weight,
    Artist,
    Title,
    TrackGain,
    CueIn,
    CueOut,
    PlayCount,
    LastPlay,
    Channels,
    Samplerate,
    Bitrate,
    Uploader,
    Expiration,
}

/// Columns of the monthly CSV play log, in order.
pub const LOG_FIELDS: [Field; 7] = [
    Field::Id,
    Field::Playlist,
    Field::OriginalFilename,
    Field::Artist,
    Field::Title,
    Field::PlayCount,
    Field::LastPlay,
];

impl Field {
    pub const ALL: [Field; 18] = [
        Field::Id,
        Field::Ext,
        Field::Playlist,
        Field::OriginalFilename,
        Field::ImportTimestamp,
        Field::Weight,
        Field::Artist,
        Field::Title,
        Field::TrackGain,
        Field::CueIn,
        Field::CueOut,
        Field::PlayCount,
        Field::LastPlay,
        Field::Channels,
        Field::Samplerate,
        Field::Bitrate,
        Field::Uploader,
        Field::Expiration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Ext => "ext",
            Field::Playlist => "playlist",
            Field::OriginalFilename => "original_filename",
            Field::ImportTimestamp => "import_timestamp",
            Field::Weight => "weight",
            Field::Artist => "artist",
            Field::Title => "title",
            Field::TrackGain => "track_gain",
            Field::CueIn => "cue_in",
            Field::CueOut => "cue_out",
            Field::PlayCount => "play_count",
            Field::LastPlay => "last_play",
            Field::Channels => "channels",
            Field::Samplerate => "samplerate",
            Field::Bitrate => "bitrate",
            Field::Uploader => "uploader",
            Field::Expiration => "expiration",
        }
    }

    /// Fields callers may change through the update operation.
    pub fn updatable(&self) -> bool {
        matches!(
            self,
            Field::Artist | Field::Title | Field::Weight | Field::Expiration
        )
    }

    /// Fields whose ground truth lives in the audio file's embedded tags.
    pub fn tag_backed(&self) -> bool {
        matches!(
            self,
            Field::Artist
                | Field::Title
                | Field::TrackGain
                | Field::CueIn
                | Field::CueOut
                | Field::OriginalFilename
                | Field::ImportTimestamp
                | Field::PlayCount
                | Field::LastPlay
        )
    }

    /// The custom tag description used for fields without a standard tag
    /// mapping (`artist`, `title` and `track_gain` use standard items).
    pub fn tag_key(&self) -> Option<&'static str> {
        match self {
            Field::CueIn => Some("CUE_IN"),
            Field::CueOut => Some("CUE_OUT"),
            Field::OriginalFilename => Some("ORIGINAL_FILENAME"),
            Field::ImportTimestamp => Some("IMPORT_TIMESTAMP"),
            Field::PlayCount => Some("PLAY_COUNT"),
            Field::LastPlay => Some("LAST_PLAY"),
            _ => None,
        }
    }

    /// Validate a candidate JSON value for this field: type, range and
    /// pattern checks. Mutations run every change through this before any
    /// store is touched.
    pub fn validate(&self, value: &Value) -> Result<()> {
        match self {
            Field::Id => {
                let s = expect_str(self, value)?;
                Uuid::parse_str(s)
                    .map(|_| ())
                    .map_err(|_| invalid(self, value, "not a UUID"))
            }
            Field::Ext => {
                let s = expect_str(self, value)?;
                FileType::from_ext(s)
                    .map(|_| ())
                    .ok_or_else(|| invalid(self, value, "unsupported file type"))
            }
            Field::Playlist
            | Field::OriginalFilename
            | Field::Artist
            | Field::Title
            | Field::Uploader => expect_str(self, value).map(|_| ()),
            Field::ImportTimestamp => {
                let s = expect_str(self, value)?;
                parse_instant(self, s).map(|_| ())
            }
            Field::LastPlay | Field::Expiration => {
                let s = expect_str(self, value)?;
                if s.is_empty() {
                    Ok(())
                } else {
                    parse_instant(self, s).map(|_| ())
                }
            }
            Field::Weight => {
                let n = expect_uint(self, value)?;
                if n <= u64::from(u32::MAX) {
                    Ok(())
                } else {
                    Err(invalid(self, value, "exceeds the maximum weight"))
                }
            }
            Field::PlayCount => expect_uint(self, value).map(|_| ()),
            Field::TrackGain => expect_float(self, value).map(|_| ()),
            Field::CueIn | Field::CueOut => {
                let n = expect_float(self, value)?;
                if n >= 0.0 {
                    Ok(())
                } else {
                    Err(invalid(self, value, "must be >= 0"))
                }
            }
            Field::Channels => {
                let n = expect_uint(self, value)?;
                if n == 1 || n == 2 {
                    Ok(())
                } else {
                    Err(invalid(self, value, "must be 1 or 2"))
                }
            }
            Field::Samplerate | Field::Bitrate => {
                let n = expect_uint(self, value)?;
                if n > 0 {
                    Ok(())
                } else {
                    Err(invalid(self, value, "must be positive"))
                }
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("Invalid metadata key: {s}")))
    }
}

fn invalid(field: &Field, value: &Value, reason: &str) -> Error {
    Error::invalid_field(field.as_str(), format!("{reason} (value: {value})"))
}

fn expect_str<'v>(field: &Field, value: &'v Value) -> Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| invalid(field, value, "expected a string"))
}

fn expect_uint(field: &Field, value: &Value) -> Result<u64> {
    value
        .as_u64()
        .ok_or_else(|| invalid(field, value, "expected a non-negative integer"))
}

fn expect_float(field: &Field, value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| invalid(field, value, "expected a number"))
}

/// Timestamps must be fully qualified and timezone-aware (RFC 3339).
fn parse_instant(field: &Field, s: &str) -> Result<chrono::DateTime<chrono::FixedOffset>> {
    DateTime::parse_from_rfc3339(s)
        .map_err(|_| Error::invalid_field(field.as_str(), format!("malformed timestamp '{s}'")))
}
