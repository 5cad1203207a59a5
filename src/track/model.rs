use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};

pub type TrackId = Uuid;

/// Supported audio file types, keyed by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Mp3,
    Ogg,
    Flac,
    Wav,
}

impl FileType {
    pub const ALL: [FileType; 4] = [FileType::Mp3, FileType::Ogg, FileType::Flac, FileType::Wav];

    /// Parse a bare extension (no dot, case-insensitive).
    pub fn from_ext(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp3" => Some(FileType::Mp3),
            "ogg" => Some(FileType::Ogg),
            "flac" => Some(FileType::Flac),
            "wav" => Some(FileType::Wav),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Mp3 => "mp3",
            FileType::Ogg => "ogg",
            FileType::Flac => "flac",
            FileType::Wav => "wav",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        FileType::from_ext(s)
            .ok_or_else(|| Error::Validation(format!("Unsupported file extension: {s}")))
    }
}

/// One cache entry: the full metadata record of a single track.
///
/// Every field except `uploader` and `expiration` is re-derivable from
/// ground truth (embedded tags, audio stream properties, the ordering
/// file and the file's location).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub ext: FileType,
    pub playlist: String,
    pub original_filename: String,
    pub import_timestamp: DateTime<FixedOffset>,
    /// Number of times the track appears in its playlist's ordering file.
    /// 0 means present on disk and in the cache, but never selected.
    pub weight: u32,
    pub artist: String,
    pub title: String,
    /// ReplayGain track gain in dB.
    pub track_gain: f64,
    /// Start of the audible portion, seconds from the start of the file.
    pub cue_in: f64,
    /// End of the audible portion, seconds from the start of the file.
    pub cue_out: f64,
    pub play_count: u64,
    #[serde(with = "optional_instant")]
    pub last_play: Option<DateTime<FixedOffset>>,
    pub channels: u8,
    pub samplerate: u32,
    pub bitrate: u32,
    /// Who uploaded the track. No ground-truth source; empty when unknown.
    pub uploader: String,
    /// When the track should be taken out of rotation. No ground-truth
    /// source.
    #[serde(with = "optional_instant")]
    pub expiration: Option<DateTime<FixedOffset>>,
}

impl Track {
    /// The file name under the playlist directory: `<id>.<ext>`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.id, self.ext)
    }

    /// The ordering-file line for this track: `<playlist>/<id>.<ext>`.
    pub fn relative_path(&self) -> String {
        format!("{}/{}.{}", self.playlist, self.id, self.ext)
    }

    /// Build a track from a complete map of field values, as accumulated
    /// from an upload's `MetadataChange`s.
    pub fn from_value_map(map: serde_json::Map<String, Value>) -> Result<Track> {
        serde_json::from_value(Value::Object(map))
            .map_err(|e| Error::Validation(format!("Incomplete track record: {e}")))
    }

    /// The track as a field-name to JSON-value map. Round-trips through
    /// `from_value_map`.
    pub fn to_value_map(&self) -> serde_json::Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => unreachable!("Track serializes to a JSON object"),
        }
    }

    /// Look up one field as its JSON representation.
    pub fn get(&self, field: super::Field) -> Value {
        self.to_value_map()
            .remove(field.as_str())
            .unwrap_or(Value::Null)
    }
}

/// Optional instants serialize as RFC 3339 strings, with the empty string
/// standing in for "absent" (the format the playout engine and the
/// original log files expect).
mod optional_instant {
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(
        value: &Option<DateTime<FixedOffset>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(None);
        }
        DateTime::parse_from_rfc3339(&s)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}
