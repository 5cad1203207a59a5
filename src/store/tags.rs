//! Embedded tag store.
//!
//! Tag-backed metadata (artist, title, cue points, gain, play history,
//! provenance) lives inside the audio file itself, so the library
//! survives a restore from plain file backups. Standard items carry
//! artist and title; everything else uses custom text items (TXXX frames
//! on ID3, plain fields in Vorbis comments).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, ItemValue, Tag, TagItem};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::track::Field;

/// Everything fsck needs from one audio file: the tag-backed field
/// values (raw strings) and the stream properties.
#[derive(Debug, Clone, Default)]
pub struct TagSnapshot {
    pub values: HashMap<Field, String>,
    pub duration_secs: f64,
    pub channels: Option<u8>,
    pub samplerate: Option<u32>,
    pub bitrate: Option<u32>,
}

impl TagSnapshot {
    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }
}

/// Read the tag-backed fields and stream properties of an audio file.
pub fn read_snapshot(path: &Path) -> Result<TagSnapshot> {
    let tagged = Probe::open(path)?.read()?;
    let properties = tagged.properties();

    let mut snapshot = TagSnapshot {
        duration_secs: properties.duration().as_secs_f64(),
        channels: properties.channels(),
        samplerate: properties.sample_rate(),
        bitrate: properties.audio_bitrate(),
        ..TagSnapshot::default()
    };

    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        for field in Field::ALL {
            if !field.tag_backed() {
                continue;
            }
            if let Some(key) = item_key(field) {
                if let Some(value) = tag.get_string(&key) {
                    snapshot.values.insert(field, value.to_string());
                }
            }
        }
    }

    Ok(snapshot)
}

/// Write the given field values into the file's embedded tags.
///
/// The cycle is read-modify-write on a temp copy followed by an atomic
/// rename, so a crash mid-write never corrupts the audio file.
pub fn write_fields(path: &Path, fields: &[(Field, Value)]) -> Result<()> {
    let tag_fields: Vec<&(Field, Value)> =
        fields.iter().filter(|(f, _)| f.tag_backed()).collect();
    if tag_fields.is_empty() {
        return Ok(());
    }

    let tmp = super::tmp_path(path);
    fs::copy(path, &tmp)?;

    let result = (|| -> Result<()> {
        // The temp copy carries a `.tmp` suffix, so the format has to be
        // sniffed from the content, not the extension.
        let mut tagged = Probe::open(&tmp)?.guess_file_type()?.read()?;
        let mut tag = match tagged.primary_tag() {
            Some(existing) => existing.clone(),
            None => Tag::new(tagged.primary_tag_type()),
        };

        for (field, value) in tag_fields {
            if let Some(key) = item_key(*field) {
                tag.insert_unchecked(TagItem::new(key, ItemValue::Text(render(*field, value))));
            }
        }

        tagged.insert_tag(tag);
        tagged.save_to_path(&tmp, WriteOptions::default())?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, path)?;
    Ok(())
}

/// Render a field's JSON value into its tag string form.
pub fn render(field: Field, value: &Value) -> String {
    match (field, value) {
        // The playout engine expects the ReplayGain tag in "<gain> dB" form.
        (Field::TrackGain, Value::Number(n)) => format!("{n} dB"),
        (_, Value::String(s)) => s.clone(),
        (_, other) => other.to_string(),
    }
}

/// Parse a raw tag string back into the field's JSON value. Returns an
/// error for values that no longer parse, so fsck can report corrupt tags
/// rather than silently coercing them.
pub fn parse(field: Field, raw: &str) -> Result<Value> {
    let bad = || Error::invalid_field(field.as_str(), format!("unreadable tag value '{raw}'"));
    match field {
        Field::TrackGain => {
            let number = raw.strip_suffix(" dB").unwrap_or(raw);
            number
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| bad())
        }
        Field::CueIn | Field::CueOut => raw.parse::<f64>().map(Value::from).map_err(|_| bad()),
        Field::PlayCount => raw.parse::<u64>().map(Value::from).map_err(|_| bad()),
        _ => Ok(Value::from(raw)),
    }
}

fn item_key(field: Field) -> Option<ItemKey> {
    match field {
        Field::Artist => Some(ItemKey::TrackArtist),
        Field::Title => Some(ItemKey::TrackTitle),
        // lofty normalizes the REPLAYGAIN_TRACK_GAIN description to this
        // known key on read, so writes must use it too or lookups miss.
        Field::TrackGain => Some(ItemKey::ReplayGainTrackGain),
        other => other
            .tag_key()
            .map(|desc| ItemKey::Unknown(desc.to_string())),
    }
}
