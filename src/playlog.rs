//! Play logging.
//!
//! Every logged play appends one row to the current month's CSV file
//! under `log/` and rewrites `log/current.json` with the full record of
//! the track on air. The CSV files are append-only history; the JSON
//! snapshot is for now-playing displays and gets replaced atomically.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use tracing::info;

use crate::config::Settings;
use crate::error::Result;
use crate::store;
use crate::track::{Track, LOG_FIELDS};

/// Path of the CSV log for the month containing `now`.
pub fn month_log_path(settings: &Settings, now: DateTime<FixedOffset>) -> PathBuf {
    settings.log_dir().join(format!("{}.csv", now.format("%Y-%m")))
}

/// Append the track to the monthly CSV log and replace the now-playing
/// snapshot. The caller passes the record as it stands after the play
/// was counted.
pub fn log_play(settings: &Settings, track: &Track, now: DateTime<FixedOffset>) -> Result<()> {
    let dir = settings.log_dir();
    fs::create_dir_all(&dir)?;

    let path = month_log_path(settings, now);
    let new_file = !path.is_file();

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if new_file {
        let header: Vec<&str> = LOG_FIELDS.iter().map(|f| f.as_str()).collect();
        writeln!(file, "{}", header.join(","))?;
    }

    let row: Vec<String> = LOG_FIELDS
        .iter()
        .map(|f| csv_field(&track.get(*f)))
        .collect();
    writeln!(file, "{}", row.join(","))?;

    let snapshot = serde_json::to_string_pretty(track)?;
    store::replace_file(&dir.join("current.json"), snapshot.as_bytes())?;

    info!(id = %track.id, artist = %track.artist, title = %track.title, "logged play");
    Ok(())
}

/// Render one JSON value as a CSV field, quoting when needed.
fn csv_field(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw
    }
}
