//! Consistency checking and repair.
//!
//! The cache is a derived artifact; the audio files, their embedded tags
//! and the ordering files are ground truth. fsck recomputes the record
//! every track should have, diffs it against the cache, and in repair
//! mode swaps the recomputed records in wholesale. The ordering file
//! always wins weight disputes, including lines left by hand edits.
//! Repair is idempotent: a second run right after a successful one finds
//! nothing.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde_json::Value;
use tracing::warn;
use walkdir::WalkDir;

use crate::config::Settings;
use crate::error::Result;
use crate::store::index::Cache;
use crate::store::{ordering, tags};
use crate::track::{Field, FileType, Track, TrackId};

/// One inconsistency between ground truth and the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Discrepancy {
    /// A playlist directory holds an audio file the cache does not know.
    MissingEntry { id: TrackId, playlist: String },
    /// The cache holds a track whose audio file is gone.
    OrphanedEntry { id: TrackId },
    /// Ordering-file line count and cached weight disagree.
    WeightMismatch {
        id: TrackId,
        cached: u32,
        observed: u32,
    },
    /// A cached field differs from the value recomputed from ground truth.
    FieldMismatch {
        id: TrackId,
        field: Field,
        cached: Value,
        observed: Value,
    },
    /// An ordering-file line that refers to no existing audio file.
    DanglingLine { playlist: String, line: String },
    /// A file in a playlist directory that is not `<uuid>.<ext>`.
    ForeignFile { path: PathBuf },
    /// An audio file whose tags or stream could not be read.
    UnreadableFile { path: PathBuf, message: String },
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrepancy::MissingEntry { id, playlist } => {
                write!(f, "{playlist}/{id}: file on disk but not in the cache")
            }
            Discrepancy::OrphanedEntry { id } => {
                write!(f, "{id}: cache entry without an audio file")
            }
            Discrepancy::WeightMismatch {
                id,
                cached,
                observed,
            } => write!(
                f,
                "{id}: cached weight {cached}, ordering file says {observed}"
            ),
            Discrepancy::FieldMismatch {
                id,
                field,
                cached,
                observed,
            } => write!(f, "{id}: {field} cached as {cached}, ground truth {observed}"),
            Discrepancy::DanglingLine { playlist, line } => {
                write!(f, "{playlist}.m3u: dangling line '{line}'")
            }
            Discrepancy::ForeignFile { path } => {
                write!(f, "foreign file: {}", path.display())
            }
            Discrepancy::UnreadableFile { path, message } => {
                write!(f, "unreadable file {}: {message}", path.display())
            }
        }
    }
}

/// Recompute every track record from ground truth and report where the
/// cache disagrees. Read-only; safe to run concurrently with mutations at
/// the cost of possibly reporting in-flight operations.
pub fn verify(settings: &Settings, cache: &Cache) -> Result<Vec<Discrepancy>> {
    let (observed, mut discrepancies) = observe(settings, cache)?;

    for track in observed.values() {
        match cache.get(&track.id) {
            None => discrepancies.push(Discrepancy::MissingEntry {
                id: track.id,
                playlist: track.playlist.clone(),
            }),
            Some(cached) => diff_tracks(cached, track, &mut discrepancies),
        }
    }
    for cached in cache.tracks() {
        if !observed.contains_key(&cached.id) {
            discrepancies.push(Discrepancy::OrphanedEntry { id: cached.id });
        }
    }

    Ok(discrepancies)
}

/// Verify, then make the stores consistent again: the recomputed records
/// replace the cache wholesale, and ordering lines pointing at missing
/// files are dropped. Returns what was found (and fixed).
pub fn repair(settings: &Settings, cache: &mut Cache) -> Result<Vec<Discrepancy>> {
    let discrepancies = verify(settings, cache)?;
    if discrepancies.is_empty() {
        return Ok(discrepancies);
    }
    for discrepancy in &discrepancies {
        warn!(%discrepancy, "repairing");
    }

    for d in &discrepancies {
        if let Discrepancy::DanglingLine { playlist, line } = d {
            ordering::remove_entry(&settings.ordering_path(playlist), line)?;
        }
    }

    let (observed, _) = observe(settings, cache)?;
    cache.replace_all(observed);
    cache.persist()?;
    Ok(discrepancies)
}

/// Walk the playlist directories and rebuild the record every present
/// audio file should have. `uploader` and `expiration` have no ground
/// truth and are carried over from the existing cache entry when there is
/// one.
fn observe(
    settings: &Settings,
    cache: &Cache,
) -> Result<(HashMap<TrackId, Track>, Vec<Discrepancy>)> {
    let mut observed = HashMap::new();
    let mut discrepancies = Vec::new();

    for playlist in &settings.playlists {
        let dir = settings.playlist_dir(playlist);
        if !dir.is_dir() {
            continue;
        }
        let counts = ordering::line_counts(&settings.ordering_path(playlist))?;
        let mut seen_files: Vec<String> = Vec::new();

        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                discrepancies.push(Discrepancy::ForeignFile {
                    path: entry.path().to_path_buf(),
                });
                continue;
            }
            let (id, ext) = match parse_file_name(entry.path()) {
                Some(parts) => parts,
                None => {
                    discrepancies.push(Discrepancy::ForeignFile {
                        path: entry.path().to_path_buf(),
                    });
                    continue;
                }
            };

            let relative = format!("{playlist}/{id}.{ext}");
            seen_files.push(relative.clone());
            let weight = counts
                .iter()
                .filter(|(line, _)| ordering_line_matches(line, &relative))
                .map(|(_, n)| n)
                .sum::<usize>() as u32;

            match rebuild_track(entry.path(), id, ext, playlist, weight, cache.get(&id)) {
                Ok(track) => {
                    observed.insert(id, track);
                }
                Err(e) => discrepancies.push(Discrepancy::UnreadableFile {
                    path: entry.path().to_path_buf(),
                    message: e.to_string(),
                }),
            }
        }

        for line in counts.keys() {
            if !seen_files.iter().any(|rel| ordering_line_matches(line, rel)) {
                discrepancies.push(Discrepancy::DanglingLine {
                    playlist: playlist.clone(),
                    line: line.clone(),
                });
            }
        }
    }

    Ok((observed, discrepancies))
}

/// `<uuid>.<ext>` or nothing.
fn parse_file_name(path: &Path) -> Option<(TrackId, FileType)> {
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension()?.to_str()?;
    Some((TrackId::from_str(stem).ok()?, FileType::from_ext(ext)?))
}

/// Two ordering lines refer to the same track when their trailing path
/// components agree; hand edits sometimes leave absolute paths behind.
fn ordering_line_matches(line: &str, relative: &str) -> bool {
    line.rsplit('/').next() == relative.rsplit('/').next()
}

fn rebuild_track(
    path: &Path,
    id: TrackId,
    ext: FileType,
    playlist: &str,
    weight: u32,
    cached: Option<&Track>,
) -> Result<Track> {
    let snapshot = tags::read_snapshot(path)?;

    let text = |field: Field| snapshot.get(field).unwrap_or("").to_string();
    let number = |field: Field, default: f64| -> Result<f64> {
        match snapshot.get(field) {
            Some(raw) => tags::parse(field, raw).map(|v| v.as_f64().unwrap_or(default)),
            None => Ok(default),
        }
    };

    let import_timestamp = match snapshot.get(Field::ImportTimestamp) {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map_err(|_| crate::error::Error::invalid_field("import_timestamp", raw.to_string()))?,
        None => cached
            .map(|t| t.import_timestamp)
            .unwrap_or_else(|| Local::now().fixed_offset()),
    };
    let last_play = match snapshot.get(Field::LastPlay) {
        Some(raw) if !raw.is_empty() => Some(DateTime::parse_from_rfc3339(raw).map_err(|_| {
            crate::error::Error::invalid_field("last_play", raw.to_string())
        })?),
        _ => None,
    };
    let play_count = match snapshot.get(Field::PlayCount) {
        Some(raw) => tags::parse(Field::PlayCount, raw)?.as_u64().unwrap_or(0),
        None => 0,
    };

    Ok(Track {
        id,
        ext,
        playlist: playlist.to_string(),
        original_filename: text(Field::OriginalFilename),
        import_timestamp,
        weight,
        artist: text(Field::Artist),
        title: text(Field::Title),
        track_gain: number(Field::TrackGain, 0.0)?,
        cue_in: number(Field::CueIn, 0.0)?,
        cue_out: number(Field::CueOut, snapshot.duration_secs)?,
        play_count,
        last_play,
        channels: snapshot.channels.unwrap_or(2),
        samplerate: snapshot.samplerate.unwrap_or(44100),
        bitrate: snapshot.bitrate.unwrap_or(0).max(1),
        uploader: cached.map(|t| t.uploader.clone()).unwrap_or_default(),
        expiration: cached.and_then(|t| t.expiration),
    })
}

fn diff_tracks(cached: &Track, observed: &Track, out: &mut Vec<Discrepancy>) {
    if cached.weight != observed.weight {
        out.push(Discrepancy::WeightMismatch {
            id: cached.id,
            cached: cached.weight,
            observed: observed.weight,
        });
    }
    // uploader and expiration were carried over, weight is reported above.
    for field in Field::ALL {
        if matches!(
            field,
            Field::Id | Field::Weight | Field::Uploader | Field::Expiration
        ) {
            continue;
        }
        let (a, b) = (cached.get(field), observed.get(field));
        if !values_agree(field, &a, &b) {
            out.push(Discrepancy::FieldMismatch {
                id: cached.id,
                field,
                cached: a,
                observed: b,
            });
        }
    }
}

/// Floats compare with a small tolerance; tag round-trips may lose
/// precision in the decimal rendering.
fn values_agree(field: Field, a: &Value, b: &Value) -> bool {
    match field {
        Field::TrackGain | Field::CueIn | Field::CueOut => {
            match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => (x - y).abs() < 1e-6,
                _ => a == b,
            }
        }
        _ => a == b,
    }
}
