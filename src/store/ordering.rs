//! Per-playlist plain-text ordering files (`<playlist>.m3u`).
//!
//! One relative path per line, no header. A track with weight W appears
//! as exactly W lines; the line count is the single source of truth for
//! weight. Rewrites drop every line for the track and append the fresh
//! repetition count, so no separate counter can drift.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Read the ordering file into per-line occurrence counts. Blank lines
/// are ignored. A missing file counts as empty.
pub fn line_counts(path: &Path) -> Result<HashMap<String, usize>> {
    let mut counts = HashMap::new();
    if !path.is_file() {
        return Ok(counts);
    }
    let raw = fs::read_to_string(path)?;
    for line in raw.lines() {
        let line = line.trim();
        if !line.is_empty() {
            *counts.entry(line.to_string()).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

/// Number of lines for one track (its relative path) in the ordering file.
pub fn count_for(path: &Path, relative_path: &str) -> Result<usize> {
    Ok(line_counts(path)?
        .get(relative_path)
        .copied()
        .unwrap_or(0))
}

/// Rewrite the ordering file so the track appears exactly `weight` times:
/// all existing lines for the track's file name are removed, then its
/// relative path is appended `weight` times. The rewrite goes through a
/// temp file and an atomic rename.
pub fn set_weight(path: &Path, relative_path: &str, weight: u32) -> Result<()> {
    let file_name = relative_path
        .rsplit('/')
        .next()
        .unwrap_or(relative_path);

    let mut lines: Vec<String> = if path.is_file() {
        fs::read_to_string(path)?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !is_entry_for(l, file_name))
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };

    for _ in 0..weight {
        lines.push(relative_path.to_string());
    }

    let mut contents = lines.join("\n");
    if !contents.is_empty() {
        contents.push('\n');
    }
    super::replace_file(path, contents.as_bytes())?;
    Ok(())
}

/// Drop every line for the track (used on deletion).
pub fn remove_entry(path: &Path, relative_path: &str) -> Result<()> {
    set_weight(path, relative_path, 0)
}

/// Whether an ordering line refers to the given `<id>.<ext>` file name.
/// Matches on the trailing path component, tolerating absolute or
/// playlist-prefixed variants left behind by hand edits.
fn is_entry_for(line: &str, file_name: &str) -> bool {
    line.rsplit('/').next() == Some(file_name)
}
