//! The processor pipeline.
//!
//! Processors take the accumulated changes for one track and apply them
//! to the three stores, in a fixed order: validate, place the file,
//! write tags, rewrite the ordering file, commit the cache, and only
//! then remove a deleted track's audio file. Any I/O error aborts the
//! remaining steps; ground truth already written stays in place and the
//! next fsck run reconciles the cache.

use std::fs;
use std::path::PathBuf;

use serde_json::{Map, Value};
use tracing::debug;

use crate::change::{last_value_for, Change};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::store::index::Cache;
use crate::store::{ordering, tags};
use crate::track::{Field, FileType, Track, TrackId};

/// Everything a processor may touch while applying one operation.
pub struct ProcessorContext<'a> {
    pub settings: &'a Settings,
    pub cache: &'a mut Cache,
    pub playlist: &'a str,
    pub id: TrackId,
    pub ext: FileType,
}

impl ProcessorContext<'_> {
    /// Final resting place of the audio file: `<playlist>/<id>.<ext>`.
    pub fn file_path(&self) -> PathBuf {
        self.settings
            .playlist_dir(self.playlist)
            .join(format!("{}.{}", self.id, self.ext))
    }

    /// The ordering-file line for this track.
    pub fn relative_path(&self) -> String {
        format!("{}/{}.{}", self.playlist, self.id, self.ext)
    }
}

/// One step of the pipeline. The processor set is fixed per deployment
/// and composed as an ordered list.
pub trait Processor: Send + Sync {
    fn apply(&self, ctx: &mut ProcessorContext<'_>, changes: &[Change]) -> Result<()>;
}

/// Apply the processors in order; the first failure aborts the rest.
pub fn run(
    processors: &[Box<dyn Processor>],
    ctx: &mut ProcessorContext<'_>,
    changes: &[Change],
) -> Result<()> {
    for processor in processors {
        processor.apply(ctx, changes)?;
    }
    Ok(())
}

/// The standard pipeline, in commit order.
pub fn default_processors() -> Vec<Box<dyn Processor>> {
    vec![
        Box::new(CheckProcessor),
        Box::new(DuplicateFilter),
        Box::new(FilePlacer),
        Box::new(TagWriter),
        Box::new(OrderingProcessor),
        Box::new(CacheProcessor),
        Box::new(FileRemover),
    ]
}

/// Re-validates every metadata change (type, range, pattern) before any
/// store is touched. Analyzers already validate their own output; this
/// is the contract for changes arriving from any other producer.
pub struct CheckProcessor;

impl Processor for CheckProcessor {
    fn apply(&self, _ctx: &mut ProcessorContext<'_>, changes: &[Change]) -> Result<()> {
        for change in changes {
            if let Change::MetadataChange { field, value } = change {
                field.validate(value)?;
            }
        }
        Ok(())
    }
}

/// Rejects uploads that duplicate an existing track (same playlist,
/// original filename, artist and title) or reuse a live id.
pub struct DuplicateFilter;

impl Processor for DuplicateFilter {
    fn apply(&self, ctx: &mut ProcessorContext<'_>, changes: &[Change]) -> Result<()> {
        if !changes.iter().any(Change::is_addition) {
            return Ok(());
        }

        if ctx.cache.contains(&ctx.id) {
            return Err(Error::Validation(format!("Duplicate file ID: {}", ctx.id)));
        }

        let filename = last_value_for(changes, Field::OriginalFilename).and_then(Value::as_str);
        let artist = last_value_for(changes, Field::Artist).and_then(Value::as_str);
        let title = last_value_for(changes, Field::Title).and_then(Value::as_str);

        for entry in ctx.cache.tracks() {
            if entry.playlist == ctx.playlist
                && Some(entry.original_filename.as_str()) == filename
                && Some(entry.artist.as_str()) == artist
                && Some(entry.title.as_str()) == title
            {
                return Err(Error::Validation(format!(
                    "Duplicate file entry: {} - {} ({})",
                    entry.artist, entry.title, entry.original_filename
                )));
            }
        }
        Ok(())
    }
}

/// Places an added file into its playlist directory. The staged bytes go
/// to a temporary name in the target directory first, then an atomic
/// rename makes them visible under `<id>.<ext>`. For updates and
/// deletions it only asserts the file is there.
pub struct FilePlacer;

impl Processor for FilePlacer {
    fn apply(&self, ctx: &mut ProcessorContext<'_>, changes: &[Change]) -> Result<()> {
        let path = ctx.file_path();
        for change in changes {
            match change {
                Change::FileAddition { source } => {
                    let tmp = crate::store::tmp_path(&path);
                    fs::copy(source, &tmp)?;
                    fs::rename(&tmp, &path)?;
                    debug!(path = %path.display(), "placed audio file");
                }
                Change::FileDeletion | Change::MetadataChange { .. } => {
                    if !path.is_file() {
                        return Err(Error::NotFound(format!(
                            "{}/{}.{}",
                            ctx.playlist, ctx.id, ctx.ext
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Writes tag-backed metadata changes into the audio file.
pub struct TagWriter;

impl Processor for TagWriter {
    fn apply(&self, ctx: &mut ProcessorContext<'_>, changes: &[Change]) -> Result<()> {
        if changes.iter().any(Change::is_deletion) {
            return Ok(());
        }
        let fields: Vec<(Field, Value)> = changes
            .iter()
            .filter_map(|c| match c {
                Change::MetadataChange { field, value } if field.tag_backed() => {
                    Some((*field, value.clone()))
                }
                _ => None,
            })
            .collect();
        if fields.is_empty() {
            return Ok(());
        }
        tags::write_fields(&ctx.file_path(), &fields)
    }
}

/// Recomputes the playlist's ordering file when the weight changes or
/// the track goes away.
pub struct OrderingProcessor;

impl Processor for OrderingProcessor {
    fn apply(&self, ctx: &mut ProcessorContext<'_>, changes: &[Change]) -> Result<()> {
        let path = ctx.settings.ordering_path(ctx.playlist);
        let relative = ctx.relative_path();

        if changes.iter().any(Change::is_deletion) {
            return ordering::remove_entry(&path, &relative);
        }
        if let Some(weight) = last_value_for(changes, Field::Weight).and_then(Value::as_u64) {
            ordering::set_weight(&path, &relative, weight as u32)?;
        }
        Ok(())
    }
}

/// Commits the operation to the in-memory cache and persists the JSON
/// snapshot. Runs after the ground-truth stores so a crash beforehand
/// leaves a cache that fsck can rebuild forward.
pub struct CacheProcessor;

impl Processor for CacheProcessor {
    fn apply(&self, ctx: &mut ProcessorContext<'_>, changes: &[Change]) -> Result<()> {
        if changes.iter().any(Change::is_deletion) {
            if ctx.cache.remove(&ctx.id).is_none() {
                return Err(Error::NotFound(ctx.id.to_string()));
            }
        } else if changes.iter().any(Change::is_addition) {
            let track = Track::from_value_map(metadata_map(changes))?;
            ctx.cache.insert(track);
        } else {
            let existing = ctx
                .cache
                .get(&ctx.id)
                .ok_or_else(|| Error::NotFound(ctx.id.to_string()))?;
            let mut map = existing.to_value_map();
            for (key, value) in metadata_map(changes) {
                map.insert(key, value);
            }
            ctx.cache.insert(Track::from_value_map(map)?);
        }
        ctx.cache.persist()
    }
}

/// Deletes the audio file, strictly after the ordering file and cache
/// have dropped the track, so a reader never sees a cache entry whose
/// file is already gone.
pub struct FileRemover;

impl Processor for FileRemover {
    fn apply(&self, ctx: &mut ProcessorContext<'_>, changes: &[Change]) -> Result<()> {
        if changes.iter().any(Change::is_deletion) {
            fs::remove_file(ctx.file_path())?;
            debug!(id = %ctx.id, "removed audio file");
        }
        Ok(())
    }
}

fn metadata_map(changes: &[Change]) -> Map<String, Value> {
    let mut map = Map::new();
    for change in changes {
        if let Change::MetadataChange { field, value } = change {
            map.insert(field.as_str().to_string(), value.clone());
        }
    }
    map
}

#[cfg(test)]
mod tests;
