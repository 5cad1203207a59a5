//! The library facade.
//!
//! One [`Library`] owns the settings, the metadata cache and the
//! per-playlist locks, and exposes the mutating operations: upload,
//! metadata update, deletion, play logging, expiration sweep and
//! reanalysis. Every mutation runs the analyzer pipeline first and the
//! processor pipeline under the playlist's lock, so concurrent mutations
//! of one playlist serialize while reads stay lock-free on a snapshot.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Local;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::analyze::{self, AnalyzerRequest, AudioAnalyzer};
use crate::change::Change;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::fsck::{self, Discrepancy};
use crate::playlog;
use crate::process::{self, Processor, ProcessorContext};
use crate::store::index::Cache;
use crate::track::{Field, FileType, Track, TrackId};

pub struct Library {
    settings: Settings,
    cache: Mutex<Cache>,
    playlist_locks: HashMap<String, Mutex<()>>,
    audio: Arc<dyn AudioAnalyzer>,
    processors: Vec<Box<dyn Processor>>,
}

impl Library {
    /// Open an initialized data directory.
    pub fn open(settings: Settings, audio: Arc<dyn AudioAnalyzer>) -> Result<Self> {
        check_data_dir(&settings)?;
        let cache = Cache::load(settings.index_path())?;
        info!(
            data_dir = %settings.data_dir.display(),
            tracks = cache.len(),
            "library opened"
        );

        let playlist_locks = settings
            .playlists
            .iter()
            .map(|p| (p.clone(), Mutex::new(())))
            .collect();

        Ok(Library {
            settings,
            cache: Mutex::new(cache),
            playlist_locks,
            audio,
            processors: process::default_processors(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Ingest one audio file into `playlist`. The file at `source` is
    /// copied, never moved; staging cleanup stays with the caller.
    pub fn upload(
        &self,
        playlist: &str,
        source: &Path,
        original_filename: Option<&str>,
        uploader: Option<&str>,
    ) -> Result<Track> {
        let name = original_filename
            .or_else(|| source.file_name().and_then(|n| n.to_str()))
            .ok_or_else(|| Error::Validation("Upload has no usable file name".to_string()))?;
        let ext = name
            .rsplit('.')
            .next()
            .and_then(FileType::from_ext)
            .ok_or_else(|| Error::Validation(format!("Unsupported file extension: {name}")))?;

        let id = TrackId::new_v4();
        let request = AnalyzerRequest {
            playlist,
            id,
            ext,
            source: Some(source),
            original_filename: Some(name),
            uploader,
            payload: None,
        };
        let analyzers = analyze::upload_analyzers(Arc::clone(&self.audio));
        let changes = analyze::run(&analyzers, &self.settings, &request)?;

        self.apply(playlist, id, ext, &changes)?;
        info!(%id, playlist, original_filename = name, "track uploaded");
        self.require(&id)
    }

    /// Change updatable fields of one track.
    pub fn update(
        &self,
        playlist: &str,
        id: TrackId,
        ext: FileType,
        payload: &Map<String, Value>,
    ) -> Result<Track> {
        self.check_coordinates(playlist, &id, ext)?;
        let request = AnalyzerRequest {
            playlist,
            id,
            ext,
            source: None,
            original_filename: None,
            uploader: None,
            payload: Some(payload),
        };
        let changes = analyze::run(&analyze::update_analyzers(), &self.settings, &request)?;

        self.apply(playlist, id, ext, &changes)?;
        self.require(&id)
    }

    /// Remove a track from all three stores.
    pub fn delete(&self, playlist: &str, id: TrackId, ext: FileType) -> Result<()> {
        self.check_coordinates(playlist, &id, ext)?;
        self.apply(playlist, id, ext, &[Change::FileDeletion])?;
        info!(%id, playlist, "track deleted");
        Ok(())
    }

    /// Record that the playout engine aired this track: bump the play
    /// count, stamp the play time, and append to the play log.
    pub fn log_play(&self, id: TrackId) -> Result<Track> {
        let track = self.require(&id)?;
        let now = Local::now().fixed_offset();
        let changes = vec![
            Change::metadata(Field::PlayCount, json!(track.play_count + 1)),
            Change::metadata(Field::LastPlay, json!(now.to_rfc3339())),
        ];
        self.apply(&track.playlist, id, track.ext, &changes)?;

        let played = self.require(&id)?;
        playlog::log_play(&self.settings, &played, now)?;
        Ok(played)
    }

    /// Take every track whose expiration has passed out of rotation by
    /// setting its weight to zero. Returns the number of tracks disabled.
    pub fn disable_expired(&self) -> Result<usize> {
        let now = Local::now().fixed_offset();
        let expired: Vec<Track> = self
            .tracks()
            .into_iter()
            .filter(|t| t.weight > 0 && t.expiration.is_some_and(|e| e <= now))
            .collect();

        for track in &expired {
            let changes = vec![Change::metadata(Field::Weight, json!(0))];
            self.apply(&track.playlist, track.id, track.ext, &changes)?;
            info!(id = %track.id, "expired track disabled");
        }
        Ok(expired.len())
    }

    /// Re-run the acoustic analysis on a track already in the library and
    /// store the fresh gain, cue points and stream properties.
    pub fn reanalyze(&self, id: TrackId) -> Result<Track> {
        let track = self.require(&id)?;
        let path = self
            .settings
            .playlist_dir(&track.playlist)
            .join(track.file_name());

        let request = AnalyzerRequest {
            playlist: &track.playlist,
            id,
            ext: track.ext,
            source: Some(&path),
            original_filename: None,
            uploader: None,
            payload: None,
        };
        let analyzer = analyze::AcousticAnalyzer::new(Arc::clone(&self.audio));
        let changes = analyze::Analyzer::analyze(&analyzer, &self.settings, &request)?;

        self.apply(&track.playlist, id, track.ext, &changes)?;
        self.require(&id)
    }

    /// Report inconsistencies between ground truth and the cache without
    /// taking any playlist lock.
    pub fn verify(&self) -> Result<Vec<Discrepancy>> {
        let view = self.cache_view();
        fsck::verify(&self.settings, &view)
    }

    /// Verify and make the stores consistent again. Takes every playlist
    /// lock for the duration.
    pub fn repair(&self) -> Result<Vec<Discrepancy>> {
        let _guards: Vec<MutexGuard<'_, ()>> = self
            .playlist_locks
            .values()
            .map(|l| l.lock().unwrap_or_else(PoisonError::into_inner))
            .collect();
        let mut cache = self.lock_cache();
        fsck::repair(&self.settings, &mut cache)
    }

    pub fn get(&self, id: &TrackId) -> Option<Track> {
        self.lock_cache().get(id).cloned()
    }

    /// All tracks, newest first.
    pub fn tracks(&self) -> Vec<Track> {
        let mut tracks: Vec<Track> = self.lock_cache().tracks().cloned().collect();
        tracks.sort_by(|a, b| b.import_timestamp.cmp(&a.import_timestamp));
        tracks
    }

    /// Tracks of one playlist, newest first.
    pub fn playlist_tracks(&self, playlist: &str) -> Vec<Track> {
        self.tracks()
            .into_iter()
            .filter(|t| t.playlist == playlist)
            .collect()
    }

    fn apply(&self, playlist: &str, id: TrackId, ext: FileType, changes: &[Change]) -> Result<()> {
        let lock = self
            .playlist_locks
            .get(playlist)
            .ok_or_else(|| Error::NotFound(format!("Unknown playlist: {playlist}")))?;
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut cache = self.lock_cache();
        let mut ctx = ProcessorContext {
            settings: &self.settings,
            cache: &mut cache,
            playlist,
            id,
            ext,
        };
        process::run(&self.processors, &mut ctx, changes)
    }

    /// Reject operations whose playlist/id/ext triple does not name an
    /// existing track exactly.
    fn check_coordinates(&self, playlist: &str, id: &TrackId, ext: FileType) -> Result<()> {
        let track = self.require(id)?;
        if track.playlist != playlist || track.ext != ext {
            return Err(Error::NotFound(format!("{playlist}/{id}.{ext}")));
        }
        Ok(())
    }

    fn require(&self, id: &TrackId) -> Result<Track> {
        self.get(id).ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn lock_cache(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Detached copy of the cache for lock-free inspection.
    fn cache_view(&self) -> Cache {
        let mut view = Cache::empty(self.settings.index_path());
        view.replace_all(self.lock_cache().snapshot());
        view
    }
}

/// Create the data directory layout: one directory and one ordering file
/// per playlist, an empty cache, the log and upload directories. Existing
/// files are left alone, so running it twice is safe.
pub fn init_data_dir(settings: &Settings) -> Result<()> {
    fs::create_dir_all(&settings.data_dir)?;
    for playlist in &settings.playlists {
        fs::create_dir_all(settings.playlist_dir(playlist))?;
        let ordering = settings.ordering_path(playlist);
        if !ordering.is_file() {
            fs::write(&ordering, b"")?;
        }
    }
    fs::create_dir_all(settings.log_dir())?;
    fs::create_dir_all(settings.upload_dir())?;
    if !settings.index_path().is_file() {
        fs::write(settings.index_path(), b"{}")?;
    }
    info!(data_dir = %settings.data_dir.display(), "data directory initialized");
    Ok(())
}

/// Verify the data directory has the expected layout.
pub fn check_data_dir(settings: &Settings) -> Result<()> {
    let missing = |what: &str| {
        Error::Config(format!(
            "{what} missing under {}; run init first",
            settings.data_dir.display()
        ))
    };
    if !settings.data_dir.is_dir() {
        return Err(missing("data directory"));
    }
    for playlist in &settings.playlists {
        if !settings.playlist_dir(playlist).is_dir() {
            return Err(missing(&format!("playlist directory '{playlist}'")));
        }
        if !settings.ordering_path(playlist).is_file() {
            return Err(missing(&format!("ordering file '{playlist}.m3u'")));
        }
    }
    if !settings.index_path().is_file() {
        return Err(missing("index.json"));
    }
    if !settings.log_dir().is_dir() {
        return Err(missing("log directory"));
    }
    Ok(())
}
