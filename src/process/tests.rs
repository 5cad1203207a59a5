use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tempfile::TempDir;
use uuid::Uuid;

use crate::analyze::{self, AnalyzerRequest, AudioAnalysis, AudioAnalyzer};
use crate::change::Change;
use crate::config::Settings;
use crate::error::Error;
use crate::store::index::Cache;
use crate::store::{ordering, tags};
use crate::track::{Field, FileType, TrackId};

use super::*;

fn write_wav(path: &Path) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..44100u32 * 6 {
        let t = i as f32 / 44100.0;
        let sample = ((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 16000.0) as i16;
        writer.write_sample(sample).unwrap();
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

struct StubAudio;

impl AudioAnalyzer for StubAudio {
    fn analyze(&self, _path: &Path) -> crate::error::Result<AudioAnalysis> {
        Ok(AudioAnalysis {
            duration: 6.0,
            cue_in: 0.1,
            cue_out: 5.9,
            channels: 2,
            samplerate: 44100,
            bitrate: 192,
            track_gain: -3.5,
        })
    }
}

fn setup() -> (TempDir, Settings) {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::with_data_dir(dir.path());
    for playlist in &settings.playlists {
        fs::create_dir_all(settings.playlist_dir(playlist)).unwrap();
    }
    (dir, settings)
}

/// Analyze a staged WAV and run the full pipeline, returning the new id.
fn ingest(settings: &Settings, cache: &mut Cache, playlist: &str, name: &str) -> TrackId {
    let staged = settings.data_dir.join("staged.wav");
    write_wav(&staged);

    let id = Uuid::new_v4();
    let request = AnalyzerRequest {
        playlist,
        id,
        ext: FileType::Wav,
        source: Some(&staged),
        original_filename: Some(name),
        uploader: Some("studio"),
        payload: None,
    };
    let analyzers = analyze::upload_analyzers(Arc::new(StubAudio));
    let changes = analyze::run(&analyzers, settings, &request).unwrap();

    let mut ctx = ProcessorContext {
        settings,
        cache,
        playlist,
        id,
        ext: FileType::Wav,
    };
    run(&default_processors(), &mut ctx, &changes).unwrap();
    id
}

fn update_changes(payload: Map<String, Value>) -> Vec<Change> {
    let settings = Settings::default();
    let request = AnalyzerRequest {
        playlist: "music",
        id: Uuid::new_v4(),
        ext: FileType::Wav,
        source: None,
        original_filename: None,
        uploader: None,
        payload: Some(&payload),
    };
    analyze::run(&analyze::update_analyzers(), &settings, &request).unwrap()
}

fn apply(
    settings: &Settings,
    cache: &mut Cache,
    id: TrackId,
    changes: &[Change],
) -> crate::error::Result<()> {
    let mut ctx = ProcessorContext {
        settings,
        cache,
        playlist: "music",
        id,
        ext: FileType::Wav,
    };
    run(&default_processors(), &mut ctx, changes)
}

#[test]
fn upload_commits_file_tags_and_cache() {
    let (_dir, settings) = setup();
    let mut cache = Cache::empty(settings.index_path());

    let id = ingest(&settings, &mut cache, "music", "song.wav");

    let file = settings.playlist_dir("music").join(format!("{id}.wav"));
    assert!(file.is_file());

    let track = cache.get(&id).unwrap();
    assert_eq!(track.playlist, "music");
    assert_eq!(track.original_filename, "song.wav");
    assert_eq!(track.weight, 0);
    assert_eq!(track.play_count, 0);
    assert!((track.cue_in - 0.1).abs() < f64::EPSILON);

    // The cache snapshot hit the disk.
    let persisted = Cache::load(settings.index_path()).unwrap();
    assert!(persisted.contains(&id));

    // Cue points and gain landed in the embedded tags.
    let snapshot = tags::read_snapshot(&file).unwrap();
    assert_eq!(snapshot.get(Field::CueIn), Some("0.1"));
    assert_eq!(snapshot.get(Field::TrackGain), Some("-3.5 dB"));

    // Weight 0 keeps the track out of the ordering file.
    let counts = ordering::line_counts(&settings.ordering_path("music")).unwrap();
    assert!(counts.is_empty());
}

#[test]
fn duplicate_upload_is_rejected() {
    let (_dir, settings) = setup();
    let mut cache = Cache::empty(settings.index_path());
    ingest(&settings, &mut cache, "music", "song.wav");

    let staged = settings.data_dir.join("again.wav");
    write_wav(&staged);
    let id = Uuid::new_v4();
    let request = AnalyzerRequest {
        playlist: "music",
        id,
        ext: FileType::Wav,
        source: Some(&staged),
        original_filename: Some("song.wav"),
        uploader: None,
        payload: None,
    };
    let changes = analyze::run(
        &analyze::upload_analyzers(Arc::new(StubAudio)),
        &settings,
        &request,
    )
    .unwrap();

    let err = apply(&settings, &mut cache, id, &changes).unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m.contains("Duplicate")));
    assert_eq!(cache.len(), 1);
}

#[test]
fn same_filename_in_another_playlist_is_not_a_duplicate() {
    let (_dir, settings) = setup();
    let mut cache = Cache::empty(settings.index_path());
    ingest(&settings, &mut cache, "music", "song.wav");
    ingest(&settings, &mut cache, "classics", "song.wav");
    assert_eq!(cache.len(), 2);
}

#[test]
fn weight_update_rewrites_the_ordering_file() {
    let (_dir, settings) = setup();
    let mut cache = Cache::empty(settings.index_path());
    let id = ingest(&settings, &mut cache, "music", "song.wav");

    let mut payload = Map::new();
    payload.insert("weight".to_string(), json!(3));
    apply(&settings, &mut cache, id, &update_changes(payload)).unwrap();

    let relative = format!("music/{id}.wav");
    let count = ordering::count_for(&settings.ordering_path("music"), &relative).unwrap();
    assert_eq!(count, 3);
    assert_eq!(cache.get(&id).unwrap().weight, 3);
}

#[test]
fn artist_update_writes_tags_but_leaves_ordering_alone() {
    let (_dir, settings) = setup();
    let mut cache = Cache::empty(settings.index_path());
    let id = ingest(&settings, &mut cache, "music", "song.wav");

    let mut payload = Map::new();
    payload.insert("weight".to_string(), json!(2));
    apply(&settings, &mut cache, id, &update_changes(payload)).unwrap();

    let mut payload = Map::new();
    payload.insert("artist".to_string(), json!("Someone"));
    apply(&settings, &mut cache, id, &update_changes(payload)).unwrap();

    let relative = format!("music/{id}.wav");
    let count = ordering::count_for(&settings.ordering_path("music"), &relative).unwrap();
    assert_eq!(count, 2);
    assert_eq!(cache.get(&id).unwrap().artist, "Someone");

    let file = settings.playlist_dir("music").join(format!("{id}.wav"));
    let snapshot = tags::read_snapshot(&file).unwrap();
    assert_eq!(snapshot.get(Field::Artist), Some("Someone"));
}

#[test]
fn update_of_unknown_track_is_not_found() {
    let (_dir, settings) = setup();
    let mut cache = Cache::empty(settings.index_path());

    let mut payload = Map::new();
    payload.insert("weight".to_string(), json!(1));
    let err = apply(
        &settings,
        &mut cache,
        Uuid::new_v4(),
        &update_changes(payload),
    )
    .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn deletion_removes_all_three_stores_last_of_all_the_file() {
    let (_dir, settings) = setup();
    let mut cache = Cache::empty(settings.index_path());
    let id = ingest(&settings, &mut cache, "music", "song.wav");

    let mut payload = Map::new();
    payload.insert("weight".to_string(), json!(2));
    apply(&settings, &mut cache, id, &update_changes(payload)).unwrap();

    apply(&settings, &mut cache, id, &[Change::FileDeletion]).unwrap();

    let file = settings.playlist_dir("music").join(format!("{id}.wav"));
    assert!(!file.exists());
    assert!(!cache.contains(&id));
    let relative = format!("music/{id}.wav");
    let count = ordering::count_for(&settings.ordering_path("music"), &relative).unwrap();
    assert_eq!(count, 0);

    let persisted = Cache::load(settings.index_path()).unwrap();
    assert!(!persisted.contains(&id));
}

#[test]
fn deleting_a_missing_track_is_not_found() {
    let (_dir, settings) = setup();
    let mut cache = Cache::empty(settings.index_path());

    let err = apply(&settings, &mut cache, Uuid::new_v4(), &[Change::FileDeletion]).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn oversized_weight_is_rejected_before_any_store_is_touched() {
    let (_dir, settings) = setup();
    let mut cache = Cache::empty(settings.index_path());
    let id = ingest(&settings, &mut cache, "music", "song.wav");

    let mut payload = Map::new();
    payload.insert("weight".to_string(), json!(2));
    apply(&settings, &mut cache, id, &update_changes(payload)).unwrap();

    let changes = vec![Change::metadata(Field::Weight, json!(u64::from(u32::MAX) + 1))];
    let err = apply(&settings, &mut cache, id, &changes).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let relative = format!("music/{id}.wav");
    let count = ordering::count_for(&settings.ordering_path("music"), &relative).unwrap();
    assert_eq!(count, 2);
    assert_eq!(cache.get(&id).unwrap().weight, 2);
}

#[test]
fn check_processor_rejects_malformed_values_before_any_io() {
    let (_dir, settings) = setup();
    let mut cache = Cache::empty(settings.index_path());
    let id = ingest(&settings, &mut cache, "music", "song.wav");

    let changes = vec![Change::metadata(Field::Weight, json!(-1))];
    let err = apply(&settings, &mut cache, id, &changes).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(cache.get(&id).unwrap().weight, 0);
}
