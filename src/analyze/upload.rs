use std::sync::Arc;

use chrono::Local;
use serde_json::json;

use crate::change::Change;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::store::tags;
use crate::track::Field;

use super::{Analyzer, AnalyzerRequest, AudioAnalyzer};

/// Validates the shape of the upload and seeds the track record: id,
/// location, provenance and zeroed play history. New tracks start with
/// weight 0, so they stay out of rotation until someone enables them.
pub struct StructuralAnalyzer;

impl Analyzer for StructuralAnalyzer {
    fn analyze(&self, settings: &Settings, request: &AnalyzerRequest<'_>) -> Result<Vec<Change>> {
        let source = request
            .source
            .ok_or_else(|| Error::Validation("No file supplied".to_string()))?;

        if !settings.is_playlist(request.playlist) {
            return Err(Error::NotFound(format!(
                "Unknown playlist: {}",
                request.playlist
            )));
        }

        let original_filename = request
            .original_filename
            .map(str::to_string)
            .or_else(|| {
                source
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
            })
            .ok_or_else(|| Error::Validation("Upload has no usable file name".to_string()))?;

        let now = Local::now().fixed_offset();

        Ok(vec![
            Change::FileAddition {
                source: source.to_path_buf(),
            },
            Change::metadata(Field::Id, json!(request.id)),
            Change::metadata(Field::Ext, json!(request.ext.as_str())),
            Change::metadata(Field::Playlist, json!(request.playlist)),
            Change::metadata(Field::OriginalFilename, json!(original_filename)),
            Change::metadata(Field::ImportTimestamp, json!(now.to_rfc3339())),
            Change::metadata(Field::Weight, json!(0)),
            Change::metadata(Field::PlayCount, json!(0)),
            Change::metadata(Field::LastPlay, json!("")),
            Change::metadata(Field::Uploader, json!(request.uploader.unwrap_or(""))),
            Change::metadata(Field::Expiration, json!("")),
        ])
    }
}

/// Carries over artist and title from tags already embedded in the
/// uploaded file, defaulting to empty strings.
pub struct TagAnalyzer;

impl Analyzer for TagAnalyzer {
    fn analyze(&self, _settings: &Settings, request: &AnalyzerRequest<'_>) -> Result<Vec<Change>> {
        let source = request
            .source
            .ok_or_else(|| Error::Validation("No file supplied".to_string()))?;

        let snapshot = tags::read_snapshot(source)
            .map_err(|_| Error::Analysis("Unsupported file type: cannot read metadata".into()))?;

        Ok(vec![
            Change::metadata(Field::Artist, json!(snapshot.get(Field::Artist).unwrap_or(""))),
            Change::metadata(Field::Title, json!(snapshot.get(Field::Title).unwrap_or(""))),
        ])
    }
}

/// Runs the external audio analysis collaborator and turns its
/// measurements into metadata, enforcing the playlist's duration minimum
/// and the cue invariant `0 <= cue_in < cue_out <= duration`.
pub struct AcousticAnalyzer {
    audio: Arc<dyn AudioAnalyzer>,
}

impl AcousticAnalyzer {
    pub fn new(audio: Arc<dyn AudioAnalyzer>) -> Self {
        AcousticAnalyzer { audio }
    }
}

// The length calculation of some decoders is not perfectly accurate;
// tolerate cue_out exceeding the reported duration by this much.
const DURATION_TOLERANCE: f64 = 0.1;

impl Analyzer for AcousticAnalyzer {
    fn analyze(&self, settings: &Settings, request: &AnalyzerRequest<'_>) -> Result<Vec<Change>> {
        let source = request
            .source
            .ok_or_else(|| Error::Validation("No file supplied".to_string()))?;

        let analysis = self.audio.analyze(source)?;

        if analysis.cue_in < 0.0
            || analysis.cue_in >= analysis.cue_out
            || analysis.cue_out > analysis.duration + DURATION_TOLERANCE
        {
            return Err(Error::Validation(format!(
                "Invalid cue points: cue_in {} / cue_out {} for a {}s track",
                analysis.cue_in, analysis.cue_out, analysis.duration
            )));
        }

        let audible = analysis.cue_out - analysis.cue_in;
        let minimum = settings.min_duration_for(request.playlist);
        if audible < minimum {
            return Err(Error::Validation(format!(
                "Track too short: {audible:.2}s of audio, playlist '{}' requires {minimum}s",
                request.playlist
            )));
        }

        if !settings.samplerates.contains(&analysis.samplerate) {
            return Err(Error::Validation(format!(
                "Unsupported samplerate: {} Hz",
                analysis.samplerate
            )));
        }

        if !(analysis.channels == 1 || analysis.channels == 2) {
            return Err(Error::Validation(format!(
                "Unsupported channel count: {}",
                analysis.channels
            )));
        }

        Ok(vec![
            Change::metadata(Field::Channels, json!(analysis.channels)),
            Change::metadata(Field::Samplerate, json!(analysis.samplerate)),
            Change::metadata(Field::Bitrate, json!(analysis.bitrate)),
            Change::metadata(Field::TrackGain, json!(analysis.track_gain)),
            Change::metadata(Field::CueIn, json!(analysis.cue_in)),
            Change::metadata(Field::CueOut, json!(analysis.cue_out)),
        ])
    }
}
