//! The analyzer pipeline.
//!
//! Analyzers are pure with respect to the stores: they inspect an
//! incoming upload or update request (plus the external audio analysis
//! output) and produce an ordered list of [`Change`]s, or reject the
//! request outright. The first failure aborts the whole operation before
//! any processor runs.

mod update;
mod upload;

pub use update::UpdateFieldAnalyzer;
pub use upload::{AcousticAnalyzer, StructuralAnalyzer, TagAnalyzer};

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::change::Change;
use crate::config::Settings;
use crate::error::Result;
use crate::track::{FileType, TrackId};

/// One analyzer request: the track coordinates plus whatever the caller
/// supplied (a staged file for uploads, a field map for updates).
#[derive(Debug, Clone)]
pub struct AnalyzerRequest<'a> {
    pub playlist: &'a str,
    pub id: TrackId,
    pub ext: FileType,
    /// Staged file to ingest (uploads only).
    pub source: Option<&'a Path>,
    /// Name the file had before staging (uploads only).
    pub original_filename: Option<&'a str>,
    /// Who initiated the upload, when known.
    pub uploader: Option<&'a str>,
    /// Requested field changes (updates only).
    pub payload: Option<&'a Map<String, Value>>,
}

/// A single analysis step. The analyzer set is fixed per deployment and
/// composed as an ordered list.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, settings: &Settings, request: &AnalyzerRequest<'_>) -> Result<Vec<Change>>;
}

/// Run the analyzers in order, concatenating their changes. Any failure
/// aborts the operation with zero mutation performed.
pub fn run(
    analyzers: &[Box<dyn Analyzer>],
    settings: &Settings,
    request: &AnalyzerRequest<'_>,
) -> Result<Vec<Change>> {
    let mut changes = Vec::new();
    for analyzer in analyzers {
        changes.extend(analyzer.analyze(settings, request)?);
    }
    Ok(changes)
}

/// The standard upload pipeline: structure, embedded tags, acoustics.
pub fn upload_analyzers(audio: Arc<dyn AudioAnalyzer>) -> Vec<Box<dyn Analyzer>> {
    vec![
        Box::new(StructuralAnalyzer),
        Box::new(TagAnalyzer),
        Box::new(AcousticAnalyzer::new(audio)),
    ]
}

/// The standard update pipeline.
pub fn update_analyzers() -> Vec<Box<dyn Analyzer>> {
    vec![Box::new(UpdateFieldAnalyzer)]
}

/// Output of the external audio analysis collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAnalysis {
    /// Total file duration in seconds.
    pub duration: f64,
    /// Detected start of the audible portion, seconds.
    pub cue_in: f64,
    /// Detected end of the audible portion, seconds.
    pub cue_out: f64,
    pub channels: u8,
    pub samplerate: u32,
    pub bitrate: u32,
    /// ReplayGain track gain, dB.
    pub track_gain: f64,
}

/// The external audio analysis tool, seen from this crate as a plain
/// capability: path in, measurements out. Failures are treated as upload
/// rejections.
pub trait AudioAnalyzer: Send + Sync {
    fn analyze(&self, path: &Path) -> Result<AudioAnalysis>;
}

/// Fallback collaborator that derives stream properties from the file
/// headers only: cue points span the whole file and the gain is flat.
/// Real deployments plug in the full loudness/silence analysis tool.
pub struct ProbeAnalyzer;

impl AudioAnalyzer for ProbeAnalyzer {
    fn analyze(&self, path: &Path) -> Result<AudioAnalysis> {
        let snapshot = crate::store::tags::read_snapshot(path)
            .map_err(|e| crate::error::Error::Analysis(format!("cannot probe audio: {e}")))?;
        Ok(AudioAnalysis {
            duration: snapshot.duration_secs,
            cue_in: 0.0,
            cue_out: snapshot.duration_secs,
            channels: snapshot.channels.unwrap_or(2),
            samplerate: snapshot.samplerate.unwrap_or(44100),
            bitrate: snapshot.bitrate.unwrap_or(0).max(1),
            track_gain: 0.0,
        })
    }
}
