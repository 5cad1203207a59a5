use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/cartwall/config.toml` or `~/.config/cartwall/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `CARTWALL__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the data directory: one subdirectory and one `.m3u` ordering
    /// file per playlist, plus `index.json`, `log/` and `upload/`.
    pub data_dir: PathBuf,

    /// The fixed set of playlists. A track belongs to exactly one playlist
    /// for its lifetime.
    pub playlists: Vec<String>,

    /// The playlist holding jingles; it gets a lower minimum track duration.
    pub jingle_playlist: String,

    /// Minimum audible duration (seconds, between the cue points) for tracks
    /// uploaded to regular playlists.
    pub min_duration_secs: f64,

    /// Minimum audible duration (seconds) for the jingle playlist.
    pub min_jingle_duration_secs: f64,

    /// Samplerates accepted by the acoustic analyzer (Hz).
    pub samplerates: Vec<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            playlists: vec!["music".into(), "classics".into(), "jingles".into()],
            jingle_playlist: "jingles".to_string(),
            min_duration_secs: 5.0,
            min_jingle_duration_secs: 0.5,
            samplerates: vec![22050, 44100, 48000],
        }
    }
}

impl Settings {
    /// Whether `name` is one of the configured playlists.
    pub fn is_playlist(&self, name: &str) -> bool {
        self.playlists.iter().any(|p| p == name)
    }

    /// Minimum audible duration for a track in `playlist`, in seconds.
    pub fn min_duration_for(&self, playlist: &str) -> f64 {
        if playlist == self.jingle_playlist {
            self.min_jingle_duration_secs
        } else {
            self.min_duration_secs
        }
    }

    /// Directory holding the audio files of `playlist`.
    pub fn playlist_dir(&self, playlist: &str) -> PathBuf {
        self.data_dir.join(playlist)
    }

    /// Path of the `.m3u` ordering file of `playlist`.
    pub fn ordering_path(&self, playlist: &str) -> PathBuf {
        self.data_dir.join(format!("{playlist}.m3u"))
    }

    /// Path of the JSON metadata cache.
    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join("index.json")
    }

    /// Directory holding the monthly CSV play logs.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("log")
    }

    /// Directory where uploads are staged before commit.
    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("upload")
    }

    /// Settings rooted at an explicit data directory, keeping all other
    /// values at their defaults. Used by the CLI `--data` override and tests.
    pub fn with_data_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }
}
