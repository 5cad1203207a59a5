//! Audio library store for radio playout.
//!
//! Tracks live as plain files in per-playlist directories; their metadata
//! lives in three places with a strict hierarchy: embedded tags and the
//! `.m3u` ordering files are ground truth, `index.json` is a derived
//! cache. Playout weight is the number of times a track's path appears in
//! its playlist's ordering file. The [`Library`] facade runs every
//! mutation through an analyzer pipeline (validate, produce changes) and
//! a processor pipeline (apply atomically), and [`fsck`] rebuilds the
//! cache from ground truth after crashes or hand edits.

pub mod analyze;
pub mod change;
pub mod config;
pub mod error;
pub mod fsck;
pub mod library;
pub mod playlog;
pub mod process;
pub mod store;
pub mod track;

pub use change::Change;
pub use config::Settings;
pub use error::{Error, Result};
pub use library::{check_data_dir, init_data_dir, Library};
pub use track::{Field, FileType, Track, TrackId};
