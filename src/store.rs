//! The three persistent stores backing the library.
//!
//! Ground truth is split across embedded audio tags ([`tags`]) and the
//! per-playlist ordering files ([`ordering`]); the JSON metadata cache
//! ([`index`]) is a fast, reconstructible view over both. Every write in
//! this module lands via write-temp-then-rename so readers never observe
//! a partially written file.

pub mod index;
pub mod ordering;
pub mod tags;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Replace `path` with `contents` atomically: the bytes are written to a
/// sibling temp file first and renamed over the target.
pub(crate) fn replace_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp = tmp_path(path);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

/// Sibling temp path in the same directory, so the final rename stays on
/// one filesystem.
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}
