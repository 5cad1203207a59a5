//! Error taxonomy for library store operations.

use thiserror::Error;

/// Common result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad analyzer input: disallowed field, out-of-range value, track too
    /// short, malformed timestamp. Nothing was mutated.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown track id or playlist. Nothing was mutated.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The audio analysis collaborator failed, or the upload is not audio.
    /// Reported to callers as an upload rejection.
    #[error("Analysis failure: {0}")]
    Analysis(String),

    /// I/O failure mid-operation. Fatal for the current operation; any
    /// already-renamed files are reconciled by the next fsck run.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedded tag read/write failure.
    #[error("Tag error: {0}")]
    Tag(#[from] lofty::error::LoftyError),

    /// index.json (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Field-scoped validation error, formatted the way callers expect
    /// structured messages (`field: problem`).
    pub fn invalid_field(field: &str, message: impl AsRef<str>) -> Self {
        Error::Validation(format!("{}: {}", field, message.as_ref()))
    }
}
