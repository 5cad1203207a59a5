//! Track records and their metadata field catalogue.
//!
//! A track is one audio file plus its metadata, identified by UUID and
//! file type. The field catalogue drives validation, the update
//! allow-list and the mapping onto embedded tags.

mod fields;
mod model;

pub use fields::{Field, LOG_FIELDS};
pub use model::{FileType, Track, TrackId};

#[cfg(test)]
mod tests;
