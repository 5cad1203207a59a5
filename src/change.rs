//! The change model: immutable values describing one pending mutation to
//! one track.
//!
//! Producing a change performs no I/O. Analyzers emit ordered change
//! lists; the processor pipeline is the single place where they turn
//! into side effects. This keeps validation strictly ahead of mutation.

use std::path::PathBuf;

use serde_json::Value;

use crate::track::Field;

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Move a staged file into its playlist directory under `<id>.<ext>`.
    FileAddition { source: PathBuf },
    /// Set one cache/tag field to the given value.
    MetadataChange { field: Field, value: Value },
    /// Remove the audio file, its ordering lines and its cache entry.
    FileDeletion,
}

impl Change {
    pub fn metadata(field: Field, value: impl Into<Value>) -> Self {
        Change::MetadataChange {
            field,
            value: value.into(),
        }
    }

    pub fn is_addition(&self) -> bool {
        matches!(self, Change::FileAddition { .. })
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self, Change::FileDeletion)
    }

    /// The metadata value this change assigns to `field`, if any.
    pub fn value_for(&self, field: Field) -> Option<&Value> {
        match self {
            Change::MetadataChange { field: f, value } if *f == field => Some(value),
            _ => None,
        }
    }
}

/// Convenience lookup over an ordered change list: the last write to a
/// field wins, matching the order in which processors apply changes.
pub fn last_value_for(changes: &[Change], field: Field) -> Option<&Value> {
    changes.iter().rev().find_map(|c| c.value_for(field))
}
