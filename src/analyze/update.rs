use std::str::FromStr;

use crate::change::Change;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::track::Field;

use super::{Analyzer, AnalyzerRequest};

/// Validates caller-supplied field changes against the update allow-list
/// and per-field type/range rules, and turns them into metadata changes.
/// Any disallowed key or malformed value rejects the whole request.
pub struct UpdateFieldAnalyzer;

impl Analyzer for UpdateFieldAnalyzer {
    fn analyze(&self, _settings: &Settings, request: &AnalyzerRequest<'_>) -> Result<Vec<Change>> {
        let payload = request
            .payload
            .ok_or_else(|| Error::Validation("No field changes supplied".to_string()))?;

        let mut changes = Vec::with_capacity(payload.len());
        for (key, value) in payload {
            let field = Field::from_str(key)?;
            if !field.updatable() {
                return Err(Error::Validation(format!("Key not allowed: {key}")));
            }
            field.validate(value)?;
            changes.push(Change::metadata(field, value.clone()));
        }
        Ok(changes)
    }
}
