//! Portable export envelope and import.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::clock::Clock;
use crate::ids;
use crate::migrations::migrate_playthrough;
use crate::schema::{Playthrough, SchemaError};

/// Version of the envelope format itself.
pub const EXPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub version: String,
    pub exported_at: i64,
    /// Kept loose so older record shapes can be migrated on import.
    pub playthrough: Value,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("import payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("import payload has no playthrough")]
    MissingPlaythrough,
    #[error("imported playthrough is invalid: {0}")]
    Invalid(#[from] SchemaError),
}

/// Wrap a playthrough for export.
///
/// # Errors
///
/// Returns an error if the playthrough cannot be serialized.
pub fn export_playthrough(
    playthrough: &Playthrough,
    clock: &dyn Clock,
) -> Result<String, serde_json::Error> {
    let envelope = ExportEnvelope {
        version: EXPORT_VERSION.to_string(),
        exported_at: clock.now_millis(),
        playthrough: serde_json::to_value(playthrough)?,
    };
    serde_json::to_string_pretty(&envelope)
}

/// Parse an export, migrate and validate the embedded playthrough, give it a fresh id
/// when `existing_ids` already has one, and stamp `updated_at` with the import time.
///
/// A bare playthrough object without the envelope is accepted too.
///
/// # Errors
///
/// Returns an error if the payload is not JSON, carries no playthrough object, or the
/// playthrough fails validation after migration.
pub fn import_playthrough<'a>(
    json: &str,
    existing_ids: impl IntoIterator<Item = &'a str>,
    clock: &dyn Clock,
) -> Result<Playthrough, ImportError> {
    let payload: Value = serde_json::from_str(json)?;
    let raw = match payload.get("playthrough") {
        Some(inner) if inner.is_object() => inner.clone(),
        Some(_) => return Err(ImportError::MissingPlaythrough),
        None if payload.get("id").is_some() => payload,
        None => return Err(ImportError::MissingPlaythrough),
    };
    let mut playthrough = Playthrough::from_value(migrate_playthrough(raw))?;

    let now = clock.now_millis();
    if existing_ids.into_iter().any(|id| id == playthrough.id) {
        let fresh = ids::new_playthrough_id(now);
        log::debug!("imported id {} collides; using {fresh}", playthrough.id);
        playthrough.id = fresh;
    }
    playthrough.updated_at = now;
    Ok(playthrough)
}
