//! Base entity snapshot on disk: a pretty-printed JSON array of entities.

use crate::error::{IndexerError, Result};
use entity_extractor::BaseEntity;
use serde_json::Value;
use std::path::Path;

/// Entities read back from a base snapshot
#[derive(Debug, Clone, Default)]
pub struct BaseSnapshot {
    pub entities: Vec<BaseEntity>,
    /// Rows dropped for missing or malformed fields
    pub dropped: usize,
}

/// Write the snapshot atomically through a sibling temp file
pub async fn write_base_snapshot(path: impl AsRef<Path>, entities: &[BaseEntity]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(entities).map_err(|e| IndexerError::snapshot(path, e))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    log::debug!("Wrote {} entities to {}", entities.len(), path.display());
    Ok(())
}

/// Read a base snapshot, dropping rows that lack an identity or location.
///
/// A missing file or a document that is not a JSON array is an error.
pub async fn read_base_snapshot(path: impl AsRef<Path>) -> Result<BaseSnapshot> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    let rows: Vec<Value> = serde_json::from_slice(&bytes).map_err(|e| IndexerError::snapshot(path, e))?;

    let mut snapshot = BaseSnapshot::default();
    for (index, row) in rows.into_iter().enumerate() {
        if !has_required_fields(&row) {
            log::warn!("Skipping snapshot row {index}: missing id, type, file, rawName or loc");
            snapshot.dropped += 1;
            continue;
        }
        match serde_json::from_value::<BaseEntity>(row) {
            Ok(entity) => snapshot.entities.push(entity),
            Err(e) => {
                log::warn!("Skipping snapshot row {index}: {e}");
                snapshot.dropped += 1;
            }
        }
    }

    if snapshot.dropped > 0 {
        log::warn!(
            "{}: dropped {} invalid rows, kept {}",
            path.display(),
            snapshot.dropped,
            snapshot.entities.len()
        );
    }
    Ok(snapshot)
}

fn has_required_fields(row: &Value) -> bool {
    let non_empty = |key: &str| row.get(key).and_then(Value::as_str).is_some_and(|s| !s.is_empty());
    ["id", "type", "file", "rawName"].iter().all(|key| non_empty(key))
        && row.get("loc").is_some_and(Value::is_object)
}
