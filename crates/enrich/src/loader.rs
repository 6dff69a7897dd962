//! Snapshot and context inputs of a run.

use crate::error::{EnrichError, Result};
use crate::labeler::CommitRecord;
use crate::types::EnrichedEntity;
use entity_extractor::BaseEntity;
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

/// Base entities of the extraction pass; an empty result is an error
pub async fn load_base_entities(path: &Path) -> Result<Vec<BaseEntity>> {
    let snapshot = entity_indexer::read_base_snapshot(path).await?;
    if snapshot.entities.is_empty() {
        return Err(EnrichError::NoEntities(path.to_path_buf()));
    }
    log::info!("Loaded {} entities from {}", snapshot.entities.len(), path.display());
    Ok(snapshot.entities)
}

/// Results of the previous run keyed by id.
///
/// Missing or unreadable files and malformed rows are skipped with a warning.
pub async fn load_prior_results(path: &Path) -> HashMap<String, EnrichedEntity> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::warn!("No previous results at {}, labeling everything", path.display());
            return HashMap::new();
        }
        Err(e) => {
            log::warn!("Cannot read previous results {}: {e}", path.display());
            return HashMap::new();
        }
    };
    let rows: Vec<Value> = match serde_json::from_slice(&bytes) {
        Ok(rows) => rows,
        Err(e) => {
            log::warn!("Ignoring malformed previous results {}: {e}", path.display());
            return HashMap::new();
        }
    };

    let mut prior = HashMap::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<EnrichedEntity>(row) {
            Ok(entity) => {
                prior.insert(entity.base.id.clone(), entity);
            }
            Err(e) => log::warn!("Skipping previous result row {index}: {e}"),
        }
    }
    log::debug!("Loaded {} previous results from {}", prior.len(), path.display());
    prior
}

/// Root `README.md` text, empty when absent
pub async fn load_project_context(root: &Path) -> String {
    match tokio::fs::read_to_string(root.join("README.md")).await {
        Ok(text) => text,
        Err(e) => {
            log::debug!("No project README under {}: {e}", root.display());
            String::new()
        }
    }
}

/// Commit history per entity id from a JSON object of arrays
pub async fn load_commit_history(path: &Path) -> Result<HashMap<String, Vec<CommitRecord>>> {
    let bytes = tokio::fs::read(path).await?;
    serde_json::from_slice(&bytes).map_err(|e| EnrichError::Other(format!("Invalid commit history {}: {e}", path.display())))
}
