use crate::error::{EnrichError, Result};
use crate::types::EnrichedEntity;
use std::path::Path;

/// Write enriched entities as a pretty-printed JSON array, atomically
pub async fn write_enriched(path: &Path, entities: &[EnrichedEntity]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| EnrichError::persist(path, e))?;
    }
    let bytes = serde_json::to_vec_pretty(entities).map_err(|e| EnrichError::persist(path, e))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| EnrichError::persist(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| EnrichError::persist(path, e))?;
    log::info!("Saved {} enriched entities to {}", entities.len(), path.display());
    Ok(())
}

/// Rewrite the base snapshot after locations changed
pub async fn write_base(path: &Path, entities: &[entity_extractor::BaseEntity]) -> Result<()> {
    entity_indexer::write_base_snapshot(path, entities)
        .await
        .map_err(|e| EnrichError::persist(path, e))
}
