use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics about one extraction pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Number of files read and parsed
    pub files: usize,

    /// Number of entities produced
    pub entities: usize,

    /// Entities whose ID got a collision suffix
    pub renamed_ids: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Files per source kind (`ts`, `tsx`, `vue`, ...)
    pub kinds: BTreeMap<String, usize>,

    /// Per-file failures, `path: message`
    pub errors: Vec<String>,
}

impl ExtractionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, kind: &str, entities: usize) {
        self.files += 1;
        self.entities += entities;
        *self.kinds.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }
}
