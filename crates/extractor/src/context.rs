//! Shared parse and extraction caches.
//!
//! One `AnalysisContext` is created per run and handed by reference to the
//! extractors and the reference resolver. It owns three caches:
//!
//! - parse trees keyed by absolute path, checked against mtime and content
//! - extraction results keyed by `(extractor, path)`, checked against content
//! - exported-name sets keyed by resolved module path
//!
//! Invalidating a file drops its entry from all three.

use crate::error::{ExtractorError, Result};
use crate::language::SourceKind;
use crate::types::BaseEntity;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tree_sitter::{Parser, Tree};

/// Estimated footprint of one cached parse tree
pub const TREE_COST_BYTES: usize = 50 * 1024;
/// Estimated footprint of one cached entity
pub const ENTITY_COST_BYTES: usize = 1024;
/// Default memory budget before extraction results are evicted
pub const DEFAULT_BUDGET_BYTES: usize = 100 * 1024 * 1024;

/// Which extractor produced a cached result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    /// `.ts` / `.js`
    Script,
    /// `.tsx` / `.jsx`
    Markup,
    /// `.vue`
    SingleFile,
}

impl ExtractorKind {
    pub fn for_source(kind: SourceKind) -> Self {
        match kind {
            SourceKind::TypeScript | SourceKind::JavaScript => Self::Script,
            SourceKind::Tsx | SourceKind::Jsx => Self::Markup,
            SourceKind::Vue => Self::SingleFile,
        }
    }
}

/// Content fingerprint used to validate cache entries
pub fn fingerprint(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

struct TreeEntry {
    tree: Tree,
    kind: SourceKind,
    fingerprint: u64,
    mtime: Option<SystemTime>,
}

struct ExtractionEntry {
    entities: Arc<Vec<BaseEntity>>,
    fingerprint: u64,
    sequence: u64,
}

#[derive(Default)]
struct CacheState {
    trees: HashMap<PathBuf, TreeEntry>,
    extractions: HashMap<(ExtractorKind, PathBuf), ExtractionEntry>,
    exports: HashMap<PathBuf, Arc<BTreeSet<String>>>,
    sequence: u64,
    counters: CacheCounters,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
struct CacheCounters {
    tree_hits: u64,
    tree_misses: u64,
    extraction_hits: u64,
    extraction_misses: u64,
    evictions: u64,
}

/// Point-in-time view of cache occupancy and hit rates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub trees: usize,
    pub extractions: usize,
    pub export_sets: usize,
    pub cached_entities: usize,
    pub estimated_bytes: usize,
    pub tree_hits: u64,
    pub tree_misses: u64,
    pub extraction_hits: u64,
    pub extraction_misses: u64,
    pub evictions: u64,
}

impl CacheState {
    fn cached_entities(&self) -> usize {
        self.extractions.values().map(|e| e.entities.len()).sum()
    }

    fn estimated_bytes(&self) -> usize {
        self.trees.len() * TREE_COST_BYTES + self.cached_entities() * ENTITY_COST_BYTES
    }

    fn drop_file(&mut self, path: &Path) {
        self.trees.remove(path);
        self.extractions.retain(|(_, p), _| p != path);
        self.exports.remove(path);
    }
}

/// Caches shared by extraction and reference resolution for one run
pub struct AnalysisContext {
    state: Mutex<CacheState>,
    budget_bytes: usize,
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AnalysisContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisContext")
            .field("stats", &self.stats())
            .finish()
    }
}

impl AnalysisContext {
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_BUDGET_BYTES)
    }

    pub fn with_budget(budget_bytes: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            budget_bytes,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().expect("analysis cache mutex poisoned")
    }

    /// Parse `source` for `path`, reusing the cached tree when the file's mtime
    /// or content is unchanged. A stale tree evicts every cache entry of the file.
    pub fn parse(
        &self,
        path: &Path,
        source: &str,
        kind: SourceKind,
        mtime: Option<SystemTime>,
    ) -> Result<Tree> {
        let print = fingerprint(source);
        {
            let mut state = self.lock();
            let fresh = state.trees.get(path).and_then(|entry| {
                let same_mtime = mtime.is_some() && entry.mtime == mtime;
                let same_content = entry.fingerprint == print;
                (entry.kind == kind && (same_mtime || same_content)).then(|| entry.tree.clone())
            });
            if let Some(tree) = fresh {
                state.counters.tree_hits += 1;
                return Ok(tree);
            }
            state.counters.tree_misses += 1;
            if state.trees.contains_key(path) {
                log::debug!("Parse tree for {} is stale", path.display());
                state.drop_file(path);
            }
        }

        let tree = parse_source(source, kind)?;
        self.lock().trees.insert(
            path.to_path_buf(),
            TreeEntry {
                tree: tree.clone(),
                kind,
                fingerprint: print,
                mtime,
            },
        );
        Ok(tree)
    }

    /// Cached extraction result, if one exists for the same content
    pub fn extraction(&self, kind: ExtractorKind, path: &Path, source: &str) -> Option<Arc<Vec<BaseEntity>>> {
        let print = fingerprint(source);
        let mut state = self.lock();
        let key = (kind, path.to_path_buf());
        let hit = state
            .extractions
            .get(&key)
            .filter(|entry| entry.fingerprint == print)
            .map(|entry| Arc::clone(&entry.entities));
        if hit.is_some() {
            state.counters.extraction_hits += 1;
        } else {
            state.counters.extraction_misses += 1;
            state.extractions.remove(&key);
        }
        hit
    }

    pub fn store_extraction(
        &self,
        kind: ExtractorKind,
        path: &Path,
        source: &str,
        entities: Vec<BaseEntity>,
    ) -> Arc<Vec<BaseEntity>> {
        let entities = Arc::new(entities);
        let mut state = self.lock();
        state.sequence += 1;
        let sequence = state.sequence;
        state.extractions.insert(
            (kind, path.to_path_buf()),
            ExtractionEntry {
                entities: Arc::clone(&entities),
                fingerprint: fingerprint(source),
                sequence,
            },
        );
        if state.estimated_bytes() > self.budget_bytes {
            Self::evict_oldest_half(&mut state);
        }
        entities
    }

    fn evict_oldest_half(state: &mut CacheState) {
        let mut order: Vec<_> = state
            .extractions
            .iter()
            .map(|(key, entry)| (entry.sequence, key.clone()))
            .collect();
        order.sort_by_key(|(sequence, _)| *sequence);
        let evict = order.len() / 2;
        for (_, key) in order.into_iter().take(evict) {
            state.extractions.remove(&key);
        }
        state.counters.evictions += evict as u64;
        log::debug!("Evicted {evict} cached extraction results");
    }

    pub fn export_names(&self, path: &Path) -> Option<Arc<BTreeSet<String>>> {
        self.lock().exports.get(path).cloned()
    }

    pub fn store_export_names(&self, path: &Path, names: BTreeSet<String>) -> Arc<BTreeSet<String>> {
        let names = Arc::new(names);
        self.lock()
            .exports
            .insert(path.to_path_buf(), Arc::clone(&names));
        names
    }

    /// Drop every cached entry of one file
    pub fn invalidate(&self, path: &Path) {
        self.lock().drop_file(path);
    }

    /// Drop all results produced by one extractor
    pub fn clear_extractor(&self, kind: ExtractorKind) {
        self.lock().extractions.retain(|(k, _), _| *k != kind);
    }

    /// Drop everything
    pub fn reset(&self) {
        let mut state = self.lock();
        state.trees.clear();
        state.extractions.clear();
        state.exports.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            trees: state.trees.len(),
            extractions: state.extractions.len(),
            export_sets: state.exports.len(),
            cached_entities: state.cached_entities(),
            estimated_bytes: state.estimated_bytes(),
            tree_hits: state.counters.tree_hits,
            tree_misses: state.counters.tree_misses,
            extraction_hits: state.counters.extraction_hits,
            extraction_misses: state.counters.extraction_misses,
            evictions: state.counters.evictions,
        }
    }
}

/// Parse without caching
pub fn parse_source(source: &str, kind: SourceKind) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&kind.tree_sitter_language()?)
        .map_err(|e| ExtractorError::tree_sitter(format!("Failed to set language: {e}")))?;
    parser
        .parse(source, None)
        .ok_or_else(|| ExtractorError::parse("Failed to parse source code"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityKind, Loc};
    use pretty_assertions::assert_eq;

    fn entity(name: &str) -> BaseEntity {
        BaseEntity {
            id: EntityKind::Function.entity_id(name),
            kind: EntityKind::Function,
            file: format!("src/{name}.ts"),
            loc: Loc::new(1, 1),
            raw_name: name.to_string(),
            is_ddd: false,
            is_workspace: false,
            code_md5: String::new(),
        }
    }

    #[test]
    fn tree_reused_until_content_changes() {
        let ctx = AnalysisContext::new();
        let path = Path::new("/p/a.ts");
        ctx.parse(path, "export const a = 1;", SourceKind::TypeScript, None).unwrap();
        ctx.store_extraction(ExtractorKind::Script, path, "export const a = 1;", vec![entity("a")]);

        ctx.parse(path, "export const a = 1;", SourceKind::TypeScript, None).unwrap();
        assert_eq!(ctx.stats().tree_hits, 1);
        assert!(ctx.extraction(ExtractorKind::Script, path, "export const a = 1;").is_some());

        ctx.parse(path, "export const a = 2;", SourceKind::TypeScript, None).unwrap();
        let stats = ctx.stats();
        assert_eq!(stats.tree_misses, 2);
        assert_eq!(stats.extractions, 0);
    }

    #[test]
    fn invalidate_clears_every_sub_cache() {
        let ctx = AnalysisContext::new();
        let path = Path::new("/p/b.ts");
        ctx.parse(path, "export {}", SourceKind::TypeScript, None).unwrap();
        ctx.store_extraction(ExtractorKind::Script, path, "export {}", vec![entity("b")]);
        ctx.store_export_names(path, BTreeSet::from(["b".to_string()]));

        ctx.invalidate(path);
        let stats = ctx.stats();
        assert_eq!((stats.trees, stats.extractions, stats.export_sets), (0, 0, 0));
    }

    #[test]
    fn clear_extractor_is_selective() {
        let ctx = AnalysisContext::new();
        ctx.store_extraction(ExtractorKind::Script, Path::new("/a.ts"), "", vec![entity("a")]);
        ctx.store_extraction(ExtractorKind::Markup, Path::new("/b.tsx"), "", vec![entity("b")]);
        ctx.clear_extractor(ExtractorKind::Script);
        assert!(ctx.extraction(ExtractorKind::Markup, Path::new("/b.tsx"), "").is_some());
        assert!(ctx.extraction(ExtractorKind::Script, Path::new("/a.ts"), "").is_none());
    }

    #[test]
    fn over_budget_evicts_oldest_half() {
        let ctx = AnalysisContext::with_budget(3 * ENTITY_COST_BYTES);
        for name in ["a", "b", "c", "d"] {
            let path = PathBuf::from(format!("/{name}.ts"));
            ctx.store_extraction(ExtractorKind::Script, &path, name, vec![entity(name)]);
        }
        let stats = ctx.stats();
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.extractions, 2);
        assert!(ctx.extraction(ExtractorKind::Script, Path::new("/d.ts"), "d").is_some());
        assert!(ctx.extraction(ExtractorKind::Script, Path::new("/a.ts"), "a").is_none());
    }
}
