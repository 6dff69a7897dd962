use crate::discovery::{FileDiscovery, SourceFile};
use crate::error::Result;
use crate::ids::ensure_unique_ids;
use crate::stats::ExtractionStats;
use entity_extractor::{AnalysisContext, BaseEntity, EntityExtractor, SourceKind};
use entity_workspace::WorkspaceResolver;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Entities of one extraction pass with its statistics
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub entities: Vec<BaseEntity>,
    pub stats: ExtractionStats,
}

/// Extraction pass over a project: discovery, per-file extraction, unique IDs
pub struct EntityIndexer {
    workspace: Arc<WorkspaceResolver>,
    discovery: FileDiscovery,
    extractor: Arc<EntityExtractor>,
}

impl EntityIndexer {
    /// Indexer for the project at `project_dir` with a fresh analysis context
    pub fn new(project_dir: impl AsRef<Path>) -> Result<Self> {
        Self::with_context(project_dir, Arc::new(AnalysisContext::new()))
    }

    pub fn with_context(project_dir: impl AsRef<Path>, ctx: Arc<AnalysisContext>) -> Result<Self> {
        let workspace = Arc::new(WorkspaceResolver::discover(project_dir)?);
        log::info!(
            "Project {} in workspace {} ({} packages)",
            workspace.start().display(),
            workspace.root().display(),
            workspace.packages().len()
        );
        let extractor = Arc::new(EntityExtractor::new(workspace.start(), ctx));
        Ok(Self {
            discovery: FileDiscovery::for_workspace(workspace.clone()),
            workspace,
            extractor,
        })
    }

    /// Use `package` as the dependency-injection import that marks `isDDD`
    pub fn with_di_package(mut self, package: &str) -> Self {
        let ctx = self.context().clone();
        self.extractor = Arc::new(EntityExtractor::new(self.workspace.start(), ctx).with_di_package(package));
        self
    }

    pub fn project_dir(&self) -> &Path {
        self.workspace.start()
    }

    pub fn workspace(&self) -> &Arc<WorkspaceResolver> {
        &self.workspace
    }

    pub fn extractor(&self) -> &Arc<EntityExtractor> {
        &self.extractor
    }

    pub fn context(&self) -> &Arc<AnalysisContext> {
        self.extractor.context()
    }

    pub fn discovery(&self) -> &FileDiscovery {
        &self.discovery
    }

    /// Extract every discovered file
    pub async fn extract_all(&self) -> Extraction {
        let start = Instant::now();
        let files = self.discovery.discover().await;
        let extraction = self.extract_sources(&files, start);
        self.discovery.cache().clear();
        extraction
    }

    /// Extract only `files` (targeted re-scan after rewrites).
    ///
    /// Cached parse trees and extraction results for these files are dropped first.
    pub async fn extract_files(&self, files: &[PathBuf]) -> Extraction {
        let start = Instant::now();
        let sources = self.discovery.discover_targeted(files).await;
        for source in &sources {
            self.context().invalidate(&source.path);
        }
        self.extract_sources(&sources, start)
    }

    fn extract_sources(&self, files: &[SourceFile], start: Instant) -> Extraction {
        let mut stats = ExtractionStats::new();
        let mut entities = Vec::new();

        for file in files {
            let kind = SourceKind::from_path(&file.path).map(SourceKind::as_str).unwrap_or("unknown");
            match self.extractor.extract(&file.path, &file.content, file.mtime) {
                Ok(found) => {
                    stats.add_file(kind, found.len());
                    entities.extend(found.iter().cloned());
                }
                Err(e) => {
                    log::warn!("Failed to extract {}: {e}", file.path.display());
                    stats.add_error(format!("{}: {e}", file.path.display()));
                }
            }
        }

        stats.renamed_ids = ensure_unique_ids(&mut entities);
        stats.time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::info!(
            "Extracted {} entities from {} files in {} ms ({} failed, {} renamed)",
            stats.entities,
            stats.files,
            stats.time_ms,
            stats.errors.len(),
            stats.renamed_ids
        );
        Extraction { entities, stats }
    }
}
