use crate::content_cache::ContentCache;
use entity_extractor::SOURCE_EXTENSIONS;
use entity_workspace::{is_skipped_dir_name, WorkspaceResolver};
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Concurrent file reads within one batch
pub const MAX_PARALLEL_FILES: usize = 8;
/// Concurrent directory walks
pub const MAX_PARALLEL_DIRS: usize = 4;
/// Files handed to the extractor per batch
pub const BATCH_SIZE: usize = 50;

/// Conventional source directories of the project itself
const PROJECT_SOURCE_DIRS: &[&str] = &["src", "lib", "app", "components", "pages", "views", "utils"];

/// One readable source file
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: Arc<str>,
    pub mtime: Option<SystemTime>,
}

/// Where a scan looks for files
#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanRoot {
    /// Recursive walk
    Tree(PathBuf),
    /// Direct children only
    Flat(PathBuf),
}

/// Finds parseable files across the project and its linked workspace packages
pub struct FileDiscovery {
    project_dir: PathBuf,
    roots: Vec<ScanRoot>,
    workspace: Option<Arc<WorkspaceResolver>>,
    cache: Arc<ContentCache>,
}

impl FileDiscovery {
    /// Discovery over a plain directory, walked recursively
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        Self {
            roots: vec![ScanRoot::Tree(project_dir.clone())],
            project_dir,
            workspace: None,
            cache: Arc::new(ContentCache::new()),
        }
    }

    /// Discovery over the workspace packages the project links to, plus the
    /// project's root files and conventional source directories.
    ///
    /// Without linked packages the project directory is walked whole.
    pub fn for_workspace(workspace: Arc<WorkspaceResolver>) -> Self {
        let project_dir = workspace.start().to_path_buf();
        let info = workspace.workspace_info(&project_dir);

        let roots = if info.packages.is_empty() {
            vec![ScanRoot::Tree(project_dir.clone())]
        } else {
            log::info!(
                "Scanning {} linked workspace packages and {}",
                info.packages.len(),
                project_dir.display()
            );
            let mut roots: Vec<ScanRoot> = info
                .packages
                .values()
                .map(|dir| ScanRoot::Tree(dir.clone()))
                .collect();
            roots.push(ScanRoot::Flat(project_dir.clone()));
            roots.extend(
                PROJECT_SOURCE_DIRS
                    .iter()
                    .map(|dir| project_dir.join(dir))
                    .filter(|dir| dir.is_dir())
                    .map(ScanRoot::Tree),
            );
            roots
        };

        Self {
            project_dir,
            roots,
            workspace: Some(workspace),
            cache: Arc::new(ContentCache::new()),
        }
    }

    pub fn with_cache(mut self, cache: Arc<ContentCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Paths of every parseable file under the scan roots, deduplicated and sorted
    pub async fn scan(&self) -> Vec<PathBuf> {
        let mut found = BTreeSet::new();

        for group in self.roots.chunks(MAX_PARALLEL_DIRS) {
            let mut tasks = Vec::with_capacity(group.len());
            for root in group {
                let root = root.clone();
                tasks.push(tokio::task::spawn_blocking(move || walk_root(&root)));
            }
            for task in tasks {
                match task.await {
                    Ok(paths) => found.extend(paths.into_iter().map(|p| absolute(&p))),
                    Err(e) => log::warn!("Task panicked: {e}"),
                }
            }
        }

        log::info!("Found {} source files", found.len());
        found.into_iter().collect()
    }

    /// Full discovery: scan, then read every file through the content cache
    pub async fn discover(&self) -> Vec<SourceFile> {
        let paths = self.scan().await;
        self.read_all(&paths).await
    }

    /// Re-read only `files`, bypassing cached content.
    ///
    /// Paths inside `node_modules` that point at a workspace package are mapped
    /// back to the package directory; unsupported and duplicate paths are dropped.
    pub async fn discover_targeted(&self, files: &[PathBuf]) -> Vec<SourceFile> {
        let mut targets = BTreeSet::new();
        for file in files {
            let path = if file.is_absolute() {
                file.clone()
            } else {
                self.project_dir.join(file)
            };
            let path = match &self.workspace {
                Some(workspace) => workspace.normalize_path(&path),
                None => path,
            };
            if !is_source_file(&path) {
                log::debug!("Skipping unsupported file {}", path.display());
                continue;
            }
            self.cache.invalidate(&path);
            targets.insert(absolute(&path));
        }

        let targets: Vec<PathBuf> = targets.into_iter().collect();
        log::debug!("Targeted discovery over {} files", targets.len());
        self.read_all(&targets).await
    }

    /// Read files in batches of bounded parallel reads.
    /// Unreadable files are logged and skipped; output follows input order.
    pub async fn read_all(&self, paths: &[PathBuf]) -> Vec<SourceFile> {
        let mut files = Vec::with_capacity(paths.len());

        for batch in paths.chunks(BATCH_SIZE) {
            for group in batch.chunks(MAX_PARALLEL_FILES) {
                let mut tasks = Vec::with_capacity(group.len());
                for path in group {
                    let path = path.clone();
                    let cache = self.cache.clone();
                    tasks.push(tokio::spawn(async move {
                        let read = cache.read(&path).await;
                        (path, read)
                    }));
                }

                for task in tasks {
                    match task.await {
                        Ok((path, Ok((content, mtime)))) => files.push(SourceFile { path, content, mtime }),
                        Ok((path, Err(e))) => log::warn!("Failed to read {}: {e}", path.display()),
                        Err(e) => log::warn!("Task panicked: {e}"),
                    }
                }
            }
        }

        files
    }
}

fn walk_root(root: &ScanRoot) -> Vec<PathBuf> {
    let (dir, max_depth) = match root {
        ScanRoot::Tree(dir) => (dir, None),
        ScanRoot::Flat(dir) => (dir, Some(1)),
    };
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut builder = WalkBuilder::new(dir);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .max_depth(max_depth);
    builder.filter_entry(|entry| {
        let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
        entry.depth() == 0
            || !is_dir
            || entry
                .file_name()
                .to_str()
                .is_some_and(|name| !is_skipped_dir_name(name))
    });

    let mut files = Vec::new();
    for result in builder.build() {
        match result {
            Ok(entry) => {
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                if is_source_file(entry.path()) {
                    files.push(entry.into_path());
                }
            }
            Err(e) => log::warn!("Failed to read entry: {e}"),
        }
    }
    files
}

/// Script, markup-module and single-file component sources; declaration files excluded
pub fn is_source_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.ends_with(".d.ts") {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
