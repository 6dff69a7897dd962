use crate::error::Result;
use crate::manifest::{read_pnpm_patterns, PackageManifest, PACKAGE_MANIFEST, PNPM_WORKSPACE_FILE};
use crate::patterns::{
    exclusion_set, expand_pattern, is_skipped_dir_name, DEFAULT_MEMBER_PATTERNS,
};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Manifest names that never denote a source package
const NON_PACKAGE_NAMES: &[&str] = &["eslint-config", "prettier-config", "tsconfig"];

/// Conventional source directories inside a package
pub const SOURCE_DIRS: &[&str] = &["src", "lib", "app", "components", "pages", "views"];

const ENTRY_FILES: &[&str] = &[
    "index.js", "index.ts", "index.jsx", "index.tsx", "index.vue", "main.js", "main.ts",
    "app.js", "app.ts", "server.js", "server.ts",
];

const SOURCE_EXTENSIONS: &[&str] = &["js", "ts", "jsx", "tsx", "vue", "json"];

/// Top-level directories whose files belong to dependency packages
const WORKSPACE_TOP_DIRS: &[&str] = &["packages", "apps", "libs", "modules"];

/// Depth limit for the last-resort manifest search
const SEARCH_DEPTH: usize = 3;

static PNPM_STORE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"node_modules/\.pnpm/file\+packages\+([^/]+)/node_modules/(@[^/]+/[^/]+|[^/]+)/(.+)$")
        .expect("Invalid regex")
});

static NODE_MODULES_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"node_modules/(@[^/]+/[^/]+|[^/]+)/(.+)$")
        .expect("Invalid regex")
});

/// Monorepo layout: where the root is and which named packages live in it
#[derive(Debug)]
pub struct WorkspaceResolver {
    start: PathBuf,
    root: PathBuf,
    is_monorepo: bool,
    patterns: Vec<String>,
    packages: BTreeMap<String, PathBuf>,
    dependents: OnceCell<BTreeMap<String, BTreeSet<String>>>,
}

/// Linked packages resolved for one project directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceInfo {
    pub project_dir: PathBuf,
    pub root: PathBuf,
    pub packages: BTreeMap<String, PathBuf>,
}

impl WorkspaceResolver {
    /// Locate the workspace around `start` and enumerate its packages.
    ///
    /// A start directory with no workspace manifest above it is treated as a
    /// single-package workspace rooted at itself.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let start = std::fs::canonicalize(start.as_ref())?;

        let Some(root) = find_workspace_root(&start) else {
            log::debug!(
                "No workspace manifest above {}, using it as a single package",
                start.display()
            );
            let mut packages = BTreeMap::new();
            if let Some(name) = valid_package_name(&start) {
                packages.insert(name, start.clone());
            }
            return Ok(Self {
                root: start.clone(),
                start,
                is_monorepo: false,
                patterns: Vec::new(),
                packages,
                dependents: OnceCell::new(),
            });
        };

        let patterns = member_patterns(&root);
        let mut resolver = Self {
            start,
            root,
            is_monorepo: true,
            packages: BTreeMap::new(),
            patterns,
            dependents: OnceCell::new(),
        };
        resolver.packages = resolver.scan_member_packages();

        let info = resolver.workspace_info(&resolver.start.clone());
        for (name, path) in info.packages {
            resolver.packages.entry(name).or_insert(path);
        }

        log::info!(
            "Workspace {} has {} packages",
            resolver.root.display(),
            resolver.packages.len()
        );
        Ok(resolver)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn start(&self) -> &Path {
        &self.start
    }

    pub fn is_monorepo(&self) -> bool {
        self.is_monorepo
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// `packageName → absolute directory`
    pub fn packages(&self) -> &BTreeMap<String, PathBuf> {
        &self.packages
    }

    pub fn package_path(&self, name: &str) -> Option<&Path> {
        self.packages.get(name).map(PathBuf::as_path)
    }

    /// `absolute directory → packageName`
    pub fn package_names_by_path(&self) -> BTreeMap<PathBuf, String> {
        self.packages
            .iter()
            .map(|(name, path)| (path.clone(), name.clone()))
            .collect()
    }

    /// Name of the package owning `path` (deepest package directory wins)
    pub fn package_for_path(&self, path: &Path) -> Option<&str> {
        self.packages
            .iter()
            .filter(|(_, dir)| path.starts_with(dir))
            .max_by_key(|(_, dir)| dir.components().count())
            .map(|(name, _)| name.as_str())
    }

    /// Match an import specifier against package names (`name` or `name/sub`).
    /// Returns the package name and the remaining sub-path.
    pub fn match_specifier<'a>(&self, specifier: &'a str) -> Option<(&str, &'a str)> {
        self.packages
            .keys()
            .filter_map(|name| {
                if specifier == name {
                    Some((name.as_str(), ""))
                } else {
                    specifier
                        .strip_prefix(name.as_str())
                        .and_then(|rest| rest.strip_prefix('/'))
                        .map(|rest| (name.as_str(), rest))
                }
            })
            .max_by_key(|(name, _)| name.len())
    }

    fn scan_member_packages(&self) -> BTreeMap<String, PathBuf> {
        let excluded = exclusion_set(&self.patterns);
        let mut packages = BTreeMap::new();

        for pattern in &self.patterns {
            let dirs = match expand_pattern(&self.root, pattern) {
                Ok(dirs) => dirs,
                Err(e) => {
                    log::warn!("Skipping workspace pattern {pattern}: {e}");
                    continue;
                }
            };
            for dir in dirs {
                if dir == self.root {
                    continue;
                }
                let rel = relative_slash_path(&self.root, &dir);
                if excluded.is_match(&rel) || excluded.is_match(format!("{rel}/{PACKAGE_MANIFEST}")) {
                    log::debug!("Workspace member {rel} excluded by pattern");
                    continue;
                }
                match valid_package_name(&dir) {
                    Some(name) => {
                        packages.entry(name).or_insert(dir);
                    }
                    None => log::debug!("{rel} is not a workspace package"),
                }
            }
        }

        packages
    }

    /// Resolve the workspace dependencies declared by `project_dir`'s manifest.
    ///
    /// Each dependency is looked up through, in order: the member-pattern map,
    /// a `node_modules` symlink pointing outside any install directory, the pnpm
    /// store's `file+packages+…` folder, and a bounded manifest search.
    pub fn workspace_info(&self, project_dir: &Path) -> WorkspaceInfo {
        let mut info = WorkspaceInfo {
            project_dir: project_dir.to_path_buf(),
            root: self.root.clone(),
            packages: BTreeMap::new(),
        };

        let Some(manifest) = PackageManifest::read_opt(project_dir) else {
            return info;
        };

        for name in manifest.workspace_dependencies() {
            match self.resolve_dependency(&name, project_dir) {
                Some(path) => {
                    info.packages.insert(name, path);
                }
                None => log::debug!("Workspace dependency {name} could not be located"),
            }
        }

        info
    }

    fn resolve_dependency(&self, name: &str, project_dir: &Path) -> Option<PathBuf> {
        if let Some(path) = self.packages.get(name) {
            return Some(path.clone());
        }
        self.resolve_symlinked(name, project_dir)
            .or_else(|| self.resolve_pnpm_store(name))
            .or_else(|| self.search_manifest(name))
    }

    fn resolve_symlinked(&self, name: &str, project_dir: &Path) -> Option<PathBuf> {
        [project_dir, self.root.as_path()]
            .into_iter()
            .map(|dir| dir.join("node_modules").join(name))
            .filter(|link| link.exists())
            .filter_map(|link| std::fs::canonicalize(link).ok())
            .find(|target| !has_node_modules_component(target) && manifest_named(target, name))
    }

    fn resolve_pnpm_store(&self, name: &str) -> Option<PathBuf> {
        let store = self.root.join("node_modules").join(".pnpm");
        let entries = std::fs::read_dir(store).ok()?;
        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let folder = entry.file_name().to_str()?.strip_prefix("file+packages+")?.to_string();
                Some(folder.split('+').fold(self.root.join("packages"), |acc, part| acc.join(part)))
            })
            .find(|candidate| manifest_named(candidate, name))
    }

    fn search_manifest(&self, name: &str) -> Option<PathBuf> {
        WalkDir::new(&self.root)
            .max_depth(SEARCH_DEPTH)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || entry
                        .file_name()
                        .to_str()
                        .is_some_and(|n| !is_skipped_dir_name(n))
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.into_path())
            .find(|dir| manifest_named(dir, name))
    }

    /// Reverse dependency map: `package → packages that depend on it`.
    ///
    /// Every known package has an entry, possibly empty. Computed on first use.
    pub fn dependents(&self) -> &BTreeMap<String, BTreeSet<String>> {
        self.dependents.get_or_init(|| {
            let mut map: BTreeMap<String, BTreeSet<String>> = self
                .packages
                .keys()
                .map(|name| (name.clone(), BTreeSet::new()))
                .collect();
            for (name, dir) in &self.packages {
                let Some(manifest) = PackageManifest::read_opt(dir) else {
                    continue;
                };
                for dep in manifest.workspace_dependencies() {
                    map.entry(dep).or_default().insert(name.clone());
                }
            }
            map
        })
    }

    /// Packages affected by a change in `name`, transitively, excluding `name` itself
    pub fn affected_by(&self, name: &str) -> BTreeSet<String> {
        let dependents = self.dependents();
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([name.to_string()]);
        while let Some(current) = queue.pop_front() {
            for dependent in dependents.get(&current).into_iter().flatten() {
                if dependent != name && seen.insert(dependent.clone()) {
                    queue.push_back(dependent.clone());
                }
            }
        }
        seen
    }

    /// Map a path inside an install directory back to the workspace package
    /// it was linked from. Paths that are not linked copies come back unchanged.
    pub fn normalize_path(&self, path: &Path) -> PathBuf {
        let text = path.to_string_lossy().replace('\\', "/");

        if let Some(caps) = PNPM_STORE_PATH.captures(&text) {
            let folder = caps[1].replace('+', "/");
            let rest = &caps[3];
            let suffix = format!("/packages/{folder}");
            if let Some(dir) = self
                .packages
                .values()
                .find(|dir| dir.to_string_lossy().replace('\\', "/").ends_with(&suffix))
            {
                return dir.join(rest);
            }
            return self.root.join("packages").join(folder).join(rest);
        }

        if let Some(caps) = NODE_MODULES_PATH.captures(&text) {
            if let Some(dir) = self.packages.get(&caps[1]) {
                return dir.join(&caps[2]);
            }
        }

        path.to_path_buf()
    }
}

/// Walk upward from `start` to the nearest directory declaring workspace members
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        if dir.join(PNPM_WORKSPACE_FILE).is_file() {
            return Some(dir.to_path_buf());
        }
        PackageManifest::read_opt(dir)
            .filter(PackageManifest::declares_workspaces)
            .map(|_| dir.to_path_buf())
    })
}

/// Member patterns declared at `root`, or the conventional defaults
pub fn member_patterns(root: &Path) -> Vec<String> {
    let declared = read_pnpm_patterns(root)
        .filter(|patterns| !patterns.is_empty())
        .or_else(|| {
            PackageManifest::read_opt(root)
                .map(|manifest| manifest.workspace_patterns())
                .filter(|patterns| !patterns.is_empty())
        });

    declared.unwrap_or_else(|| {
        DEFAULT_MEMBER_PATTERNS
            .iter()
            .map(|pattern| pattern.to_string())
            .collect()
    })
}

/// Name of the package in `dir`, if `dir` is a real source package
pub fn valid_package_name(dir: &Path) -> Option<String> {
    let dir_name = dir.file_name().and_then(|name| name.to_str())?;
    if is_skipped_dir_name(dir_name) {
        return None;
    }

    let manifest = PackageManifest::read_opt(dir)?;
    let name = manifest.package_name()?;
    if NON_PACKAGE_NAMES.iter().any(|excluded| name.contains(excluded)) {
        return None;
    }
    if !has_source(dir) {
        return None;
    }
    Some(name.to_string())
}

fn has_source(dir: &Path) -> bool {
    if SOURCE_DIRS.iter().any(|sub| dir.join(sub).is_dir()) {
        return true;
    }
    if ENTRY_FILES.iter().any(|file| dir.join(file).is_file()) {
        return true;
    }

    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    entries.filter_map(|entry| entry.ok()).any(|entry| {
        let path = entry.path();
        path.is_file()
            && path.file_name().and_then(|n| n.to_str()) != Some(PACKAGE_MANIFEST)
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
    })
}

fn manifest_named(dir: &Path, name: &str) -> bool {
    PackageManifest::read_opt(dir).is_some_and(|manifest| manifest.package_name() == Some(name))
}

fn has_node_modules_component(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(part) if part == "node_modules"))
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Whether a root-relative file path belongs to a dependency package rather
/// than the project itself.
pub fn is_workspace_file(relative: &str) -> bool {
    let normalized = relative.replace('\\', "/");
    if normalized.starts_with("..") {
        return true;
    }
    normalized
        .split('/')
        .find(|part| !part.is_empty() && *part != ".")
        .is_some_and(|first| WORKSPACE_TOP_DIRS.contains(&first))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn workspace_file_detection() {
        assert!(is_workspace_file("packages/ui/src/Button.tsx"));
        assert!(is_workspace_file("../shared/index.ts"));
        assert!(is_workspace_file("./apps/web/main.ts"));
        assert!(!is_workspace_file("src/packages/x.ts"));
        assert!(!is_workspace_file("src/App.vue"));
    }

    #[test]
    fn node_modules_component_detection() {
        assert!(has_node_modules_component(Path::new("/repo/node_modules/x")));
        assert!(!has_node_modules_component(Path::new("/repo/packages/node_modules_like")));
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        assert_eq!(
            relative_slash_path(Path::new("/repo"), Path::new("/repo/packages/a")),
            "packages/a"
        );
    }
}
