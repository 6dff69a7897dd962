//! Module specifier classification and file resolution.

use crate::aliases::AliasTable;
use entity_workspace::{PackageManifest, WorkspaceResolver};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Probe order for relative and absolute specifiers
pub const RELATIVE_EXTENSIONS: &[&str] = &["ts", "tsx", "vue", "js", "jsx"];

/// Probe order for aliased specifiers
pub const ALIAS_EXTENSIONS: &[&str] = &["vue", "ts", "tsx", "js", "jsx"];

/// Entry files probed when a directory is imported
const ENTRY_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx"];

/// How a specifier was mapped onto the filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleOrigin {
    Relative,
    Alias,
    Workspace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    pub path: PathBuf,
    pub origin: ModuleOrigin,
}

/// Maps import specifiers to files inside the project or its workspace
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    workspace: Arc<WorkspaceResolver>,
    aliases: AliasTable,
}

impl ModuleResolver {
    pub fn new(workspace: Arc<WorkspaceResolver>, aliases: AliasTable) -> Self {
        Self { workspace, aliases }
    }

    /// Resolver with aliases loaded from the workspace's project directory
    pub fn for_workspace(workspace: Arc<WorkspaceResolver>) -> Self {
        let aliases = AliasTable::load(workspace.start());
        Self::new(workspace, aliases)
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn workspace(&self) -> &Arc<WorkspaceResolver> {
        &self.workspace
    }

    /// Specifiers that never map to project entities
    pub fn is_third_party(&self, specifier: &str) -> bool {
        !(specifier.starts_with('.') || specifier.starts_with('/'))
            && !self.aliases.is_alias(specifier)
            && self.workspace.match_specifier(specifier).is_none()
    }

    /// File a specifier imported from `importer` refers to.
    ///
    /// Unresolvable and third-party specifiers give `None`.
    pub fn resolve(&self, specifier: &str, importer: &Path) -> Option<ResolvedModule> {
        if specifier.starts_with('.') || specifier.starts_with('/') {
            let base = if specifier.starts_with('/') {
                PathBuf::from(specifier)
            } else {
                importer.parent().unwrap_or(Path::new("")).join(specifier)
            };
            return self.finish(resolve_file(&base, RELATIVE_EXTENSIONS)?, ModuleOrigin::Relative);
        }

        if let Some(base) = self.aliases.resolve(specifier) {
            return self.finish(resolve_file(&base, ALIAS_EXTENSIONS)?, ModuleOrigin::Alias);
        }

        let (name, rest) = self.workspace.match_specifier(specifier)?;
        let package_root = self.workspace.package_path(name)?;
        let path = if rest.is_empty() {
            entry_file(package_root)?
        } else {
            resolve_file(&package_root.join(rest), RELATIVE_EXTENSIONS)
                .or_else(|| resolve_file(&package_root.join("src").join(rest), RELATIVE_EXTENSIONS))?
        };
        self.finish(path, ModuleOrigin::Workspace)
    }

    fn finish(&self, path: PathBuf, origin: ModuleOrigin) -> Option<ResolvedModule> {
        Some(ResolvedModule {
            path: self.workspace.normalize_path(&path),
            origin,
        })
    }
}

/// Existing file for `base`: as given, with an extension, or a directory entry
pub fn resolve_file(base: &Path, extensions: &[&str]) -> Option<PathBuf> {
    let base = clean_path(base);
    if base.is_file() {
        return Some(base);
    }
    if let Some(found) = extensions
        .iter()
        .map(|ext| with_appended_extension(&base, ext))
        .find(|candidate| candidate.is_file())
    {
        return Some(found);
    }
    if base.is_dir() {
        if let Some(index) = extensions
            .iter()
            .map(|ext| base.join(format!("index.{ext}")))
            .find(|candidate| candidate.is_file())
        {
            return Some(index);
        }
        return manifest_main(&base);
    }
    None
}

/// Entry file of a directory import: manifest `main`, `index.*`, then `src/index.*`
pub fn entry_file(dir: &Path) -> Option<PathBuf> {
    manifest_main(dir)
        .or_else(|| index_file(dir))
        .or_else(|| index_file(&dir.join("src")))
}

fn index_file(dir: &Path) -> Option<PathBuf> {
    ENTRY_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("index.{ext}")))
        .find(|candidate| candidate.is_file())
}

fn manifest_main(dir: &Path) -> Option<PathBuf> {
    let main = PackageManifest::read_opt(dir)?.main?;
    let base = clean_path(&dir.join(main));
    if base.is_file() {
        return Some(base);
    }
    RELATIVE_EXTENSIONS
        .iter()
        .map(|ext| with_appended_extension(&base, ext))
        .find(|candidate| candidate.is_file())
        .or_else(|| index_file(&base))
}

/// `foo.service` + `ts` gives `foo.service.ts`
fn with_appended_extension(base: &Path, ext: &str) -> PathBuf {
    let mut os = base.as_os_str().to_owned();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

/// Lexically remove `.` and `..` components
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
