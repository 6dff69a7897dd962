use crate::context::{AnalysisContext, ExtractorKind};
use crate::error::Result;
use crate::language::SourceKind;
use crate::paths::relative_path;
use crate::script::ScriptWalk;
use crate::types::{file_stem, BaseEntity};
use crate::vue::extract_single_file;
use entity_workspace::is_workspace_file;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Dependency-injection package whose import marks an entity `isDDD`
pub const DEFAULT_DI_PACKAGE: &str = "@xhs/di";

/// Per-file entity extraction for one project root
pub struct EntityExtractor {
    root: PathBuf,
    ctx: Arc<AnalysisContext>,
    di_import: Regex,
}

impl EntityExtractor {
    pub fn new(root: impl Into<PathBuf>, ctx: Arc<AnalysisContext>) -> Self {
        Self {
            root: root.into(),
            ctx,
            di_import: di_import_pattern(DEFAULT_DI_PACKAGE),
        }
    }

    pub fn with_di_package(mut self, package: &str) -> Self {
        self.di_import = di_import_pattern(package);
        self
    }

    pub fn context(&self) -> &Arc<AnalysisContext> {
        &self.ctx
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a source imports the dependency-injection package
    pub fn is_ddd_source(&self, source: &str) -> bool {
        self.di_import.is_match(source)
    }

    /// Read and extract one file
    pub fn extract_file(&self, path: &Path) -> Result<Arc<Vec<BaseEntity>>> {
        let source = std::fs::read_to_string(path)?;
        let mtime = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        self.extract(path, &source, mtime)
    }

    /// Entities exported by one file, in source order.
    ///
    /// Results are cached per content; a second call with the same source
    /// returns the cached list without reparsing.
    pub fn extract(
        &self,
        path: &Path,
        source: &str,
        mtime: Option<SystemTime>,
    ) -> Result<Arc<Vec<BaseEntity>>> {
        let kind = SourceKind::require(path)?;
        let extractor = ExtractorKind::for_source(kind);
        if let Some(cached) = self.ctx.extraction(extractor, path, source) {
            return Ok(cached);
        }

        let file = relative_path(&self.root, path);
        let stem = file_stem(&file).to_string();

        let mut entities = match kind {
            SourceKind::Vue => extract_single_file(&self.ctx, path, source, &file, &stem)?,
            _ => {
                let tree = self.ctx.parse(path, source, kind, mtime)?;
                if tree.root_node().has_error() {
                    log::debug!("{file}: syntax errors, extracting what parsed");
                }
                ScriptWalk {
                    source,
                    file: &file,
                    stem: &stem,
                    markup_context: kind.is_markup_context(),
                    line_offset: 0,
                    single_file: false,
                }
                .extract(tree.root_node())
            }
        };

        let is_ddd = self.is_ddd_source(source);
        let is_workspace = is_workspace_file(&file);
        for entity in &mut entities {
            entity.is_ddd = is_ddd;
            entity.is_workspace = is_workspace;
        }

        log::trace!("{file}: {} entities", entities.len());
        Ok(self.ctx.store_extraction(extractor, path, source, entities))
    }
}

fn di_import_pattern(package: &str) -> Regex {
    let pattern = format!(
        r#"(?m)^\s*import\b[^;]*?from\s+['"]{pkg}(?:/[^'"]*)?['"]|require\(\s*['"]{pkg}(?:/[^'"]*)?['"]\s*\)"#,
        pkg = regex::escape(package)
    );
    Regex::new(&pattern).unwrap_or_else(|_| never_matching())
}

fn never_matching() -> Regex {
    Regex::new(r"[^\s\S]").expect("Invalid regex")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_ddd_and_workspace_files() {
        let extractor = EntityExtractor::new("/repo/apps/web", Arc::new(AnalysisContext::new()));
        let source = "import { Inject } from '@xhs/di';\nexport class UserService {}\n";
        let entities = extractor
            .extract(Path::new("/repo/apps/web/src/user.service.ts"), source, None)
            .unwrap();
        assert_eq!(entities[0].kind, EntityKind::Class);
        assert!(entities[0].is_ddd);
        assert!(!entities[0].is_workspace);

        let entities = extractor
            .extract(Path::new("/repo/packages/ui/src/format.ts"), "export const fmt = (v) => v;\n", None)
            .unwrap();
        assert_eq!(entities[0].file, "../../packages/ui/src/format.ts");
        assert!(entities[0].is_workspace);
        assert!(!entities[0].is_ddd);
    }

    #[test]
    fn custom_di_package() {
        let extractor = EntityExtractor::new("/p", Arc::new(AnalysisContext::new()))
            .with_di_package("inversify");
        assert!(extractor.is_ddd_source("import { injectable } from 'inversify'\n"));
        assert!(!extractor.is_ddd_source("import { Inject } from '@xhs/di'\n"));
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let extractor = EntityExtractor::new("/p", Arc::new(AnalysisContext::new()));
        assert!(extractor.extract(Path::new("/p/readme.md"), "# hi", None).is_err());
    }
}
