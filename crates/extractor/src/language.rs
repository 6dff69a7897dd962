use crate::error::{ExtractorError, Result};
use std::path::Path;

/// Source file kinds the extractors understand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    TypeScript,
    Tsx,
    JavaScript,
    Jsx,
    /// Single-file component: markup, script and style blocks
    Vue,
}

impl SourceKind {
    /// Detect kind from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "js" | "mjs" | "cjs" => Some(Self::JavaScript),
            "jsx" => Some(Self::Jsx),
            "vue" => Some(Self::Vue),
            _ => None,
        }
    }

    /// Detect kind from file path
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::JavaScript => "javascript",
            Self::Jsx => "jsx",
            Self::Vue => "vue",
        }
    }

    /// Whether inline markup (JSX) is expected in this kind
    pub fn is_markup_context(self) -> bool {
        matches!(self, Self::Tsx | Self::Jsx)
    }

    /// Tree-sitter grammar used for the script portion of this kind
    pub fn tree_sitter_language(self) -> Result<tree_sitter::Language> {
        match self {
            Self::TypeScript | Self::Vue => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Self::Tsx => Ok(tree_sitter_typescript::LANGUAGE_TSX.into()),
            Self::JavaScript | Self::Jsx => Ok(tree_sitter_javascript::LANGUAGE.into()),
        }
    }

    /// Script kind for a `<script lang="…">` block
    pub fn for_script_lang(lang: Option<&str>) -> Self {
        match lang.map(str::to_lowercase).as_deref() {
            Some("tsx") => Self::Tsx,
            Some("jsx") => Self::Jsx,
            Some("js") | Some("javascript") => Self::JavaScript,
            _ => Self::TypeScript,
        }
    }

    pub fn require(path: &Path) -> Result<Self> {
        Self::from_path(path).ok_or_else(|| ExtractorError::unsupported(path.display().to_string()))
    }
}

/// Extensions picked up by discovery, in resolution preference order
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "vue", "js", "jsx"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(SourceKind::from_extension("ts"), Some(SourceKind::TypeScript));
        assert_eq!(SourceKind::from_extension("TSX"), Some(SourceKind::Tsx));
        assert_eq!(SourceKind::from_extension("mjs"), Some(SourceKind::JavaScript));
        assert_eq!(SourceKind::from_extension("vue"), Some(SourceKind::Vue));
        assert_eq!(SourceKind::from_extension("rs"), None);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(SourceKind::from_path("src/App.vue"), Some(SourceKind::Vue));
        assert_eq!(SourceKind::from_path("a/b/Button.jsx"), Some(SourceKind::Jsx));
        assert_eq!(SourceKind::from_path("README"), None);
    }

    #[test]
    fn test_markup_context() {
        assert!(SourceKind::Tsx.is_markup_context());
        assert!(SourceKind::Jsx.is_markup_context());
        assert!(!SourceKind::TypeScript.is_markup_context());
        assert!(!SourceKind::Vue.is_markup_context());
    }

    #[test]
    fn test_tree_sitter_language() {
        for kind in [
            SourceKind::TypeScript,
            SourceKind::Tsx,
            SourceKind::JavaScript,
            SourceKind::Jsx,
            SourceKind::Vue,
        ] {
            assert!(kind.tree_sitter_language().is_ok());
        }
    }

    #[test]
    fn test_script_lang() {
        assert_eq!(SourceKind::for_script_lang(None), SourceKind::TypeScript);
        assert_eq!(SourceKind::for_script_lang(Some("tsx")), SourceKind::Tsx);
        assert_eq!(SourceKind::for_script_lang(Some("js")), SourceKind::JavaScript);
    }
}
