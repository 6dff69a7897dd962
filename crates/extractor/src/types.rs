use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Component,
    Function,
    Class,
    Variable,
}

impl EntityKind {
    /// Prefix used in entity ids (`Component:Button`)
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Component => "Component",
            Self::Function => "Function",
            Self::Class => "Class",
            Self::Variable => "Variable",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Component => "component",
            Self::Function => "function",
            Self::Class => "class",
            Self::Variable => "variable",
        }
    }

    pub fn from_id_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "Component" => Some(Self::Component),
            "Function" => Some(Self::Function),
            "Class" => Some(Self::Class),
            "Variable" => Some(Self::Variable),
            _ => None,
        }
    }

    /// Build an id of the form `<Kind>:<Name>`
    pub fn entity_id(self, name: &str) -> String {
        format!("{}:{name}", self.id_prefix())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive 1-based line range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Loc {
    pub start: usize,
    pub end: usize,
}

impl Loc {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Line range of a tree-sitter node, shifted by `line_offset` lines
    pub fn of_node(node: tree_sitter::Node<'_>, line_offset: usize) -> Self {
        Self::new(
            node.start_position().row + 1 + line_offset,
            node.end_position().row + 1 + line_offset,
        )
    }
}

/// An exported declaration extracted from one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEntity {
    /// `<Kind>:<Name>`, unique within one extraction run
    pub id: String,

    #[serde(rename = "type")]
    pub kind: EntityKind,

    /// Path relative to the project root, `/`-separated
    pub file: String,

    pub loc: Loc,

    /// Declared identifier, or `default` / `setup` / `defineComponent`
    pub raw_name: String,

    #[serde(default, rename = "isDDD")]
    pub is_ddd: bool,

    #[serde(default)]
    pub is_workspace: bool,

    /// Hash of the declaration's normalized text
    #[serde(default)]
    pub code_md5: String,
}

impl BaseEntity {
    /// Name portion of the id (after the first `:`)
    pub fn id_name(&self) -> &str {
        self.id.split_once(':').map_or(self.id.as_str(), |(_, name)| name)
    }

    /// File base name without extension
    pub fn file_stem(&self) -> &str {
        file_stem(&self.file)
    }
}

/// Base name of a `/`-separated path without its extension
pub fn file_stem(path: &str) -> &str {
    let base = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn entity_serializes_with_snapshot_field_names() {
        let entity = BaseEntity {
            id: "Component:Button".into(),
            kind: EntityKind::Component,
            file: "src/Button.tsx".into(),
            loc: Loc::new(3, 9),
            raw_name: "Button".into(),
            is_ddd: false,
            is_workspace: true,
            code_md5: "abc".into(),
        };
        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "Component:Button",
                "type": "component",
                "file": "src/Button.tsx",
                "loc": {"start": 3, "end": 9},
                "rawName": "Button",
                "isDDD": false,
                "isWorkspace": true,
                "codeMd5": "abc"
            })
        );
    }

    #[test]
    fn stems_and_prefixes() {
        assert_eq!(file_stem("src/components/Button.tsx"), "Button");
        assert_eq!(file_stem("index.d.ts"), "index.d");
        assert_eq!(file_stem(".eslintrc"), ".eslintrc");
        assert_eq!(EntityKind::from_id_prefix("Class"), Some(EntityKind::Class));
        assert_eq!(EntityKind::Variable.entity_id("BAR"), "Variable:BAR");
    }
}
