//! Doc-comment lookup and normalization.
//!
//! An annotation has two forms: the raw comment text exactly as written
//! (markers kept, used for hashing and in-place rewrites) and a normalized
//! body with markers and leading `*` stripped (used for labeling and for
//! matching an old annotation against the file).

use crate::syntax::{node_text, top_level_statement, variable_declarators, DeclarationNode, NodeKind};
use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

static BLOCK_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/\*+").expect("Invalid regex"));
static BLOCK_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*+/$").expect("Invalid regex"));
static STAR_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\*\s?").expect("Invalid regex"));
static LINE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*//\s?").expect("Invalid regex"));
static HTML_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*<!--(.*?)-->").expect("Invalid regex"));

/// Block comments (`/* … */`) with their byte ranges
pub static BLOCK_COMMENT_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\*(?:[^*]|\*+[^*/])*\*+/").expect("Invalid regex"));

/// Comment text with markers removed, lines trimmed and joined with `\n`
pub fn normalize_comment(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("/*") {
        let body = BLOCK_OPEN.replace(raw, "");
        let body = BLOCK_CLOSE.replace(&body, "");
        let lines: Vec<String> = body
            .lines()
            .map(|line| STAR_PREFIX.replace(line, "").trim().to_string())
            .collect();
        return lines.join("\n").trim().to_string();
    }
    if raw.starts_with("//") {
        let lines: Vec<String> = raw
            .lines()
            .map(|line| LINE_PREFIX.replace(line, "").trim().to_string())
            .collect();
        return lines.join("\n").trim().to_string();
    }
    if let Some(caps) = HTML_COMMENT.captures(raw) {
        return caps[1].trim().to_string();
    }
    raw.to_string()
}

/// Normalize several raw comments as one annotation
pub fn normalize_comments<S: AsRef<str>>(raw: &[S]) -> String {
    raw.iter()
        .map(|c| normalize_comment(c.as_ref()))
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Comments directly above a top-level statement, in source order
pub fn leading_comments<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let statement = top_level_statement(node);
    let mut comments = Vec::new();
    let mut current = statement.prev_named_sibling();
    let mut expected_row = statement.start_position().row;
    while let Some(sibling) = current {
        if NodeKind::of(sibling) != NodeKind::Comment {
            break;
        }
        // a blank line detaches the comment from the declaration
        if sibling.end_position().row + 1 < expected_row {
            break;
        }
        comments.push(sibling);
        expected_row = sibling.start_position().row;
        current = sibling.prev_named_sibling();
    }
    comments.reverse();
    comments
}

/// Comments starting on the last line of the statement
pub fn trailing_comments<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let statement = top_level_statement(node);
    let end_row = statement.end_position().row;
    let mut comments = Vec::new();
    let mut current = statement.next_named_sibling();
    while let Some(sibling) = current {
        if NodeKind::of(sibling) != NodeKind::Comment || sibling.start_position().row != end_row {
            break;
        }
        comments.push(sibling);
        current = sibling.next_named_sibling();
    }
    comments
}

/// Leading comments of a node, falling back to trailing ones.
/// Returns (normalized, original) or `None` when the node has no comment.
pub fn node_annotation(node: Node<'_>, source: &str) -> Option<(String, String)> {
    let mut comments = leading_comments(node);
    if comments.is_empty() {
        comments = trailing_comments(node);
    }
    if comments.is_empty() {
        return None;
    }
    let raw: Vec<&str> = comments.iter().map(|c| node_text(*c, source)).collect();
    Some((normalize_comments(&raw), raw.join("\n")))
}

/// Names a top-level statement declares, whether it is exported, and whether it is the default export
fn statement_names(statement: Node<'_>, source: &str) -> (Vec<String>, bool, bool) {
    match NodeKind::of(statement) {
        NodeKind::Export => {
            let default = crate::syntax::is_default_export(statement);
            let mut names = Vec::new();
            if let Some(decl) = statement.child_by_field_name("declaration") {
                names.extend(declared_names(decl, source));
            }
            if let Some(value) = statement.child_by_field_name("value") {
                if value.kind() == "identifier" {
                    names.push(node_text(value, source).to_string());
                }
            }
            let mut cursor = statement.walk();
            for clause in statement
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "export_clause")
            {
                let mut inner = clause.walk();
                for spec in clause.named_children(&mut inner) {
                    for field in ["name", "alias"] {
                        if let Some(n) = spec.child_by_field_name(field) {
                            names.push(node_text(n, source).to_string());
                        }
                    }
                }
            }
            (names, true, default)
        }
        NodeKind::Declaration(_) => (declared_names(statement, source), false, false),
        _ => (Vec::new(), false, false),
    }
}

/// Identifiers introduced by a declaration node
pub fn declared_names(decl: Node<'_>, source: &str) -> Vec<String> {
    match NodeKind::of(decl) {
        NodeKind::Declaration(DeclarationNode::Variable) => variable_declarators(decl, source)
            .into_iter()
            .map(|(name, _)| name)
            .collect(),
        NodeKind::Declaration(_) => decl
            .child_by_field_name("name")
            .map(|n| vec![node_text(n, source).to_string()])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Declaration order used when an entity is looked up by name
const LOOKUP_ORDER: &[DeclarationNode] = &[
    DeclarationNode::Class,
    DeclarationNode::Function,
    DeclarationNode::Variable,
    DeclarationNode::Interface,
    DeclarationNode::TypeAlias,
    DeclarationNode::Enum,
];

/// Top-level statement owning an entity named `raw_name`.
///
/// Exported statements that declare or re-export the name win; then plain
/// declarations in class, function, variable, interface, type, enum order.
/// `default` matches the `export default` statement.
pub fn find_declaration_statement<'t>(root: Node<'t>, raw_name: &str, source: &str) -> Option<Node<'t>> {
    let mut cursor = root.walk();
    let statements: Vec<Node<'t>> = root.named_children(&mut cursor).collect();

    let exported = statements.iter().copied().find(|stmt| {
        let (names, is_export, is_default) = statement_names(*stmt, source);
        is_export && ((raw_name == "default" && is_default) || names.iter().any(|n| n == raw_name))
    });
    if exported.is_some() {
        return exported;
    }

    LOOKUP_ORDER.iter().find_map(|wanted| {
        statements.iter().copied().find(|stmt| {
            NodeKind::of(*stmt) == NodeKind::Declaration(*wanted)
                && declared_names(*stmt, source).iter().any(|n| n == raw_name)
        })
    })
}

/// Top-level statement covering a 1-based line
pub fn statement_at_line(root: Node<'_>, line: usize) -> Option<Node<'_>> {
    let row = line.checked_sub(1)?;
    let mut cursor = root.walk();
    let found = root.named_children(&mut cursor).find(|stmt| {
        NodeKind::of(*stmt) != NodeKind::Comment
            && stmt.start_position().row <= row
            && stmt.end_position().row >= row
    });
    found
}

/// Last comment written right before a declaration of `name`, found by text search.
/// Returns (normalized, original).
pub fn preceding_comment_for_name(source: &str, name: &str) -> Option<(String, String)> {
    if name.is_empty() {
        return None;
    }
    let pattern = format!(
        r"(/\*(?:[^*]|\*+[^*/])*\*+/|(?://[^\n]*\n[ \t]*)+)\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?(?:const|let|var|function|class)?\s*\b{}\b",
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    let last = re.captures_iter(source).last()?;
    let raw = last.get(1)?.as_str().trim_end().to_string();
    let normalized = normalize_comment(&raw);
    if normalized.is_empty() {
        return None;
    }
    Some((normalized, raw))
}

/// Leading `<!-- … -->` comment of a markup block. Returns (normalized, original).
pub fn leading_markup_comment(markup: &str) -> Option<(String, String)> {
    let caps = HTML_COMMENT.captures(markup)?;
    let original = caps.get(0)?.as_str().trim().to_string();
    let normalized = caps[1].trim().to_string();
    (!normalized.is_empty()).then_some((normalized, original))
}
