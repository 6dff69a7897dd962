//! In-place annotation rewrites.
//!
//! A known old annotation is first matched against the comment group directly
//! above the owning declaration, then searched for over block, line and markup
//! comments, and replaced in place. A first annotation is inserted
//! before or after the owning declaration. Writes to one file are serialized.

use crate::config::InsertPosition;
use crate::error::Result;
use entity_extractor::comments::{
    find_declaration_statement, leading_comments, normalize_comment, normalize_comments, statement_at_line,
    trailing_comments, BLOCK_COMMENT_SPAN,
};
use entity_extractor::sfc::parse_sfc;
use entity_extractor::syntax::{node_text, NodeKind};
use entity_extractor::{parse_source, BaseEntity, SourceKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tree_sitter::Node;

static MARKUP_COMMENT_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("Invalid regex"));

/// Raw names under which a single-file component is extracted as a whole
const WHOLE_COMPONENT_NAMES: &[&str] = &["setup", "default", "defineComponent"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommentShape {
    Block,
    Line,
    Markup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CommentSpan {
    start: usize,
    end: usize,
    shape: CommentShape,
}

/// File text after an annotation write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub source: String,
    /// Comment as written, markers included
    pub comment: String,
}

/// Writes generated annotations into source files under a project root
pub struct AnnotationWriter {
    root: PathBuf,
    position: InsertPosition,
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl AnnotationWriter {
    pub fn new(root: impl Into<PathBuf>, position: InsertPosition) -> Self {
        Self {
            root: root.into(),
            position,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_lock(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .expect("file lock map mutex poisoned")
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    /// Write `annotation` for `entity`, replacing `old` (normalized) when it is found.
    ///
    /// Returns the comment written, or `None` when the file is unchanged.
    /// Entity locations are not updated.
    pub async fn write(&self, entity: &BaseEntity, annotation: &str, old: Option<&str>) -> Result<Option<String>> {
        let path = self.root.join(&entity.file);
        let lock = self.file_lock(&path);
        let _guard = lock.lock().await;

        let kind = SourceKind::require(&path)?;
        let source = tokio::fs::read_to_string(&path).await?;
        let Some(rewrite) = rewrite_source(&source, kind, entity, annotation, old, self.position)? else {
            return Ok(None);
        };
        if rewrite.source == source {
            return Ok(None);
        }
        tokio::fs::write(&path, rewrite.source).await?;
        log::debug!("Wrote annotation of {} into {}", entity.id, path.display());
        Ok(Some(rewrite.comment))
    }
}

/// File text with the annotation applied, `None` when nothing changes
pub fn rewrite_source(
    source: &str,
    kind: SourceKind,
    entity: &BaseEntity,
    annotation: &str,
    old: Option<&str>,
    position: InsertPosition,
) -> Result<Option<Rewrite>> {
    if annotation.trim().is_empty() {
        return Ok(None);
    }
    if let Some(old) = old.map(str::trim).filter(|old| !old.is_empty()) {
        if collapse(&normalize_comment(annotation)) == collapse(old) {
            return Ok(None);
        }
        let span = match owned_comment_group(source, kind, entity, old)? {
            Some(span) => Some(span),
            None => find_comment_span(source, old, entity.loc.start),
        };
        if let Some(span) = span {
            return Ok(Some(splice(source, span, annotation)));
        }
        log::debug!("Previous annotation of {} not found, inserting a new one", entity.id);
    }

    let rewrite = match kind {
        SourceKind::Vue => insert_in_component(source, entity, annotation, position)?,
        _ => insert_in_script(source, kind, entity, annotation, position)?,
    };
    Ok(Some(rewrite))
}

/// Wrap annotation text in a doc comment unless it already is a comment
pub fn format_annotation(text: &str) -> String {
    let text = text.trim();
    if text.starts_with("/*") || text.starts_with("//") {
        return text.to_string();
    }
    let body = if text.starts_with("<!--") {
        normalize_comment(text)
    } else {
        text.to_string()
    };
    let lines: Vec<String> = body
        .lines()
        .map(|line| format!(" * {}", line.trim()).trim_end().to_string())
        .collect();
    format!("/**\n{}\n */", lines.join("\n"))
}

/// Wrap annotation text in a markup comment unless it already is one
pub fn format_markup_annotation(text: &str) -> String {
    let text = text.trim();
    if text.starts_with("<!--") {
        return text.to_string();
    }
    format!("<!-- {} -->", normalize_comment(text))
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

fn is_whole_component(kind: SourceKind, entity: &BaseEntity) -> bool {
    matches!(kind, SourceKind::Vue) && WHOLE_COMPONENT_NAMES.contains(&entity.raw_name.as_str())
}

/// Top-level statement the entity's annotation belongs to
fn owning_statement<'t>(
    root: Node<'t>,
    entity: &BaseEntity,
    content: &str,
    whole_component: bool,
    line_offset: usize,
) -> Option<Node<'t>> {
    if whole_component {
        return first_statement(root);
    }
    find_declaration_statement(root, &entity.raw_name, content)
        .or_else(|| statement_at_line(root, entity.loc.start.saturating_sub(line_offset)))
}

/// The contiguous comments around the owning statement as one span, when together they read as `old`
fn owned_comment_group(source: &str, kind: SourceKind, entity: &BaseEntity, old: &str) -> Result<Option<CommentSpan>> {
    let (content, offset, line_offset, script_kind) = match kind {
        SourceKind::Vue => {
            let sfc = parse_sfc(source);
            let Some(block) = sfc.primary_script() else {
                return Ok(None);
            };
            (
                block.content,
                block.offset,
                block.line_offset,
                SourceKind::for_script_lang(block.lang.as_deref()),
            )
        }
        other => (source, 0, 0, other),
    };

    let tree = parse_source(content, script_kind)?;
    let whole_component = is_whole_component(kind, entity);
    let Some(statement) = owning_statement(tree.root_node(), entity, content, whole_component, line_offset) else {
        return Ok(None);
    };
    let mut comments = leading_comments(statement);
    if comments.is_empty() {
        comments = trailing_comments(statement);
    }
    let (Some(first), Some(last)) = (comments.first(), comments.last()) else {
        return Ok(None);
    };

    let raw: Vec<&str> = comments.iter().map(|c| node_text(*c, content)).collect();
    if collapse(&normalize_comments(&raw)) != collapse(old) {
        return Ok(None);
    }
    Ok(Some(CommentSpan {
        start: offset + first.start_byte(),
        end: offset + last.end_byte(),
        shape: CommentShape::Block,
    }))
}

/// Comment whose normalized text equals `old`, nearest to `near_line` when several match
fn find_comment_span(source: &str, old: &str, near_line: usize) -> Option<CommentSpan> {
    let wanted = collapse(old);
    let mut spans: Vec<CommentSpan> = BLOCK_COMMENT_SPAN
        .find_iter(source)
        .map(|m| CommentSpan {
            start: m.start(),
            end: m.end(),
            shape: CommentShape::Block,
        })
        .collect();
    spans.extend(line_comment_blocks(source));
    spans.extend(MARKUP_COMMENT_SPAN.find_iter(source).map(|m| CommentSpan {
        start: m.start(),
        end: m.end(),
        shape: CommentShape::Markup,
    }));

    spans
        .into_iter()
        .filter(|span| collapse(&normalize_comment(&source[span.start..span.end])) == wanted)
        .min_by_key(|span| line_of(source, span.end).abs_diff(near_line))
}

/// Runs of consecutive lines that start with `//`
fn line_comment_blocks(source: &str) -> Vec<CommentSpan> {
    let mut blocks = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        let trimmed = content.trim_start();
        if trimmed.starts_with("//") {
            let start = offset + (content.len() - trimmed.len());
            let end = offset + content.len();
            current = Some(current.map_or((start, end), |(first, _)| (first, end)));
        } else if let Some((start, end)) = current.take() {
            blocks.push(CommentSpan {
                start,
                end,
                shape: CommentShape::Line,
            });
        }
        offset += line.len();
    }
    if let Some((start, end)) = current {
        blocks.push(CommentSpan {
            start,
            end,
            shape: CommentShape::Line,
        });
    }
    blocks
}

fn splice(source: &str, span: CommentSpan, annotation: &str) -> Rewrite {
    let comment = match span.shape {
        CommentShape::Markup => format_markup_annotation(annotation),
        CommentShape::Block | CommentShape::Line => format_annotation(annotation),
    };
    let indent = indentation_at(source, span.start).unwrap_or("");
    let mut out = String::with_capacity(source.len() + comment.len());
    out.push_str(&source[..span.start]);
    out.push_str(&indent_lines(&comment, indent));
    out.push_str(&source[span.end..]);
    Rewrite { source: out, comment }
}

/// Whitespace between the start of the line and `offset`, `None` when code precedes it
fn indentation_at(source: &str, offset: usize) -> Option<&str> {
    let line_start = source[..offset].rfind('\n').map_or(0, |idx| idx + 1);
    let prefix = &source[line_start..offset];
    prefix.trim().is_empty().then_some(prefix)
}

/// Indent every line after the first; continuation `*` lines keep one leading space
fn indent_lines(text: &str, indent: &str) -> String {
    let mut lines = text.lines();
    let mut out = lines.next().unwrap_or_default().to_string();
    for line in lines {
        let trimmed = line.trim_start();
        out.push('\n');
        out.push_str(indent);
        if trimmed.starts_with('*') {
            out.push(' ');
        }
        out.push_str(trimmed);
    }
    out
}

/// Insert `comment` on its own line before or after the statement spanning `start..end`
fn insert_around(source: &str, start: usize, end: usize, comment: &str, position: InsertPosition) -> String {
    let indent = indentation_at(source, start);
    let block = indent_lines(comment, indent.unwrap_or(""));
    let mut out = String::with_capacity(source.len() + block.len() + 8);
    match (position, indent) {
        (InsertPosition::Before, Some(indent)) => {
            let line_start = start - indent.len();
            out.push_str(&source[..line_start]);
            out.push_str(indent);
            out.push_str(&block);
            out.push('\n');
            out.push_str(&source[line_start..]);
        }
        (InsertPosition::Before, None) => {
            out.push_str(&source[..start]);
            out.push_str(&block);
            out.push('\n');
            out.push_str(&source[start..]);
        }
        (InsertPosition::After, indent) => {
            let line_end = source[end..].find('\n').map_or(source.len(), |idx| end + idx);
            out.push_str(&source[..line_end]);
            out.push('\n');
            out.push_str(indent.unwrap_or(""));
            out.push_str(&block);
            out.push_str(&source[line_end..]);
        }
    }
    out
}

fn first_statement(root: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = root.walk();
    let found = root
        .named_children(&mut cursor)
        .find(|node| NodeKind::of(*node) != NodeKind::Comment);
    found
}

fn insert_in_script(
    source: &str,
    kind: SourceKind,
    entity: &BaseEntity,
    annotation: &str,
    position: InsertPosition,
) -> Result<Rewrite> {
    let comment = format_annotation(annotation);
    let tree = parse_source(source, kind)?;
    let source = match owning_statement(tree.root_node(), entity, source, false, 0) {
        Some(node) => insert_around(source, node.start_byte(), node.end_byte(), &comment, position),
        None => format!("{comment}\n{source}"),
    };
    Ok(Rewrite { source, comment })
}

fn insert_in_component(
    source: &str,
    entity: &BaseEntity,
    annotation: &str,
    position: InsertPosition,
) -> Result<Rewrite> {
    let sfc = parse_sfc(source);

    if let Some(block) = sfc.primary_script() {
        let tree = parse_source(block.content, SourceKind::for_script_lang(block.lang.as_deref()))?;
        let root = tree.root_node();
        let whole_component = is_whole_component(SourceKind::Vue, entity);
        let statement = owning_statement(root, entity, block.content, whole_component, block.line_offset)
            .or_else(|| first_statement(root));
        if let Some(node) = statement {
            let comment = format_annotation(annotation);
            let source = insert_around(
                source,
                block.offset + node.start_byte(),
                block.offset + node.end_byte(),
                &comment,
                position,
            );
            return Ok(Rewrite { source, comment });
        }
    }

    let comment = format_markup_annotation(annotation);
    let source = match (&sfc.template, position) {
        (Some(template), InsertPosition::Before) => {
            format!("{}\n{comment}{}", &source[..template.offset], &source[template.offset..])
        }
        (Some(template), InsertPosition::After) => {
            let end = template.end();
            format!("{}{comment}\n{}", &source[..end], &source[end..])
        }
        (None, _) => format!("{comment}\n{source}"),
    };
    Ok(Rewrite { source, comment })
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_extractor::comments::{leading_markup_comment, node_annotation};
    use entity_extractor::{annotation_hash, EntityKind, Loc};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn entity(file: &str, raw_name: &str, line: usize) -> BaseEntity {
        BaseEntity {
            id: format!("Function:{raw_name}"),
            kind: EntityKind::Function,
            file: file.to_string(),
            loc: Loc::new(line, line),
            raw_name: raw_name.to_string(),
            is_ddd: false,
            is_workspace: false,
            code_md5: String::new(),
        }
    }

    fn annotation_of(source: &str, name: &str) -> Option<String> {
        let tree = parse_source(source, SourceKind::TypeScript).unwrap();
        let statement = find_declaration_statement(tree.root_node(), name, source)?;
        node_annotation(statement, source).map(|(normalized, _)| normalized)
    }

    #[test]
    fn formats_plain_text_as_doc_comment() {
        assert_eq!(format_annotation("  Loads a user\n\nby id "), "/**\n * Loads a user\n *\n * by id\n */");
        assert_eq!(format_annotation("// keep"), "// keep");
        assert_eq!(format_markup_annotation("/** Card */"), "<!-- Card -->");
    }

    #[test]
    fn formatted_annotation_normalizes_back() {
        let text = "Fetches one user\n@param id user id";
        assert_eq!(normalize_comment(&format_annotation(text)), text);
    }

    #[test]
    fn inserts_before_declaration_with_its_indentation() {
        let source = "import x from './x';\n\nexport function load() {\n  return x;\n}\n";
        let updated = rewrite_source(
            source,
            SourceKind::TypeScript,
            &entity("src/a.ts", "load", 3),
            "Loads x",
            None,
            InsertPosition::Before,
        )
        .unwrap()
        .unwrap()
        .source;
        assert_eq!(
            updated,
            "import x from './x';\n\n/**\n * Loads x\n */\nexport function load() {\n  return x;\n}\n"
        );
        assert_eq!(annotation_of(&updated, "load").as_deref(), Some("Loads x"));
    }

    #[test]
    fn inserts_after_declaration() {
        let source = "export const a = 1;\nexport const b = 2;\n";
        let updated = rewrite_source(
            source,
            SourceKind::TypeScript,
            &entity("src/a.ts", "a", 1),
            "First",
            None,
            InsertPosition::After,
        )
        .unwrap()
        .unwrap()
        .source;
        assert_eq!(updated, "export const a = 1;\n/**\n * First\n */\nexport const b = 2;\n");
    }

    #[test]
    fn splices_block_comment_in_place() {
        let source = "/** Old text */\nexport function a() {}\n\n/** Old text */\nexport function b() {}\n";
        let updated = rewrite_source(
            source,
            SourceKind::TypeScript,
            &entity("src/a.ts", "b", 5),
            "New text\nsecond line",
            Some("Old text"),
            InsertPosition::Before,
        )
        .unwrap()
        .unwrap()
        .source;
        assert_eq!(
            updated,
            "/** Old text */\nexport function a() {}\n\n/**\n * New text\n * second line\n */\nexport function b() {}\n"
        );
    }

    #[test]
    fn splices_line_comment_block() {
        let source = "class Store {\n  // old one\n  // old two\n  run() {}\n}\n";
        let updated = rewrite_source(
            source,
            SourceKind::TypeScript,
            &entity("src/store.ts", "Store", 1),
            "Runs the store",
            Some("old one\nold two"),
            InsertPosition::Before,
        )
        .unwrap()
        .unwrap()
        .source;
        assert_eq!(updated, "class Store {\n  /**\n   * Runs the store\n   */\n  run() {}\n}\n");
    }

    #[test]
    fn replaces_every_comment_above_the_declaration() {
        let source = "// a\n/** b */\nexport function f() {}\n";
        let rewrite = rewrite_source(
            source,
            SourceKind::TypeScript,
            &entity("src/f.ts", "f", 3),
            "New",
            Some("a\nb"),
            InsertPosition::Before,
        )
        .unwrap()
        .unwrap();
        assert_eq!(rewrite.source, "/**\n * New\n */\nexport function f() {}\n");
        assert_eq!(rewrite.comment, "/**\n * New\n */");
        assert_eq!(annotation_of(&rewrite.source, "f").as_deref(), Some("New"));
    }

    #[test]
    fn replaces_line_run_and_block_only_for_the_owning_declaration() {
        let source = "// keep me\nexport const a = 1;\n\n// first\n// second\n/**\n * third\n */\nexport function b() {}\n";
        let rewrite = rewrite_source(
            source,
            SourceKind::TypeScript,
            &entity("src/b.ts", "b", 9),
            "Only b",
            Some("first\nsecond\nthird"),
            InsertPosition::Before,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            rewrite.source,
            "// keep me\nexport const a = 1;\n\n/**\n * Only b\n */\nexport function b() {}\n"
        );
        assert_eq!(annotation_of(&rewrite.source, "a").as_deref(), Some("keep me"));
        assert_eq!(annotation_of(&rewrite.source, "b").as_deref(), Some("Only b"));
    }

    #[test]
    fn unchanged_annotation_is_a_no_op() {
        let source = "/** Same */\nexport function a() {}\n";
        let result = rewrite_source(
            source,
            SourceKind::TypeScript,
            &entity("src/a.ts", "a", 2),
            "/**\n * Same\n */",
            Some("Same"),
            InsertPosition::Before,
        )
        .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn component_annotation_goes_before_first_script_statement() {
        let source = "<template>\n  <div/>\n</template>\n<script setup lang=\"ts\">\nimport { ref } from 'vue';\nconst open = ref(false);\n</script>\n";
        let mut card = entity("src/Card.vue", "setup", 1);
        card.kind = EntityKind::Component;
        let updated = rewrite_source(source, SourceKind::Vue, &card, "User card", None, InsertPosition::Before)
            .unwrap()
            .unwrap()
            .source;
        assert!(updated.contains("<script setup lang=\"ts\">\n/**\n * User card\n */\nimport { ref } from 'vue';"));
    }

    #[test]
    fn template_only_component_gets_markup_comment() {
        let source = "<template>\n  <div>hi</div>\n</template>\n";
        let mut card = entity("src/Hello.vue", "default", 1);
        card.kind = EntityKind::Component;
        let rewrite = rewrite_source(source, SourceKind::Vue, &card, "Greeting", None, InsertPosition::Before)
            .unwrap()
            .unwrap();
        let updated = rewrite.source;
        assert_eq!(updated, "<template>\n<!-- Greeting -->\n  <div>hi</div>\n</template>\n");

        let sfc = parse_sfc(&updated);
        let template = sfc.template.unwrap();
        let (normalized, original) = leading_markup_comment(template.content).unwrap();
        assert_eq!(normalized, "Greeting");
        assert_eq!(rewrite.comment, original);
        assert_eq!(annotation_hash(&rewrite.comment), annotation_hash(&original));

        let replaced = rewrite_source(&updated, SourceKind::Vue, &card, "Hello text", Some("Greeting"), InsertPosition::Before)
            .unwrap()
            .unwrap()
            .source;
        assert!(replaced.contains("<!-- Hello text -->"));
        assert!(!replaced.contains("Greeting"));
    }

    #[tokio::test]
    async fn concurrent_writes_to_one_file_both_land() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("src")).unwrap();
        std::fs::write(
            temp.path().join("src/math.ts"),
            "export function add() {}\n\nexport function sub() {}\n",
        )
        .unwrap();

        let writer = AnnotationWriter::new(temp.path(), InsertPosition::Before);
        let add = entity("src/math.ts", "add", 1);
        let sub = entity("src/math.ts", "sub", 3);
        let (first, second) = tokio::join!(writer.write(&add, "Adds", None), writer.write(&sub, "Subtracts", None));
        assert!(first.unwrap().is_some());
        assert!(second.unwrap().is_some());

        let text = std::fs::read_to_string(temp.path().join("src/math.ts")).unwrap();
        assert_eq!(annotation_of(&text, "add").as_deref(), Some("Adds"));
        assert_eq!(annotation_of(&text, "sub").as_deref(), Some("Subtracts"));

        assert_eq!(writer.write(&add, "Adds", Some("Adds")).await.unwrap(), None);
    }
}
