use crate::context::AnalysisContext;
use crate::error::Result;
use crate::hashing::code_hash;
use crate::language::SourceKind;
use crate::script::ScriptWalk;
use crate::sfc::parse_sfc;
use crate::syntax::{node_text, walk_tree, NodeKind};
use crate::types::{BaseEntity, EntityKind, Loc};
use std::path::Path;

/// Component factory call recognized in `<script>` blocks
const COMPONENT_FACTORY: &str = "defineComponent";

/// Entities of a single-file component.
///
/// A `<script setup>` block makes the whole file one component. Otherwise the
/// `<script>` block is walked like a module, with its default export and any
/// component-factory call standing for the component. Template-only files are
/// a component as well.
pub(crate) fn extract_single_file(
    ctx: &AnalysisContext,
    path: &Path,
    source: &str,
    file: &str,
    stem: &str,
) -> Result<Vec<BaseEntity>> {
    let sfc = parse_sfc(source);
    let whole_file = Loc::new(1, source.lines().count().max(1));

    let component = |raw_name: &str, loc: Loc, code: &str| BaseEntity {
        id: EntityKind::Component.entity_id(stem),
        kind: EntityKind::Component,
        file: file.to_string(),
        loc,
        raw_name: raw_name.to_string(),
        is_ddd: false,
        is_workspace: false,
        code_md5: code_hash(code),
    };

    if sfc.script_setup.is_some() {
        return Ok(vec![component("setup", whole_file, source)]);
    }

    let Some(script) = sfc.script.as_ref() else {
        return Ok(vec![component("default", whole_file, source)]);
    };

    let kind = SourceKind::for_script_lang(script.lang.as_deref());
    let tree = ctx.parse(path, script.content, kind, None)?;
    let root = tree.root_node();

    let walk = ScriptWalk {
        source: script.content,
        file,
        stem,
        markup_context: kind.is_markup_context(),
        line_offset: script.line_offset,
        single_file: true,
    };
    let mut entities = walk.extract(root);

    let has_default = entities.iter().any(|e| e.raw_name == "default");
    if !has_default {
        if let Some(statement) = factory_statement(root, script.content) {
            let loc = Loc::of_node(statement, script.line_offset);
            entities.insert(
                0,
                component(COMPONENT_FACTORY, loc, node_text(statement, script.content)),
            );
        }
    }

    Ok(entities)
}

/// Top-level statement containing a `defineComponent(...)` call
fn factory_statement<'t>(root: tree_sitter::Node<'t>, source: &str) -> Option<tree_sitter::Node<'t>> {
    let mut cursor = root.walk();
    let statements: Vec<_> = root.named_children(&mut cursor).collect();
    statements.into_iter().find(|statement| {
        let mut found = false;
        walk_tree(*statement, &mut |node| {
            if found {
                return false;
            }
            if NodeKind::of(node) == NodeKind::Call {
                let callee = node
                    .child_by_field_name("function")
                    .map(|f| node_text(f, source))
                    .unwrap_or_default();
                if callee == COMPONENT_FACTORY || callee.ends_with(".defineComponent") {
                    found = true;
                    return false;
                }
            }
            true
        });
        found
    })
}
