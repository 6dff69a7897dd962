//! Export-name sets of resolved modules.

use crate::modules::{entry_file, ModuleResolver};
use entity_extractor::comments::declared_names;
use entity_extractor::sfc::parse_sfc;
use entity_extractor::syntax::{is_default_export, node_text, string_literal, NodeKind};
use entity_extractor::{parse_source, AnalysisContext, SourceKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tree_sitter::Node;

static COMMONJS_NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:exports\.(\w+)\s*=|Object\.defineProperty\s*\(\s*exports\s*,\s*["'](\w+)["'])"#)
        .expect("Invalid regex")
});
static COMMONJS_DEFAULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"module\.exports\s*=").expect("Invalid regex"));

pub const DEFAULT_EXPORT: &str = "default";

/// Names a module exports, cached per resolved path in the analysis context.
///
/// Directories resolve to their entry file. `export * from` chains are
/// flattened without their `default`. A cycle stops at the module already
/// being collected; sets that are partial because of the cut are not cached.
pub fn module_exports(ctx: &AnalysisContext, modules: &ModuleResolver, path: &Path) -> Arc<BTreeSet<String>> {
    let mut stack = Vec::new();
    collect(ctx, modules, path, &mut stack).0
}

/// Export names of `path`, and the lowest stack depth a cycle was cut at
fn collect(
    ctx: &AnalysisContext,
    modules: &ModuleResolver,
    path: &Path,
    stack: &mut Vec<PathBuf>,
) -> (Arc<BTreeSet<String>>, Option<usize>) {
    let path = if path.is_dir() {
        match entry_file(path) {
            Some(entry) => entry,
            None => return (Arc::default(), None),
        }
    } else {
        path.to_path_buf()
    };

    if let Some(cached) = ctx.export_names(&path) {
        return (cached, None);
    }
    if let Some(depth) = stack.iter().position(|open| *open == path) {
        return (Arc::default(), Some(depth));
    }

    let source = match std::fs::read_to_string(&path) {
        Ok(source) => source,
        Err(e) => {
            log::debug!("Cannot read module {}: {e}", path.display());
            return (Arc::default(), None);
        }
    };

    let depth = stack.len();
    stack.push(path.clone());
    let mut cut = None;

    let mut names = BTreeSet::new();
    match SourceKind::from_path(&path) {
        Some(SourceKind::Vue) => {
            names.insert(DEFAULT_EXPORT.to_string());
            let sfc = parse_sfc(&source);
            let script = sfc.combined_script();
            let lang = sfc.primary_script().and_then(|block| block.lang.as_deref());
            if !script.trim().is_empty() {
                if let Ok(tree) = parse_source(&script, SourceKind::for_script_lang(lang)) {
                    cut = script_exports(tree.root_node(), &script, &path, ctx, modules, stack, &mut names);
                }
            }
        }
        Some(kind) => match ctx.parse(&path, &source, kind, None) {
            Ok(tree) => {
                cut = script_exports(tree.root_node(), &source, &path, ctx, modules, stack, &mut names);
            }
            Err(e) => log::debug!("Cannot parse module {}: {e}", path.display()),
        },
        None => {}
    }
    commonjs_exports(&source, &mut names);
    stack.pop();

    // a cut back to this module leaves nothing missing
    match cut.filter(|&at| at < depth) {
        Some(at) => (Arc::new(names), Some(at)),
        None => (ctx.store_export_names(&path, names), None),
    }
}

fn script_exports(
    root: Node<'_>,
    source: &str,
    path: &Path,
    ctx: &AnalysisContext,
    modules: &ModuleResolver,
    stack: &mut Vec<PathBuf>,
    names: &mut BTreeSet<String>,
) -> Option<usize> {
    let mut cut: Option<usize> = None;
    let mut cursor = root.walk();
    for statement in root.named_children(&mut cursor) {
        if NodeKind::of(statement) != NodeKind::Export {
            continue;
        }
        if is_default_export(statement) {
            names.insert(DEFAULT_EXPORT.to_string());
        }
        if let Some(decl) = statement.child_by_field_name("declaration") {
            names.extend(declared_names(decl, source));
        }

        let mut inner = statement.walk();
        let children: Vec<Node<'_>> = statement.children(&mut inner).collect();
        let mut has_clause = false;
        for child in &children {
            match child.kind() {
                "export_clause" => {
                    has_clause = true;
                    let mut specs = child.walk();
                    for spec in child.named_children(&mut specs) {
                        let exported = spec
                            .child_by_field_name("alias")
                            .or_else(|| spec.child_by_field_name("name"));
                        if let Some(exported) = exported {
                            names.insert(node_text(exported, source).to_string());
                        }
                    }
                }
                "namespace_export" => {
                    has_clause = true;
                    if let Some(name) = child.named_child(0) {
                        names.insert(node_text(name, source).to_string());
                    }
                }
                _ => {}
            }
        }

        let star = children.iter().any(|child| child.kind() == "*");
        if star && !has_clause {
            let Some(specifier) = statement
                .child_by_field_name("source")
                .and_then(|node| string_literal(node, source))
            else {
                continue;
            };
            if let Some(target) = modules.resolve(&specifier, path) {
                let (nested, nested_cut) = collect(ctx, modules, &target.path, stack);
                names.extend(nested.iter().filter(|name| *name != DEFAULT_EXPORT).cloned());
                cut = match (cut, nested_cut) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
            }
        }
    }
    cut
}

fn commonjs_exports(source: &str, names: &mut BTreeSet<String>) {
    for caps in COMMONJS_NAMED.captures_iter(source) {
        if let Some(name) = caps.get(1).or_else(|| caps.get(2)) {
            if name.as_str() != "__esModule" {
                names.insert(name.as_str().to_string());
            }
        }
    }
    if COMMONJS_DEFAULT.is_match(source) {
        names.insert(DEFAULT_EXPORT.to_string());
    }
}
