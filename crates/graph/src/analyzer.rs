//! Per-entity static analysis: references and annotation text.

use crate::error::{GraphError, Result};
use crate::exports::module_exports;
use crate::lookup::{find_target, synthesize_id, EntityIndex, ExportRef};
use crate::modules::{clean_path, entry_file, ModuleResolver};
use entity_extractor::comments::{
    find_declaration_statement, leading_markup_comment, node_annotation, preceding_comment_for_name,
    statement_at_line,
};
use entity_extractor::sfc::parse_sfc;
use entity_extractor::syntax::{node_text, string_literal, walk_tree, NodeKind};
use entity_extractor::{
    fingerprint, parse_source, relative_path, AnalysisContext, BaseEntity, EntityExtractor, SourceKind,
};
use entity_workspace::WorkspaceResolver;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tree_sitter::Node;

static TEMPLATE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<([A-Z][a-zA-Z0-9]*|[a-z]+-[a-z-]+)(?:\s|>|/>)").expect("Invalid regex")
});

/// Lowercase tags the template scan never reports
const PLAIN_TAGS: &[&str] = &[
    "template", "div", "span", "p", "a", "img", "ul", "ol", "li", "button", "input", "form",
];

/// Raw names under which a single-file component is extracted as a whole
const WHOLE_COMPONENT_NAMES: &[&str] = &["setup", "default", "defineComponent"];

/// Static facts about one entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticAnalysis {
    #[serde(rename = "IMPORTS", default)]
    pub imports: Vec<String>,

    /// Entity ids, optionally suffixed with `.method`
    #[serde(rename = "CALLS", default)]
    pub calls: Vec<String>,

    #[serde(rename = "EMITS", default)]
    pub emits: Vec<String>,

    /// Component names referenced from markup, not resolved to ids
    #[serde(rename = "TEMPLATE_COMPONENTS", default)]
    pub template_components: Vec<String>,

    /// Normalized annotation, comment markers removed
    #[serde(rename = "ANNOTATION", default)]
    pub annotation: String,

    /// Annotation exactly as written
    #[serde(rename = "ORI_ANNOTATION", default)]
    pub original_annotation: String,
}

/// References found in one file; shared by every entity of that file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FileReferences {
    imports: BTreeSet<String>,
    calls: BTreeSet<String>,
    emits: BTreeSet<String>,
    template_components: BTreeSet<String>,
}

/// What a local name was imported as
#[derive(Debug, Clone)]
enum Binding {
    /// Default or named import, bound to the target entity id
    Entity(String),
    /// `import * as ns`: the module path and its export names
    Namespace {
        path: PathBuf,
        exports: Arc<BTreeSet<String>>,
    },
}

/// Resolves imports, calls and emitted events of entities to entity ids
pub struct StaticAnalyzer {
    extractor: Arc<EntityExtractor>,
    modules: ModuleResolver,
    index: EntityIndex,
    references: Mutex<HashMap<PathBuf, (u64, Arc<FileReferences>)>>,
}

impl StaticAnalyzer {
    pub fn new(extractor: Arc<EntityExtractor>, modules: ModuleResolver) -> Self {
        Self {
            extractor,
            modules,
            index: EntityIndex::default(),
            references: Mutex::new(HashMap::new()),
        }
    }

    /// Analyzer for the workspace's project directory, aliases loaded from its config files
    pub fn for_workspace(workspace: Arc<WorkspaceResolver>, extractor: Arc<EntityExtractor>) -> Self {
        Self::new(extractor, ModuleResolver::for_workspace(workspace))
    }

    /// Entities import targets are looked up in
    pub fn set_entities(&mut self, entities: &[BaseEntity]) {
        self.index = EntityIndex::new(entities);
        self.clear_references();
    }

    pub fn modules(&self) -> &ModuleResolver {
        &self.modules
    }

    pub fn context(&self) -> &Arc<AnalysisContext> {
        self.extractor.context()
    }

    pub fn root(&self) -> &Path {
        self.extractor.root()
    }

    /// Forget cached per-file references
    pub fn clear_references(&self) {
        self.references.lock().expect("reference cache mutex poisoned").clear();
    }

    /// Drop cached state of a rewritten file
    pub fn invalidate(&self, path: &Path) {
        self.references
            .lock()
            .expect("reference cache mutex poisoned")
            .remove(path);
        self.context().invalidate(path);
    }

    /// Imports, calls, emits, template components and annotation of `entity`.
    ///
    /// Unresolvable references are dropped; only an unreadable or
    /// unsupported file is an error.
    pub fn analyze_entity(&self, entity: &BaseEntity) -> Result<StaticAnalysis> {
        let path = clean_path(&self.root().join(&entity.file));
        let source = std::fs::read_to_string(&path).map_err(|e| GraphError::unreadable(&path, e))?;
        let kind = SourceKind::require(&path)?;

        let references = self.file_references(&path, &source, kind);
        let (annotation, original_annotation) = self.annotation(entity, &path, &source, kind).unwrap_or_default();

        Ok(StaticAnalysis {
            imports: references.imports.iter().cloned().collect(),
            calls: references.calls.iter().cloned().collect(),
            emits: references.emits.iter().cloned().collect(),
            template_components: references.template_components.iter().cloned().collect(),
            annotation,
            original_annotation,
        })
    }

    fn file_references(&self, path: &Path, source: &str, kind: SourceKind) -> Arc<FileReferences> {
        let print = fingerprint(source);
        {
            let cache = self.references.lock().expect("reference cache mutex poisoned");
            if let Some((cached_print, refs)) = cache.get(path) {
                if *cached_print == print {
                    return Arc::clone(refs);
                }
            }
        }

        let refs = Arc::new(self.scan_file(path, source, kind));
        self.references
            .lock()
            .expect("reference cache mutex poisoned")
            .insert(path.to_path_buf(), (print, Arc::clone(&refs)));
        refs
    }

    fn scan_file(&self, path: &Path, source: &str, kind: SourceKind) -> FileReferences {
        let mut refs = FileReferences::default();

        if kind == SourceKind::Vue {
            let sfc = parse_sfc(source);
            let script = sfc.combined_script();
            let lang = sfc.primary_script().and_then(|block| block.lang.as_deref());
            if !script.trim().is_empty() {
                // uncached: the combined text would evict the extractor's entry for this path
                match parse_source(&script, SourceKind::for_script_lang(lang)) {
                    Ok(tree) => self.scan_script(tree.root_node(), &script, path, false, &mut refs),
                    Err(e) => log::debug!("Cannot parse script of {}: {e}", path.display()),
                }
            }
            if let Some(template) = &sfc.template {
                template_components(template.content, &mut refs.template_components);
            }
            return refs;
        }

        match self.context().parse(path, source, kind, None) {
            Ok(tree) => {
                let markup = kind.is_markup_context();
                self.scan_script(tree.root_node(), source, path, markup, &mut refs);
                if markup {
                    markup_components(tree.root_node(), source, &mut refs.template_components);
                }
            }
            Err(e) => log::debug!("Cannot parse {}: {e}", path.display()),
        }
        refs
    }

    fn scan_script(&self, root: Node<'_>, source: &str, path: &Path, markup: bool, refs: &mut FileReferences) {
        let bindings = self.import_bindings(root, source, path, &mut refs.imports);

        walk_tree(root, &mut |node| {
            if NodeKind::of(node) != NodeKind::Call {
                return true;
            }
            if let Some(callee) = node.child_by_field_name("function") {
                if let Some(target) = self.call_target(callee, source, &bindings) {
                    refs.calls.insert(target);
                }
                let event = if markup {
                    handler_event(callee, source)
                } else {
                    emitted_event(node, callee, source)
                };
                if let Some(event) = event {
                    refs.emits.insert(event);
                }
            }
            true
        });
    }

    /// Local names bound by import statements, recording resolved targets in `imports`
    fn import_bindings(
        &self,
        root: Node<'_>,
        source: &str,
        path: &Path,
        imports: &mut BTreeSet<String>,
    ) -> HashMap<String, Binding> {
        let mut bindings = HashMap::new();
        let mut cursor = root.walk();

        for statement in root.named_children(&mut cursor) {
            if NodeKind::of(statement) != NodeKind::Import {
                continue;
            }
            let Some(specifier) = statement
                .child_by_field_name("source")
                .and_then(|node| string_literal(node, source))
            else {
                continue;
            };
            if self.modules.is_third_party(&specifier) {
                continue;
            }
            let Some(resolved) = self.modules.resolve(&specifier, path) else {
                log::debug!("Unresolved import {specifier} in {}", path.display());
                continue;
            };
            let exports = module_exports(self.context(), &self.modules, &resolved.path);

            let mut inner = statement.walk();
            let Some(clause) = statement
                .named_children(&mut inner)
                .find(|child| child.kind() == "import_clause")
            else {
                continue;
            };

            let mut parts = clause.walk();
            for part in clause.named_children(&mut parts) {
                match part.kind() {
                    "identifier" => {
                        if !exports.is_empty() {
                            let id = self.target_id(&resolved.path, ExportRef::Default);
                            imports.insert(id.clone());
                            bindings.insert(node_text(part, source).to_string(), Binding::Entity(id));
                        }
                    }
                    "named_imports" => {
                        let mut specs = part.walk();
                        for spec in part.named_children(&mut specs) {
                            let Some(name) = spec.child_by_field_name("name") else {
                                continue;
                            };
                            let imported = node_text(name, source);
                            if !exports.contains(imported) {
                                continue;
                            }
                            let local = spec.child_by_field_name("alias").unwrap_or(name);
                            let id = self.target_id(&resolved.path, ExportRef::from_name(imported));
                            imports.insert(id.clone());
                            bindings.insert(node_text(local, source).to_string(), Binding::Entity(id));
                        }
                    }
                    "namespace_import" => {
                        if let Some(local) = part.named_child(0) {
                            bindings.insert(
                                node_text(local, source).to_string(),
                                Binding::Namespace {
                                    path: resolved.path.clone(),
                                    exports: Arc::clone(&exports),
                                },
                            );
                        }
                    }
                    _ => {}
                }
            }
        }
        bindings
    }

    /// `f()`, `obj.m()` and `obj['m']()` on imported names
    fn call_target(&self, callee: Node<'_>, source: &str, bindings: &HashMap<String, Binding>) -> Option<String> {
        match callee.kind() {
            "identifier" => match bindings.get(node_text(callee, source))? {
                Binding::Entity(id) => Some(id.clone()),
                Binding::Namespace { .. } => None,
            },
            "member_expression" | "subscript_expression" => {
                let object = callee.child_by_field_name("object")?;
                if object.kind() != "identifier" {
                    return None;
                }
                let method = if callee.kind() == "member_expression" {
                    node_text(callee.child_by_field_name("property")?, source).to_string()
                } else {
                    string_literal(callee.child_by_field_name("index")?, source)?
                };
                match bindings.get(node_text(object, source))? {
                    Binding::Entity(id) => Some(format!("{id}.{method}")),
                    Binding::Namespace { path, exports } => exports
                        .contains(method.as_str())
                        .then(|| self.target_id(path, ExportRef::from_name(&method))),
                }
            }
            _ => None,
        }
    }

    /// Entity id of `export` in the module at `path`
    fn target_id(&self, path: &Path, export: ExportRef<'_>) -> String {
        let path = if path.is_dir() {
            entry_file(path).unwrap_or_else(|| path.to_path_buf())
        } else {
            path.to_path_buf()
        };
        let file = relative_path(self.root(), &path);

        if let Some(entity) = self
            .index
            .entities_in(&file)
            .and_then(|entities| find_target(entities, &file, export))
        {
            return entity.id.clone();
        }

        if path.is_file() {
            match self.extractor.extract_file(&path) {
                Ok(entities) => {
                    if let Some(entity) = find_target(&entities, &file, export) {
                        return entity.id.clone();
                    }
                }
                Err(e) => log::debug!("On-demand extraction of {file} failed: {e}"),
            }
        }

        synthesize_id(&file, export)
    }

    /// Current annotation of `entity` as (normalized, original)
    fn annotation(&self, entity: &BaseEntity, path: &Path, source: &str, kind: SourceKind) -> Option<(String, String)> {
        if kind == SourceKind::Vue {
            return vue_annotation(entity, source);
        }

        let found = self.context().parse(path, source, kind, None).ok().and_then(|tree| {
            let root = tree.root_node();
            let statement = find_declaration_statement(root, &entity.raw_name, source)
                .or_else(|| statement_at_line(root, entity.loc.start))?;
            node_annotation(statement, source)
        });
        found.or_else(|| preceding_comment_for_name(source, search_name(entity)))
    }
}

fn search_name(entity: &BaseEntity) -> &str {
    if WHOLE_COMPONENT_NAMES.contains(&entity.raw_name.as_str()) {
        entity.id_name()
    } else {
        &entity.raw_name
    }
}

/// Script comment of a single-file component, then its template comment
fn vue_annotation(entity: &BaseEntity, source: &str) -> Option<(String, String)> {
    let sfc = parse_sfc(source);
    let whole = WHOLE_COMPONENT_NAMES.contains(&entity.raw_name.as_str());

    let from_script = sfc.primary_script().and_then(|script| {
        let tree = parse_source(script.content, SourceKind::for_script_lang(script.lang.as_deref())).ok()?;
        let root = tree.root_node();
        let statement = if whole {
            let mut cursor = root.walk();
            let first = root
                .named_children(&mut cursor)
                .find(|node| NodeKind::of(*node) != NodeKind::Comment);
            first
        } else {
            find_declaration_statement(root, &entity.raw_name, script.content)
        }?;
        node_annotation(statement, script.content)
    });

    from_script.or_else(|| {
        if !whole {
            return None;
        }
        sfc.template.as_ref().and_then(|template| {
            // the comment may sit just above the <template> tag
            let before = &source[..template.offset];
            let opening = before.rfind("<template").unwrap_or(0);
            leading_markup_comment(template.content).or_else(|| trailing_markup_comment(&source[..opening]))
        })
    })
}

/// Last `<!-- … -->` comment that ends right before the markup block
fn trailing_markup_comment(prefix: &str) -> Option<(String, String)> {
    let trimmed = prefix.trim_end();
    if !trimmed.ends_with("-->") {
        return None;
    }
    let start = trimmed.rfind("<!--")?;
    leading_markup_comment(&trimmed[start..])
}

/// `emit('name')`, `ctx.emit('name')` and `this.$emit('name')`
fn emitted_event(call: Node<'_>, callee: Node<'_>, source: &str) -> Option<String> {
    let text = node_text(callee, source);
    let is_emit = matches!(text, "emit" | "$emit") || text.ends_with(".emit") || text.ends_with(".$emit");
    if !is_emit {
        return None;
    }
    let arguments = call.child_by_field_name("arguments")?;
    let first = arguments.named_child(0)?;
    string_literal(first, source).filter(|event| !event.is_empty())
}

/// `props.onSave()` emits `save`
fn handler_event(callee: Node<'_>, source: &str) -> Option<String> {
    if callee.kind() != "member_expression" {
        return None;
    }
    let object = callee.child_by_field_name("object")?;
    if node_text(object, source) != "props" {
        return None;
    }
    let property = node_text(callee.child_by_field_name("property")?, source);
    let handler = property.strip_prefix("on")?;
    let mut chars = handler.chars();
    let first = chars.next().filter(char::is_ascii_uppercase)?;
    Some(first.to_ascii_lowercase().to_string() + chars.as_str())
}

fn template_components(template: &str, found: &mut BTreeSet<String>) {
    for caps in TEMPLATE_TAG.captures_iter(template) {
        let tag = &caps[1];
        if !PLAIN_TAGS.contains(&tag) {
            found.insert(tag.to_string());
        }
    }
}

/// Capitalized JSX element names (`<Card>`, `<Form.Item/>`)
fn markup_components(root: Node<'_>, source: &str, found: &mut BTreeSet<String>) {
    walk_tree(root, &mut |node| {
        if matches!(node.kind(), "jsx_opening_element" | "jsx_self_closing_element") {
            if let Some(name) = node.child_by_field_name("name") {
                let tag = node_text(name, source);
                if tag.starts_with(|c: char| c.is_ascii_uppercase()) {
                    found.insert(tag.to_string());
                }
            }
        }
        true
    });
}
