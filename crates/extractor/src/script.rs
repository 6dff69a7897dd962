use crate::classifier::{classify, DeclarationFacts, DeclarationShape};
use crate::comments::declared_names;
use crate::hashing::code_hash;
use crate::syntax::{
    field_text, is_default_export, node_text, returns_markup, unwrap_expression,
    variable_declarators, DeclarationNode, NodeKind,
};
use crate::types::{BaseEntity, EntityKind, Loc};
use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

static CONSTANT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z_][A-Z0-9_]*$").expect("Invalid regex"));

/// Walks the top-level statements of one script and collects exported entities
pub(crate) struct ScriptWalk<'s> {
    pub source: &'s str,
    /// Root-relative path of the file
    pub file: &'s str,
    /// File base name, used for default exports
    pub stem: &'s str,
    pub markup_context: bool,
    /// Lines preceding the script inside its file
    pub line_offset: usize,
    /// Default exports are the component itself (single-file component script)
    pub single_file: bool,
}

impl<'s> ScriptWalk<'s> {
    pub fn extract(&self, root: Node<'_>) -> Vec<BaseEntity> {
        let mut entities = Vec::new();
        let mut cursor = root.walk();
        let statements: Vec<_> = root.named_children(&mut cursor).collect();

        for statement in statements {
            if NodeKind::of(statement) == NodeKind::Export {
                self.export_statement(root, statement, &mut entities);
            }
        }

        entities
    }

    fn export_statement(&self, root: Node<'_>, statement: Node<'_>, entities: &mut Vec<BaseEntity>) {
        // re-exports from other modules belong to those modules
        if statement.child_by_field_name("source").is_some() {
            return;
        }
        let is_default = is_default_export(statement);

        if let Some(decl) = statement.child_by_field_name("declaration") {
            self.exported_declaration(statement, decl, is_default, entities);
            return;
        }

        if let Some(value) = statement.child_by_field_name("value") {
            self.default_expression(root, statement, value, entities);
            return;
        }

        let mut cursor = statement.walk();
        let clauses: Vec<_> = statement
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "export_clause")
            .collect();
        for clause in clauses {
            let mut inner = clause.walk();
            let specifiers: Vec<_> = clause
                .named_children(&mut inner)
                .filter(|c| c.kind() == "export_specifier")
                .collect();
            for specifier in specifiers {
                self.export_specifier(root, statement, specifier, entities);
            }
        }
    }

    fn exported_declaration(
        &self,
        statement: Node<'_>,
        decl: Node<'_>,
        is_default: bool,
        entities: &mut Vec<BaseEntity>,
    ) {
        match NodeKind::of(decl) {
            NodeKind::Declaration(DeclarationNode::Function) | NodeKind::Declaration(DeclarationNode::Class) => {
                let name = field_text(decl, "name", self.source);
                if self.single_file && is_default {
                    self.push(entities, self.entity(EntityKind::Component, self.stem, "default", statement));
                    return;
                }
                let shape = if NodeKind::of(decl) == NodeKind::Declaration(DeclarationNode::Class) {
                    DeclarationShape::Class
                } else {
                    DeclarationShape::Function
                };
                let facts_name = name.unwrap_or(self.stem);
                let kind = classify(&self.declaration_facts(shape, facts_name, decl, None));
                match (is_default, name) {
                    (true, name) => {
                        let raw = name.unwrap_or("default");
                        self.push(entities, self.entity(kind, self.stem, raw, statement));
                    }
                    (false, Some(name)) => {
                        self.push(entities, self.entity(kind, name, name, statement));
                    }
                    (false, None) => {}
                }
            }
            NodeKind::Declaration(DeclarationNode::Variable) => {
                for (name, declarator) in variable_declarators(decl, self.source) {
                    let value = declarator.child_by_field_name("value");
                    let facts = self.declaration_facts(DeclarationShape::Variable, &name, declarator, value);
                    let kind = classify(&facts);
                    self.push(entities, self.entity(kind, &name, &name, statement));
                }
            }
            NodeKind::Declaration(_) => {}
            NodeKind::Import
            | NodeKind::Export
            | NodeKind::Call
            | NodeKind::MarkupElement
            | NodeKind::Comment
            | NodeKind::Expression
            | NodeKind::Other => {
                // `export default function () {}` can surface as a bare expression
                if is_default {
                    self.default_kind_entity(statement, decl, None, entities);
                }
            }
        }
    }

    /// `export default <expression>`
    fn default_expression<'t>(
        &self,
        root: Node<'t>,
        statement: Node<'t>,
        value: Node<'_>,
        entities: &mut Vec<BaseEntity>,
    ) {
        if self.single_file {
            self.push(entities, self.entity(EntityKind::Component, self.stem, "default", statement));
            return;
        }

        let value = unwrap_expression(value);
        if value.kind() == "identifier" {
            let ident = node_text(value, self.source);
            if self.markup_context {
                if let Some(existing) = entities.iter_mut().find(|e| e.raw_name == ident) {
                    existing.id = existing.kind.entity_id(self.stem);
                    existing.raw_name = "default".to_string();
                    return;
                }
            }
            let local = local_declaration(root, ident, self.source, self.markup_context);
            self.default_kind_entity(statement, value, local, entities);
            return;
        }

        self.default_kind_entity(statement, value, None, entities);
    }

    fn default_kind_entity<'t>(
        &self,
        statement: Node<'t>,
        value: Node<'_>,
        local: Option<(EntityKind, Node<'t>)>,
        entities: &mut Vec<BaseEntity>,
    ) {
        let (kind, owner) = match local {
            Some((kind, decl_statement)) => (kind, decl_statement),
            None if self.markup_context => (EntityKind::Component, statement),
            None => (self.default_value_kind(value), statement),
        };
        self.push(entities, self.entity(kind, self.stem, "default", owner));
    }

    fn default_value_kind(&self, value: Node<'_>) -> EntityKind {
        match value.kind() {
            "object" | "array" | "string" | "template_string" | "number" | "true" | "false"
            | "null" | "undefined" => EntityKind::Variable,
            "arrow_function" | "function_expression" | "function" => {
                if starts_uppercase(self.stem) && !CONSTANT_NAME.is_match(self.stem) {
                    EntityKind::Component
                } else {
                    EntityKind::Function
                }
            }
            "class" => classify(&self.declaration_facts(DeclarationShape::Class, self.stem, value, None)),
            _ => EntityKind::Function,
        }
    }

    /// `export { local as exported }` without a source module
    fn export_specifier(
        &self,
        root: Node<'_>,
        statement: Node<'_>,
        specifier: Node<'_>,
        entities: &mut Vec<BaseEntity>,
    ) {
        let Some(local) = field_text(specifier, "name", self.source) else {
            return;
        };
        let exported = field_text(specifier, "alias", self.source).unwrap_or(local);

        let Some((kind, decl_statement)) = local_declaration(root, local, self.source, self.markup_context) else {
            log::debug!("{}: export of unknown local {local}", self.file);
            return;
        };

        if exported == "default" {
            if self.single_file {
                self.push(entities, self.entity(EntityKind::Component, self.stem, "default", statement));
            } else {
                self.push(entities, self.entity(kind, self.stem, "default", decl_statement));
            }
            return;
        }
        self.push(entities, self.entity(kind, exported, exported, decl_statement));
    }

    fn declaration_facts<'n>(
        &self,
        shape: DeclarationShape,
        name: &'n str,
        node: Node<'_>,
        value: Option<Node<'_>>,
    ) -> DeclarationFacts<'n>
    where
        's: 'n,
    {
        let text = node_text(node, self.source);
        let markup = match shape {
            DeclarationShape::Variable => value.is_some_and(returns_markup),
            DeclarationShape::Function => returns_markup(node),
            DeclarationShape::Class => false,
        };
        DeclarationFacts::new(shape, name, text)
            .with_initializer(value.map(|v| node_text(v, self.source)))
            .in_markup_context(self.markup_context)
            .returning_markup(markup)
    }

    fn entity(&self, kind: EntityKind, id_name: &str, raw_name: &str, owner: Node<'_>) -> BaseEntity {
        BaseEntity {
            id: kind.entity_id(id_name),
            kind,
            file: self.file.to_string(),
            loc: Loc::of_node(owner, self.line_offset),
            raw_name: raw_name.to_string(),
            is_ddd: false,
            is_workspace: false,
            code_md5: code_hash(node_text(owner, self.source)),
        }
    }

    fn push(&self, entities: &mut Vec<BaseEntity>, entity: BaseEntity) {
        let duplicate = entities.iter().any(|e| {
            e.id == entity.id && (e.raw_name == entity.raw_name || entity.raw_name == "default")
        });
        if duplicate {
            log::debug!("{}: skipping duplicate entity {}", self.file, entity.id);
            return;
        }
        entities.push(entity);
    }
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// Kind and owning statement of a top-level declaration named `name`,
/// exported or not.
pub fn local_declaration<'t>(
    root: Node<'t>,
    name: &str,
    source: &str,
    markup_context: bool,
) -> Option<(EntityKind, Node<'t>)> {
    let mut cursor = root.walk();
    let statements: Vec<_> = root.named_children(&mut cursor).collect();

    for statement in statements {
        let decl = match NodeKind::of(statement) {
            NodeKind::Export => match statement.child_by_field_name("declaration") {
                Some(decl) => decl,
                None => continue,
            },
            NodeKind::Declaration(_) => statement,
            _ => continue,
        };
        if !declared_names(decl, source).iter().any(|n| n == name) {
            continue;
        }

        let walk = ScriptWalk {
            source,
            file: "",
            stem: name,
            markup_context,
            line_offset: 0,
            single_file: false,
        };
        let kind = match NodeKind::of(decl) {
            NodeKind::Declaration(DeclarationNode::Function) => {
                classify(&walk.declaration_facts(DeclarationShape::Function, name, decl, None))
            }
            NodeKind::Declaration(DeclarationNode::Class) => {
                classify(&walk.declaration_facts(DeclarationShape::Class, name, decl, None))
            }
            NodeKind::Declaration(DeclarationNode::Variable) => {
                let declarator = variable_declarators(decl, source)
                    .into_iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, d)| d)?;
                let value = declarator.child_by_field_name("value");
                classify(&walk.declaration_facts(DeclarationShape::Variable, name, declarator, value))
            }
            _ => continue,
        };
        return Some((kind, statement));
    }
    None
}
