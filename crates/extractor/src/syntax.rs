use tree_sitter::Node;

/// Node categories the extractors and resolver act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Import,
    Export,
    Declaration(DeclarationNode),
    Call,
    MarkupElement,
    Comment,
    Expression,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationNode {
    Function,
    Class,
    Variable,
    Interface,
    TypeAlias,
    Enum,
}

impl NodeKind {
    pub fn of(node: Node<'_>) -> Self {
        match node.kind() {
            "import_statement" => Self::Import,
            "export_statement" => Self::Export,
            "function_declaration" | "generator_function_declaration" => {
                Self::Declaration(DeclarationNode::Function)
            }
            "class_declaration" | "abstract_class_declaration" => {
                Self::Declaration(DeclarationNode::Class)
            }
            "lexical_declaration" | "variable_declaration" => {
                Self::Declaration(DeclarationNode::Variable)
            }
            "interface_declaration" => Self::Declaration(DeclarationNode::Interface),
            "type_alias_declaration" => Self::Declaration(DeclarationNode::TypeAlias),
            "enum_declaration" => Self::Declaration(DeclarationNode::Enum),
            "call_expression" => Self::Call,
            "jsx_element" | "jsx_self_closing_element" | "jsx_fragment" => Self::MarkupElement,
            "comment" => Self::Comment,
            "expression_statement" => Self::Expression,
            _ => Self::Other,
        }
    }
}

/// Node kinds that open a new function scope
const FUNCTION_SCOPES: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "function",
    "arrow_function",
    "method_definition",
];

pub fn is_function_scope(node: Node<'_>) -> bool {
    FUNCTION_SCOPES.contains(&node.kind())
}

pub fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or("")
}

pub fn field_text<'s>(node: Node<'_>, field: &str, source: &'s str) -> Option<&'s str> {
    node.child_by_field_name(field).map(|child| node_text(child, source))
}

/// Whether an `export` statement carries the `default` keyword
pub fn is_default_export(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|child| child.kind() == "default");
    found
}

/// Strip wrappers that do not change what an expression evaluates to
pub fn unwrap_expression(mut node: Node<'_>) -> Node<'_> {
    loop {
        match node.kind() {
            "parenthesized_expression" | "as_expression" | "satisfies_expression"
            | "non_null_expression" | "type_assertion" => match node.named_child(0) {
                Some(inner) => node = inner,
                None => return node,
            },
            _ => return node,
        }
    }
}

/// Names declared by a variable statement (`const a = 1, b = 2`), with each declarator
pub fn variable_declarators<'t>(node: Node<'t>, source: &str) -> Vec<(String, Node<'t>)> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() == "variable_declarator")
        .filter_map(|declarator| {
            let name = declarator.child_by_field_name("name")?;
            (name.kind() == "identifier").then(|| (node_text(name, source).to_string(), declarator))
        })
        .collect()
}

/// Does a function-like node (or an expression) produce a markup element?
///
/// Arrow functions with an expression body are checked directly; block bodies
/// are searched for `return` statements, without entering nested functions.
pub fn returns_markup(node: Node<'_>) -> bool {
    let node = unwrap_expression(node);
    if NodeKind::of(node) == NodeKind::MarkupElement {
        return true;
    }
    let Some(body) = node.child_by_field_name("body") else {
        return false;
    };
    let body = unwrap_expression(body);
    if NodeKind::of(body) == NodeKind::MarkupElement {
        return true;
    }
    body_returns_markup(body)
}

fn body_returns_markup(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if is_function_scope(child) || child.kind() == "class_body" {
            continue;
        }
        if child.kind() == "return_statement" {
            if let Some(value) = child.named_child(0) {
                let value = unwrap_expression(value);
                if NodeKind::of(value) == NodeKind::MarkupElement {
                    return true;
                }
                if value.kind() == "ternary_expression" && ternary_has_markup(value) {
                    return true;
                }
            }
            continue;
        }
        if body_returns_markup(child) {
            return true;
        }
    }
    false
}

fn ternary_has_markup(node: Node<'_>) -> bool {
    ["consequence", "alternative"].iter().any(|field| {
        node.child_by_field_name(field)
            .map(unwrap_expression)
            .is_some_and(|branch| NodeKind::of(branch) == NodeKind::MarkupElement)
    })
}

/// Top-level statement containing `node` (the child of `program`)
pub fn top_level_statement(node: Node<'_>) -> Node<'_> {
    let mut current = node;
    while let Some(parent) = current.parent() {
        if parent.kind() == "program" {
            return current;
        }
        current = parent;
    }
    current
}

/// Pre-order visit of every descendant, stopping descent where `visit` returns false
pub fn walk_tree<'t>(node: Node<'t>, visit: &mut dyn FnMut(Node<'t>) -> bool) {
    if !visit(node) {
        return;
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.named_children(&mut cursor).collect();
    for child in children {
        walk_tree(child, visit);
    }
}

/// String literal contents without quotes
pub fn string_literal(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "string" => {
            let text = node_text(node, source);
            let inner = text
                .strip_prefix(['"', '\''])
                .and_then(|t| t.strip_suffix(['"', '\'']))?;
            Some(inner.to_string())
        }
        "template_string" => {
            let text = node_text(node, source);
            if text.contains("${") {
                return None;
            }
            Some(text.trim_matches('`').to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::SourceKind;
    use tree_sitter::Parser;

    fn parse(source: &str, kind: SourceKind) -> tree_sitter::Tree {
        let mut parser = Parser::new();
        parser.set_language(&kind.tree_sitter_language().unwrap()).unwrap();
        parser.parse(source, None).unwrap()
    }

    fn first_statement(tree: &tree_sitter::Tree) -> Node<'_> {
        tree.root_node().named_child(0).unwrap()
    }

    #[test]
    fn classifies_top_level_nodes() {
        let source = "import a from 'a';\nexport const x = 1;\nfunction f() {}\n// note\n";
        let tree = parse(source, SourceKind::TypeScript);
        let root = tree.root_node();
        let kinds: Vec<_> = (0..root.named_child_count())
            .filter_map(|i| root.named_child(i))
            .map(NodeKind::of)
            .collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Import,
                NodeKind::Export,
                NodeKind::Declaration(DeclarationNode::Function),
                NodeKind::Comment,
            ]
        );
    }

    #[test]
    fn markup_returns_are_found_through_blocks() {
        let source = "function Foo(props) { if (props.x) { return (<span/>); } return null; }";
        let tree = parse(source, SourceKind::Tsx);
        assert!(returns_markup(first_statement(&tree)));

        let nested = "function build() { const f = () => <div/>; return f; }";
        let tree = parse(nested, SourceKind::Tsx);
        assert!(!returns_markup(first_statement(&tree)));
    }

    #[test]
    fn default_exports_and_declarators() {
        let source = "export default function () {}\n";
        let tree = parse(source, SourceKind::TypeScript);
        assert!(is_default_export(first_statement(&tree)));

        let source = "const a = 1, { b } = c, d = 2;";
        let tree = parse(source, SourceKind::TypeScript);
        let names: Vec<_> = variable_declarators(first_statement(&tree), source)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["a", "d"]);
    }
}
