use crate::analyzer::StaticAnalysis;
use crate::error::{GraphError, Result};
use entity_extractor::{BaseEntity, EntityKind};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Node in the reference graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "lowercase")]
pub enum GraphNode {
    /// An extracted entity, or a referenced id no extraction produced (`kind` is `None`)
    Entity {
        id: String,
        kind: Option<EntityKind>,
        file: Option<String>,
    },
    /// An event name emitted by some entity
    Event { name: String },
}

impl GraphNode {
    pub fn key(&self) -> String {
        match self {
            Self::Entity { id, .. } => id.clone(),
            Self::Event { name } => event_key(name),
        }
    }
}

fn event_key(name: &str) -> String {
    format!("event:{name}")
}

/// Type of reference between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Imports,
    Calls,
    Emits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub kind: ReferenceKind,

    /// Method of a `Calls` edge written as `<id>.<method>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// One edge in serializable form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub from: String,
    pub to: String,
    pub kind: ReferenceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// Whole graph in serializable form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<EdgeRow>,
}

/// Directed graph of `IMPORTS`/`CALLS`/`EMITS` references between entities
pub struct ReferenceGraph {
    graph: DiGraph<GraphNode, GraphEdge>,
    index: HashMap<String, NodeIndex>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Graph of entities paired with their analysis
    pub fn from_analyses<'a>(rows: impl IntoIterator<Item = (&'a BaseEntity, &'a StaticAnalysis)>) -> Self {
        let rows: Vec<_> = rows.into_iter().collect();
        let mut graph = Self::new();
        for (entity, _) in &rows {
            graph.add_entity(entity);
        }
        for (entity, analysis) in &rows {
            graph.add_references(&entity.id, &analysis.imports, &analysis.calls, &analysis.emits);
        }
        log::info!(
            "Built reference graph: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        graph
    }

    /// Add an entity node, filling in a placeholder created by an earlier reference
    pub fn add_entity(&mut self, entity: &BaseEntity) -> NodeIndex {
        let node = GraphNode::Entity {
            id: entity.id.clone(),
            kind: Some(entity.kind),
            file: Some(entity.file.clone()),
        };
        match self.index.get(&entity.id) {
            Some(&idx) => {
                self.graph[idx] = node;
                idx
            }
            None => self.insert(node),
        }
    }

    fn insert(&mut self, node: GraphNode) -> NodeIndex {
        let key = node.key();
        let idx = self.graph.add_node(node);
        self.index.insert(key, idx);
        idx
    }

    fn entity_node(&mut self, id: &str) -> NodeIndex {
        match self.index.get(id) {
            Some(&idx) => idx,
            None => self.insert(GraphNode::Entity {
                id: id.to_string(),
                kind: None,
                file: None,
            }),
        }
    }

    fn event_node(&mut self, name: &str) -> NodeIndex {
        match self.index.get(&event_key(name)) {
            Some(&idx) => idx,
            None => self.insert(GraphNode::Event { name: name.to_string() }),
        }
    }

    /// Edges from `from` to every reference; `.method` call suffixes attach to the owning entity
    pub fn add_references<S: AsRef<str>>(&mut self, from: &str, imports: &[S], calls: &[S], emits: &[S]) {
        let source = self.entity_node(from);

        for target in imports {
            let to = self.entity_node(target.as_ref());
            self.add_edge(source, to, ReferenceKind::Imports, None);
        }
        for target in calls {
            let (owner, method) = split_method(target.as_ref());
            let to = self.entity_node(owner);
            self.add_edge(source, to, ReferenceKind::Calls, method.map(str::to_string));
        }
        for event in emits {
            let to = self.event_node(event.as_ref());
            self.add_edge(source, to, ReferenceKind::Emits, None);
        }
    }

    fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, kind: ReferenceKind, method: Option<String>) {
        let edge = GraphEdge { kind, method };
        let exists = self
            .graph
            .edges_connecting(from, to)
            .any(|existing| *existing.weight() == edge);
        if !exists {
            self.graph.add_edge(from, to, edge);
        }
    }

    fn require(&self, id: &str) -> Result<NodeIndex> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    /// Entities referencing `id`, with how they reference it
    pub fn dependents(&self, id: &str) -> Result<Vec<(String, ReferenceKind)>> {
        let node = self.require(id)?;
        Ok(self.neighbors(node, Direction::Incoming))
    }

    /// Entities and events `id` references
    pub fn dependencies(&self, id: &str) -> Result<Vec<(String, ReferenceKind)>> {
        let node = self.require(id)?;
        Ok(self.neighbors(node, Direction::Outgoing))
    }

    fn neighbors(&self, node: NodeIndex, direction: Direction) -> Vec<(String, ReferenceKind)> {
        let found: BTreeSet<(String, ReferenceKind)> = self
            .graph
            .edges_directed(node, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                (self.graph[other].key(), edge.weight().kind)
            })
            .collect();
        found.into_iter().collect()
    }

    /// Entities emitting `event`
    pub fn emitters(&self, event: &str) -> Vec<String> {
        match self.index.get(&event_key(event)) {
            Some(&idx) => self.neighbors(idx, Direction::Incoming).into_iter().map(|(id, _)| id).collect(),
            None => Vec::new(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn summary(&self) -> GraphSummary {
        let nodes = self.graph.node_indices().map(|idx| self.graph[idx].clone()).collect();
        let edges = self
            .graph
            .edge_references()
            .map(|edge| EdgeRow {
                from: self.graph[edge.source()].key(),
                to: self.graph[edge.target()].key(),
                kind: edge.weight().kind,
                method: edge.weight().method.clone(),
            })
            .collect();
        GraphSummary { nodes, edges }
    }
}

impl Default for ReferenceGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// `Function:api.get` is the `get` member of `Function:api`
fn split_method(target: &str) -> (&str, Option<&str>) {
    let Some((prefix, name)) = target.split_once(':') else {
        return (target, None);
    };
    match name.split_once('.') {
        Some((owner, method)) => (&target[..prefix.len() + 1 + owner.len()], Some(method)),
        None => (target, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_extractor::Loc;
    use pretty_assertions::assert_eq;

    fn entity(id: &str, kind: EntityKind) -> BaseEntity {
        BaseEntity {
            id: id.to_string(),
            kind,
            file: "src/a.ts".to_string(),
            loc: Loc::new(1, 1),
            raw_name: id.split_once(':').unwrap().1.to_string(),
            is_ddd: false,
            is_workspace: false,
            code_md5: String::new(),
        }
    }

    #[test]
    fn splits_method_suffix() {
        assert_eq!(split_method("Function:api.get"), ("Function:api", Some("get")));
        assert_eq!(split_method("Class:Store"), ("Class:Store", None));
    }

    #[test]
    fn builds_edges_and_answers_queries() {
        let page = entity("Component:Page", EntityKind::Component);
        let api = entity("Variable:api", EntityKind::Variable);
        let page_refs = StaticAnalysis {
            imports: vec!["Variable:api".to_string(), "Component:Missing".to_string()],
            calls: vec!["Variable:api.get".to_string(), "Variable:api.post".to_string()],
            emits: vec!["close".to_string()],
            ..Default::default()
        };
        let api_refs = StaticAnalysis::default();

        let graph = ReferenceGraph::from_analyses([(&page, &page_refs), (&api, &api_refs)]);
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 5);

        assert_eq!(
            graph.dependents("Variable:api").unwrap(),
            vec![
                ("Component:Page".to_string(), ReferenceKind::Imports),
                ("Component:Page".to_string(), ReferenceKind::Calls),
            ]
        );
        assert_eq!(graph.dependencies("Component:Page").unwrap().len(), 4);
        assert_eq!(graph.emitters("close"), vec!["Component:Page".to_string()]);
        assert!(graph.contains("Component:Missing"));
        assert!(matches!(graph.dependents("Function:nope"), Err(GraphError::NodeNotFound(_))));

        let summary = graph.summary();
        let methods: Vec<_> = summary.edges.iter().filter_map(|e| e.method.as_deref()).collect();
        assert_eq!(methods, vec!["get", "post"]);
    }
}
