//! Lineage graph of discovered entities
//!
//! Nodes are keyed by display name (table name, file basename, API path
//! segment). Re-adding a node overwrites its attributes, and re-adding an
//! edge between the same pair replaces the relationship instead of creating
//! a parallel edge.

use petgraph::dot::{Config as DotConfig, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of entity a node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Table,
    Api,
    File,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeType::Table => write!(f, "table"),
            NodeType::Api => write!(f, "api"),
            NodeType::File => write!(f, "file"),
        }
    }
}

/// Relationship carried by an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    ForeignKey,
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relationship::ForeignKey => write!(f, "foreign_key"),
        }
    }
}

/// Node payload. Attributes are empty for nodes that so far only appeared
/// as the target of an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct LineageNode {
    pub name: String,
    pub node_type: Option<NodeType>,
    pub source: Option<String>,
}

impl std::fmt::Display for LineageNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A lineage mutation recorded by a crawler and applied by the catalog
#[derive(Debug, Clone, PartialEq)]
pub enum LineageOp {
    Node {
        name: String,
        node_type: NodeType,
        source: String,
    },
    Edge {
        from: String,
        to: String,
        relationship: Relationship,
    },
}

/// Node as exposed to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: String,
    pub node_type: String,
    pub source: String,
}

/// Edge as exposed to callers and the exporter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeView {
    pub from: String,
    pub to: String,
    pub relationship: Relationship,
}

/// Nodes and edges of the graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineageView {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

/// Directed lineage graph
#[derive(Debug, Clone, Default)]
pub struct LineageGraph {
    graph: DiGraph<LineageNode, Relationship>,
    node_index: HashMap<String, NodeIndex>,
}

impl LineageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(LineageNode {
            name: name.to_string(),
            node_type: None,
            source: None,
        });
        self.node_index.insert(name.to_string(), idx);
        idx
    }

    /// Add a node, overwriting the attributes of an existing one
    pub fn add_node(&mut self, name: &str, node_type: NodeType, source: &str) {
        let idx = self.get_or_create_node(name);
        let node = &mut self.graph[idx];
        node.node_type = Some(node_type);
        node.source = Some(source.to_string());
    }

    /// Add a directed edge, creating bare endpoint nodes as needed
    pub fn add_edge(&mut self, from: &str, to: &str, relationship: Relationship) {
        let from_idx = self.get_or_create_node(from);
        let to_idx = self.get_or_create_node(to);
        self.graph.update_edge(from_idx, to_idx, relationship);
    }

    pub fn apply(&mut self, op: &LineageOp) {
        match op {
            LineageOp::Node {
                name,
                node_type,
                source,
            } => self.add_node(name, *node_type, source),
            LineageOp::Edge {
                from,
                to,
                relationship,
            } => self.add_edge(from, to, *relationship),
        }
    }

    #[cfg(test)]
    pub(crate) fn node(&self, name: &str) -> Option<&LineageNode> {
        self.node_index.get(name).map(|&idx| &self.graph[idx])
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Edges in insertion order
    pub fn edges(&self) -> Vec<EdgeView> {
        self.graph
            .edge_references()
            .map(|edge| EdgeView {
                from: self.graph[edge.source()].name.clone(),
                to: self.graph[edge.target()].name.clone(),
                relationship: *edge.weight(),
            })
            .collect()
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> Vec<NodeView> {
        self.graph
            .node_indices()
            .map(|idx| &self.graph[idx])
            .map(|node| NodeView {
                id: node.name.clone(),
                node_type: node
                    .node_type
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                source: node.source.clone().unwrap_or_default(),
            })
            .collect()
    }

    pub fn view(&self) -> LineageView {
        LineageView {
            nodes: self.nodes(),
            edges: self.edges(),
        }
    }

    /// Render the graph in Graphviz DOT format
    pub fn to_dot(&self) -> String {
        format!(
            "{}",
            Dot::with_attr_getters(
                &self.graph,
                &[DotConfig::EdgeNoLabel],
                &|_, edge| format!("label = \"{}\"", edge.weight()),
                &|_, (_, node)| match node.node_type {
                    Some(NodeType::Table) => "shape = box".to_string(),
                    Some(NodeType::Api) => "shape = ellipse".to_string(),
                    Some(NodeType::File) => "shape = note".to_string(),
                    None => "shape = plaintext".to_string(),
                },
            )
        )
    }
}
