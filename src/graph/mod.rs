//! Threat Model Graph
//!
//! Node/edge/group view derived from the document. The graph is rebuilt from
//! scratch after every edit and handed to whatever renders it; nothing here
//! holds onto the document.
//!
//! - `projector` derives the graph from a document
//! - `export` renders it for Graphviz and JSON consumers

pub mod export;
pub mod projector;

pub use projector::{project, ProjectionOptions};

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kind of entity a node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    TechnicalAsset,
    DataAsset,
    /// Group node; other nodes reference it through `group_id`
    TrustBoundary,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::TechnicalAsset => write!(f, "technical_asset"),
            NodeKind::DataAsset => write!(f, "data_asset"),
            NodeKind::TrustBoundary => write!(f, "trust_boundary"),
        }
    }
}

/// Types of edges in the threat model graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Technical asset → link target
    CommunicationLink,
    /// Technical asset → data asset it processes
    DataProcessed,
    /// Technical asset → data asset it stores
    DataStored,
    /// Link endpoint → data asset sent over the link
    DataSent,
    /// Link endpoint → data asset received over the link
    DataReceived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    /// Section key of the entity
    pub display_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

/// Directed edge; endpoints are ids and may name no node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Projected graph, in a deterministic order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl ThreatGraph {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn nodes_of(&self, kind: NodeKind) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(move |node| node.kind == kind)
    }

    /// Nodes whose group is `group_id`
    pub fn members(&self, group_id: &str) -> impl Iterator<Item = &GraphNode> + '_ {
        let group_id = group_id.to_string();
        self.nodes
            .iter()
            .filter(move |node| node.group_id.as_deref() == Some(group_id.as_str()))
    }

    /// Edges with an endpoint that names no node
    pub fn dangling_edges(&self) -> Vec<&GraphEdge> {
        self.edges
            .iter()
            .filter(|edge| self.node(&edge.from).is_none() || self.node(&edge.to).is_none())
            .collect()
    }

    /// petgraph view over nodes and resolvable edges
    pub fn to_digraph(&self) -> DiGraph<GraphNode, EdgeKind> {
        let mut graph = DiGraph::new();
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

        for node in &self.nodes {
            // Duplicate ids collapse onto the first node
            if !indices.contains_key(node.id.as_str()) {
                let idx = graph.add_node(node.clone());
                indices.insert(node.id.as_str(), idx);
            }
        }

        for edge in &self.edges {
            if let (Some(&from), Some(&to)) = (indices.get(edge.from.as_str()), indices.get(edge.to.as_str())) {
                graph.add_edge(from, to, edge.kind);
            }
        }

        graph
    }
}
