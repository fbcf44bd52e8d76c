//! Document → graph projection

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashMap;

use super::{EdgeKind, GraphEdge, GraphNode, NodeKind, ThreatGraph};
use crate::document::{Document, DATA_ASSETS, TECHNICAL_ASSETS, TRUST_BOUNDARIES};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionOptions {
    /// Emit data asset nodes and the edges that reach them
    pub show_data_assets: bool,
}

/// Derive the graph for `document`. Deterministic and side-effect free.
pub fn project(document: &Document, options: &ProjectionOptions) -> ThreatGraph {
    let groups = GroupAssignment::scan(document);
    let mut graph = ThreatGraph::default();

    for (key, asset) in document.entities(TECHNICAL_ASSETS) {
        let id = entity_id(key, asset);
        graph.nodes.push(GraphNode {
            id: id.to_string(),
            kind: NodeKind::TechnicalAsset,
            display_label: key.to_string(),
            group_id: groups.assets.get(id).cloned(),
        });
        link_edges(&mut graph.edges, id, asset, options);
        if options.show_data_assets {
            for (field, kind) in [
                ("data_assets_processed", EdgeKind::DataProcessed),
                ("data_assets_stored", EdgeKind::DataStored),
            ] {
                for data_asset in strings(asset.get(field)) {
                    graph.edges.push(edge(id, data_asset, kind, None));
                }
            }
        }
    }

    if options.show_data_assets {
        for (key, data_asset) in document.entities(DATA_ASSETS) {
            graph.nodes.push(GraphNode {
                id: entity_id(key, data_asset).to_string(),
                kind: NodeKind::DataAsset,
                display_label: key.to_string(),
                group_id: None,
            });
        }
    }

    for (key, boundary) in document.entities(TRUST_BOUNDARIES) {
        let id = entity_id(key, boundary);
        graph.nodes.push(GraphNode {
            id: id.to_string(),
            kind: NodeKind::TrustBoundary,
            display_label: key.to_string(),
            group_id: groups.boundaries.get(id).cloned(),
        });
    }

    graph
}

/// Which boundary each asset and nested boundary belongs to.
/// Boundaries are scanned in document order and the last one listing a member wins.
#[derive(Default)]
struct GroupAssignment {
    assets: HashMap<String, String>,
    boundaries: HashMap<String, String>,
}

impl GroupAssignment {
    fn scan(document: &Document) -> Self {
        let mut groups = Self::default();
        for (key, boundary) in document.entities(TRUST_BOUNDARIES) {
            let id = entity_id(key, boundary);
            for asset in strings(boundary.get("technical_assets_inside")) {
                groups.assets.insert(asset.to_string(), id.to_string());
            }
            for nested in strings(boundary.get("trust_boundaries_nested")) {
                groups.boundaries.insert(nested.to_string(), id.to_string());
            }
        }
        groups
    }
}

fn link_edges(edges: &mut Vec<GraphEdge>, asset_id: &str, asset: &Value, options: &ProjectionOptions) {
    let Some(links) = asset.get("communication_links").and_then(Value::as_mapping) else {
        return;
    };
    for (link_key, link) in links {
        let target = link.get("target").and_then(Value::as_str);
        if let Some(target) = target {
            edges.push(edge(asset_id, target, EdgeKind::CommunicationLink, link_key.as_str()));
        }
        if !options.show_data_assets {
            continue;
        }
        for (field, kind) in [
            ("data_assets_sent", EdgeKind::DataSent),
            ("data_assets_received", EdgeKind::DataReceived),
        ] {
            for data_asset in strings(link.get(field)) {
                edges.push(edge(asset_id, data_asset, kind, None));
                if let Some(target) = target {
                    edges.push(edge(target, data_asset, kind, None));
                }
            }
        }
    }
}

fn edge(from: &str, to: &str, kind: EdgeKind, label: Option<&str>) -> GraphEdge {
    GraphEdge {
        from: from.to_string(),
        to: to.to_string(),
        kind,
        label: label.map(String::from),
    }
}

/// The entity `id`, or its section key when absent
fn entity_id<'a>(key: &'a str, entity: &'a Value) -> &'a str {
    Document::entity_id(entity).unwrap_or(key)
}

/// String items of a sequence field; anything else yields nothing
fn strings(value: Option<&Value>) -> impl Iterator<Item = &str> {
    value
        .and_then(Value::as_sequence)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}
