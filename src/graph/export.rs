//! Graph export for external renderers

use std::collections::HashSet;

use super::{EdgeKind, GraphNode, NodeKind, ThreatGraph};

/// Node fill colors by kind
const COLOR_MAP: [(NodeKind, &str); 3] = [
    (NodeKind::TechnicalAsset, "#2196F3"),
    (NodeKind::DataAsset, "#4CAF50"),
    (NodeKind::TrustBoundary, "#FF9800"),
];

impl ThreatGraph {
    /// Export to GraphViz DOT. Trust boundaries become nested clusters.
    pub fn to_dot(&self) -> String {
        let mut output = String::new();

        output.push_str("digraph ThreatModel {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str("  compound=true;\n");
        output.push_str("  node [shape=box, style=\"filled,rounded\", fontname=\"Helvetica\", fontsize=10];\n");
        output.push_str("  edge [fontname=\"Helvetica\", fontsize=8, fontcolor=\"#808080\"];\n");
        output.push('\n');

        let mut drawn = HashSet::new();
        for boundary in self.nodes_of(NodeKind::TrustBoundary).filter(|b| b.group_id.is_none()) {
            self.write_cluster(&mut output, boundary, 1, &mut drawn);
        }
        // Boundaries whose parents nest in a cycle have no root to start from
        for boundary in self.nodes_of(NodeKind::TrustBoundary) {
            self.write_cluster(&mut output, boundary, 1, &mut drawn);
        }

        // Ungrouped nodes, and members of groups no cluster reached
        for node in self.nodes.iter().filter(|n| n.kind != NodeKind::TrustBoundary) {
            if !drawn.contains(node.id.as_str()) {
                write_node(&mut output, node, 1);
            }
        }

        output.push('\n');

        for edge in &self.edges {
            let style = match edge.kind {
                EdgeKind::CommunicationLink => "solid",
                _ => "dashed",
            };
            match &edge.label {
                Some(label) => output.push_str(&format!(
                    "  \"{}\" -> \"{}\" [label=\"{}\", style={}];\n",
                    escape(&edge.from),
                    escape(&edge.to),
                    escape(label),
                    style
                )),
                None => output.push_str(&format!(
                    "  \"{}\" -> \"{}\" [style={}];\n",
                    escape(&edge.from),
                    escape(&edge.to),
                    style
                )),
            }
        }

        output.push_str("}\n");
        output
    }

    fn write_cluster<'g>(
        &'g self,
        output: &mut String,
        boundary: &'g GraphNode,
        depth: usize,
        drawn: &mut HashSet<&'g str>,
    ) {
        // Each boundary is drawn once, even when nesting is cyclic
        if !drawn.insert(boundary.id.as_str()) {
            return;
        }

        let indent = "  ".repeat(depth);
        output.push_str(&format!("{}subgraph \"cluster_{}\" {{\n", indent, escape(&boundary.id)));
        output.push_str(&format!("{}  label=\"{}\";\n", indent, escape(&boundary.display_label)));
        output.push_str(&format!("{}  color=\"{}\";\n", indent, color(NodeKind::TrustBoundary)));

        for member in self.members(&boundary.id) {
            match member.kind {
                NodeKind::TrustBoundary => self.write_cluster(output, member, depth + 1, drawn),
                _ => {
                    if drawn.insert(member.id.as_str()) {
                        write_node(output, member, depth + 1);
                    }
                }
            }
        }

        output.push_str(&format!("{}}}\n", indent));
    }

    /// Export as pretty-printed JSON for renderers that take the model directly
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn write_node(output: &mut String, node: &GraphNode, depth: usize) {
    output.push_str(&format!(
        "{}\"{}\" [label=\"{}\", fillcolor=\"{}\"];\n",
        "  ".repeat(depth),
        escape(&node.id),
        escape(&node.display_label),
        color(node.kind)
    ));
}

fn color(kind: NodeKind) -> &'static str {
    COLOR_MAP
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, color)| *color)
        .unwrap_or("#9E9E9E")
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
