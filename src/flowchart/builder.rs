use tracing::debug;

use super::ids::IdAllocator;
use super::parser::{ParsedFlowchart, StyleDirective};
use super::types::{Edge, Graph, Node, NodeShape, NodeStyle, Subgraph};
use crate::config::LayoutConfig;

/// Turns parser output into a [`Graph`].
///
/// Declared nodes and nodes only referenced by edges are merged into one
/// record per id, in first-seen order. Edges keep their source order and get
/// allocator-issued ids. Positions are left at the origin for the layout
/// engine to fill in.
pub fn build(parsed: ParsedFlowchart, config: &LayoutConfig) -> Graph {
    let mut graph = Graph::new(parsed.direction);

    for decl in parsed.nodes.into_values() {
        let size = config.size_for(decl.shape);
        graph.insert_node(Node::new(decl.id, decl.label, decl.shape, size));
    }

    let mut edge_ids = IdAllocator::new("e");
    for parsed_edge in parsed.edges {
        for endpoint in [&parsed_edge.source, &parsed_edge.target] {
            if !graph.contains_node(endpoint) {
                let size = config.size_for(NodeShape::Rectangle);
                graph.insert_node(Node::new(endpoint.as_str(), endpoint.as_str(), NodeShape::Rectangle, size));
            }
        }

        let id = edge_ids.next_id(|_| false);
        let mut edge = Edge::new(id, parsed_edge.source, parsed_edge.target);
        edge.label = parsed_edge.label;
        edge.arrow = parsed_edge.arrow;
        graph.edges.push(edge);
    }

    for directive in &parsed.styles {
        apply_style(&mut graph, directive);
    }

    graph.subgraphs = parsed
        .subgraphs
        .into_iter()
        .map(|group| Subgraph {
            nodes: group
                .nodes
                .into_iter()
                .filter(|id| graph.nodes.contains_key(id))
                .collect(),
            title: group.title,
        })
        .collect();

    graph
}

fn apply_style(graph: &mut Graph, directive: &StyleDirective) {
    let Some(node) = graph.node_mut(&directive.node_id) else {
        debug!(node = %directive.node_id, "style directive for unknown node ignored");
        return;
    };

    for (key, value) in &directive.properties {
        apply_style_property(&mut node.style, key, value);
    }
}

fn apply_style_property(style: &mut NodeStyle, key: &str, value: &str) {
    match key {
        "fill" => style.fill = Some(value.to_string()),
        "stroke" => style.stroke = Some(value.to_string()),
        "color" => style.font_color = Some(value.to_string()),
        "font-size" | "font_size" => {
            match value.trim_end_matches("px").trim().parse::<f32>() {
                Ok(size) if size.is_finite() && size > 0.0 => style.font_size = Some(size),
                _ => debug!(value, "ignoring unusable font-size"),
            }
        }
        other => debug!(key = other, "ignoring unsupported style property"),
    }
}
