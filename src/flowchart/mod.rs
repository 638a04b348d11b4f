mod builder;
pub mod editor;
mod ids;
mod layout;
pub mod parser;
mod preprocess;
pub mod render;
mod types;

use tracing::info;

pub use builder::build;
pub use editor::{
    AcceptAll, DeleteRequest, Editor, EditorEvent, EditorHost, EditorState, Intent, Snapshot,
};
pub use layout::{BBox, Layout, LayoutEngine, apply_layout};
pub use parser::{ParsedFlowchart, ParserOptions, parse, parse_with};
pub use preprocess::normalize;
pub use render::{DiagramStyle, render_svg};
pub use types::{
    ArrowStyle, Direction, Edge, EdgeStyle, Graph, Node, NodeKind, NodeShape, NodeStyle, Point,
    Size, Subgraph,
};

use crate::config::LayoutConfig;

/// Runs the whole pipeline: normalize, parse, build, then lay out.
///
/// Never fails. Lines the parser cannot use are dropped and logged at debug
/// level.
pub fn load(text: &str, options: ParserOptions, config: &LayoutConfig) -> Graph {
    let parsed = parse_with(&normalize(text), options);
    let dropped = parsed.dropped.len();
    let mut graph = build(parsed, config);

    let layout = LayoutEngine::new(config).layout_graph(&graph);
    apply_layout(&mut graph, &layout);

    info!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        dropped,
        "flowchart loaded"
    );
    graph
}
