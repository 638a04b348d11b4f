//! The live editing session.
//!
//! An [`Editor`] owns exactly one [`Graph`]. Every operation runs to
//! completion synchronously; operations naming an unknown node or edge are
//! no-ops. After every call each edge still references two existing nodes.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use super::ids::IdAllocator;
use super::layout::{LayoutEngine, apply_layout};
use super::parser::ParserOptions;
use super::types::{
    ArrowStyle, Direction, Edge, Graph, Node, NodeKind, Point, Size, Subgraph,
};
use crate::config::{EditorConfig, LayoutConfig};
use crate::error::{Error, Result};

/// Callbacks from the editor to the host UI.
pub trait EditorHost {
    /// A node was opened for label editing. The host decides how to present
    /// the editor and answers with [`Editor::submit_edit`] or
    /// [`Editor::cancel_edit`].
    fn on_request_edit(&mut self, _node_id: &str) {}

    /// Destructive operations ask first; returning `false` cancels them.
    fn confirm_delete(&mut self, request: &DeleteRequest) -> bool;
}

/// Host that approves every deletion.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl EditorHost for AcceptAll {
    fn confirm_delete(&mut self, _request: &DeleteRequest) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeleteRequest {
    Node {
        id: String,
        label: String,
        /// Edges that will be removed along with the node.
        edges: Vec<String>,
    },
    Edge {
        id: String,
        source: String,
        target: String,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EditorState {
    #[default]
    Viewing,
    /// Connect mode. `source` is the first node picked, if any.
    ConnectArmed {
        source: Option<String>,
        arrow: ArrowStyle,
    },
    EditingLabel {
        node_id: String,
    },
}

/// User intents reported by a view.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    NodeClick(String),
    NodeDoubleClick(String),
    NodeDrag {
        id: String,
        position: Point,
        size: Option<Size>,
    },
    EdgeClick(String),
    ConnectDrag {
        source: String,
        target: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EditorEvent {
    Loaded { nodes: usize, edges: usize },
    NodeAdded { id: String },
    NodeDeleted { id: String, edges: Vec<String> },
    EdgeAdded { id: String, source: String, target: String },
    EdgeDeleted { id: String },
    LabelChanged { id: String, label: String },
    NodeChanged { id: String },
    Relayout { direction: Direction },
    StyleChanged,
}

/// Everything a view needs to draw the current session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub direction: Direction,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub subgraphs: Vec<Subgraph>,
    pub selection: Option<String>,
    pub state: EditorState,
}

pub struct Editor<H: EditorHost = AcceptAll> {
    graph: Graph,
    layout: LayoutConfig,
    settings: EditorConfig,
    parser: ParserOptions,
    host: H,
    state: EditorState,
    selection: Option<String>,
    node_ids: IdAllocator,
    edge_ids: IdAllocator,
    animation_until: Option<Instant>,
    events: Vec<EditorEvent>,
}

impl Editor<AcceptAll> {
    pub fn with_defaults() -> Self {
        Self::new(AcceptAll, LayoutConfig::default(), EditorConfig::default())
    }
}

impl<H: EditorHost> Editor<H> {
    pub fn new(host: H, layout: LayoutConfig, settings: EditorConfig) -> Self {
        Self {
            graph: Graph::default(),
            layout,
            settings,
            parser: ParserOptions::default(),
            host,
            state: EditorState::Viewing,
            selection: None,
            node_ids: IdAllocator::new("node_"),
            edge_ids: IdAllocator::new("edge_"),
            animation_until: None,
            events: Vec::new(),
        }
    }

    pub fn with_parser_options(mut self, options: ParserOptions) -> Self {
        self.parser = options;
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// Parses `text` and replaces the whole graph with the laid-out result.
    pub fn load_source(&mut self, text: &str) {
        let graph = super::load(text, self.parser, &self.layout);
        self.load_graph(graph);
    }

    /// Replaces the whole graph and resets session state.
    ///
    /// Graphs built elsewhere are repaired first: edges with a missing
    /// endpoint are dropped.
    pub fn load_graph(&mut self, mut graph: Graph) {
        for edge in graph.repair() {
            debug!(
                edge = %edge.id,
                source = %edge.source,
                target = %edge.target,
                "load_graph: dropping edge with missing endpoint"
            );
        }
        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            direction = %graph.direction,
            "editor graph replaced"
        );
        self.events.push(EditorEvent::Loaded {
            nodes: graph.nodes.len(),
            edges: graph.edges.len(),
        });
        self.graph = graph;
        self.state = EditorState::Viewing;
        self.selection = None;
        self.animation_until = None;
        self.node_ids = IdAllocator::new("node_");
        self.edge_ids = IdAllocator::new("edge_");
    }

    /// Adds a node with the defaults for `kind`. Does not relayout.
    pub fn add_node(&mut self, kind: NodeKind) -> String {
        let graph = &self.graph;
        let id = self.node_ids.next_id(|candidate| graph.contains_node(candidate));

        let shape = kind.default_shape();
        let mut node = Node::new(id.clone(), kind.default_label(), shape, self.layout.size_for(shape));
        node.kind = kind;
        let step = self.graph.nodes.len() as f32 * self.settings.cascade_offset;
        node.position = Point::new(self.layout.margin + step, self.layout.margin + step);

        self.graph.insert_node(node);
        self.events.push(EditorEvent::NodeAdded { id: id.clone() });
        id
    }

    /// Deletes a node and every edge touching it, after host confirmation.
    pub fn delete_node(&mut self, id: &str) -> bool {
        let Some(node) = self.graph.node(id) else {
            debug!(node = id, "delete_node: unknown node");
            return false;
        };

        let request = DeleteRequest::Node {
            id: id.to_string(),
            label: node.label.clone(),
            edges: self
                .graph
                .edges
                .iter()
                .filter(|e| e.touches(id))
                .map(|e| e.id.clone())
                .collect(),
        };
        if !self.host.confirm_delete(&request) {
            debug!(node = id, "delete_node: not confirmed");
            return false;
        }

        let Some((_, removed)) = self.graph.remove_node(id) else {
            return false;
        };
        self.forget_node(id);
        self.events.push(EditorEvent::NodeDeleted {
            id: id.to_string(),
            edges: removed.into_iter().map(|e| e.id).collect(),
        });
        true
    }

    /// Deletes exactly one edge, after host confirmation.
    pub fn delete_edge(&mut self, id: &str) -> bool {
        let Some(edge) = self.graph.edge(id) else {
            debug!(edge = id, "delete_edge: unknown edge");
            return false;
        };

        let request = DeleteRequest::Edge {
            id: id.to_string(),
            source: edge.source.clone(),
            target: edge.target.clone(),
        };
        if !self.host.confirm_delete(&request) {
            debug!(edge = id, "delete_edge: not confirmed");
            return false;
        }

        if self.graph.remove_edge(id).is_none() {
            return false;
        }
        self.events.push(EditorEvent::EdgeDeleted { id: id.to_string() });
        true
    }

    /// Appends an edge between two existing nodes.
    ///
    /// Parallel edges are kept: connecting the same pair twice yields two
    /// edges.
    pub fn connect(&mut self, source: &str, target: &str, arrow: ArrowStyle) -> Option<String> {
        if !self.graph.contains_node(source) || !self.graph.contains_node(target) {
            debug!(source, target, "connect: unknown endpoint");
            return None;
        }
        if self
            .graph
            .edges
            .iter()
            .any(|e| e.source == source && e.target == target)
        {
            debug!(source, target, "connect: adding parallel edge");
        }

        let graph = &self.graph;
        let id = self.edge_ids.next_id(|candidate| graph.contains_edge(candidate));
        let mut edge = Edge::new(id.clone(), source, target);
        edge.arrow = arrow;

        self.graph.edges.push(edge);
        self.events.push(EditorEvent::EdgeAdded {
            id: id.clone(),
            source: source.to_string(),
            target: target.to_string(),
        });
        Some(id)
    }

    /// Changes a node's label. Id and position are untouched.
    pub fn edit_label(&mut self, node_id: &str, text: &str) -> bool {
        let Some(node) = self.graph.node_mut(node_id) else {
            debug!(node = node_id, "edit_label: unknown node");
            return false;
        };
        node.label = text.to_string();
        self.events.push(EditorEvent::LabelChanged {
            id: node_id.to_string(),
            label: text.to_string(),
        });
        true
    }

    pub fn set_edge_label(&mut self, edge_id: &str, label: Option<&str>) -> bool {
        let Some(edge) = self.graph.edge_mut(edge_id) else {
            debug!(edge = edge_id, "set_edge_label: unknown edge");
            return false;
        };
        edge.label = label.map(str::to_string).filter(|l| !l.is_empty());
        true
    }

    /// Changes a node's kind, which also resets its shape and size.
    pub fn set_node_kind(&mut self, node_id: &str, kind: NodeKind) -> bool {
        let size = self.layout.size_for(kind.default_shape());
        let Some(node) = self.graph.node_mut(node_id) else {
            debug!(node = node_id, "set_node_kind: unknown node");
            return false;
        };
        node.kind = kind;
        node.shape = kind.default_shape();
        node.size = size;
        self.clear_waypoints(node_id);
        self.events.push(EditorEvent::NodeChanged {
            id: node_id.to_string(),
        });
        true
    }

    pub fn move_node(&mut self, node_id: &str, position: Point) -> bool {
        if !position.x.is_finite() || !position.y.is_finite() {
            debug!(node = node_id, "move_node: non-finite position");
            return false;
        }
        let Some(node) = self.graph.node_mut(node_id) else {
            debug!(node = node_id, "move_node: unknown node");
            return false;
        };
        node.position = position;
        self.clear_waypoints(node_id);
        self.events.push(EditorEvent::NodeChanged {
            id: node_id.to_string(),
        });
        true
    }

    pub fn resize_node(&mut self, node_id: &str, size: Size) -> bool {
        let usable = |v: f32| v.is_finite() && v > 0.0;
        if !usable(size.width) || !usable(size.height) {
            debug!(node = node_id, "resize_node: unusable size");
            return false;
        }
        let Some(node) = self.graph.node_mut(node_id) else {
            debug!(node = node_id, "resize_node: unknown node");
            return false;
        };
        node.size = size;
        self.events.push(EditorEvent::NodeChanged {
            id: node_id.to_string(),
        });
        true
    }

    pub fn relayout(&mut self, direction: Direction) {
        self.relayout_at(direction, Instant::now());
    }

    /// Recomputes every position, then flags edges as animated until the
    /// configured duration has passed. Positions are final on return.
    pub fn relayout_at(&mut self, direction: Direction, now: Instant) {
        self.graph.direction = direction;
        let layout = LayoutEngine::new(&self.layout).layout_graph(&self.graph);
        apply_layout(&mut self.graph, &layout);

        for edge in &mut self.graph.edges {
            edge.animated = true;
        }
        self.animation_until = Some(now + Duration::from_millis(self.settings.animation_ms));

        info!(%direction, nodes = self.graph.nodes.len(), "relayout");
        self.events.push(EditorEvent::Relayout { direction });
    }

    /// Clears expired animation flags. Returns true when flags were cleared.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.animation_until {
            Some(until) if now >= until => {
                for edge in &mut self.graph.edges {
                    edge.animated = false;
                }
                self.animation_until = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_animating(&self) -> bool {
        self.animation_until.is_some()
    }

    /// Sets the same font size and color on every node.
    pub fn apply_font_settings(&mut self, size: f32, color: &str) -> Result<()> {
        if !size.is_finite() || size <= 0.0 {
            return Err(Error::InvalidFontSize(size));
        }
        let color = color.trim();
        if !is_valid_color(color) {
            return Err(Error::InvalidColor(color.to_string()));
        }

        for node in self.graph.nodes.values_mut() {
            node.style.font_size = Some(size);
            node.style.font_color = Some(color.to_string());
        }
        self.events.push(EditorEvent::StyleChanged);
        Ok(())
    }

    pub fn enter_connect_mode(&mut self, arrow: ArrowStyle) {
        self.state = EditorState::ConnectArmed {
            source: None,
            arrow,
        };
        self.selection = None;
    }

    pub fn exit_connect_mode(&mut self) {
        if matches!(self.state, EditorState::ConnectArmed { .. }) {
            self.state = EditorState::Viewing;
            self.selection = None;
        }
    }

    /// Node selection. In connect mode the second distinct node completes
    /// an edge from the first.
    pub fn select_node(&mut self, id: &str) {
        if !self.graph.contains_node(id) {
            debug!(node = id, "select_node: unknown node");
            return;
        }

        match self.state.clone() {
            EditorState::Viewing => self.selection = Some(id.to_string()),
            EditorState::ConnectArmed {
                source: None,
                arrow,
            } => {
                self.state = EditorState::ConnectArmed {
                    source: Some(id.to_string()),
                    arrow,
                };
                self.selection = Some(id.to_string());
            }
            EditorState::ConnectArmed {
                source: Some(source),
                arrow,
            } => {
                if source != id {
                    self.connect(&source, id, arrow);
                }
                self.state = EditorState::ConnectArmed {
                    source: None,
                    arrow,
                };
                self.selection = None;
            }
            EditorState::EditingLabel { .. } => {
                debug!(node = id, "select_node: ignored while editing a label");
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
        if let EditorState::ConnectArmed { source, .. } = &mut self.state {
            *source = None;
        }
    }

    /// Opens a node for label editing and notifies the host.
    pub fn begin_edit(&mut self, node_id: &str) -> bool {
        if !matches!(self.state, EditorState::Viewing) || !self.graph.contains_node(node_id) {
            debug!(node = node_id, "begin_edit: ignored");
            return false;
        }
        self.state = EditorState::EditingLabel {
            node_id: node_id.to_string(),
        };
        self.selection = Some(node_id.to_string());
        self.host.on_request_edit(node_id);
        true
    }

    /// Finishes an edit started with [`Editor::begin_edit`].
    pub fn submit_edit(&mut self, node_id: &str, text: &str) -> bool {
        if !self.is_editing(node_id) {
            debug!(node = node_id, "submit_edit: node is not being edited");
            return false;
        }
        self.state = EditorState::Viewing;
        self.edit_label(node_id, text)
    }

    pub fn cancel_edit(&mut self) {
        if matches!(self.state, EditorState::EditingLabel { .. }) {
            self.state = EditorState::Viewing;
        }
    }

    pub fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::NodeClick(id) => self.select_node(&id),
            Intent::NodeDoubleClick(id) => {
                self.begin_edit(&id);
            }
            Intent::NodeDrag { id, position, size } => {
                self.move_node(&id, position);
                if let Some(size) = size {
                    self.resize_node(&id, size);
                }
            }
            Intent::EdgeClick(id) => {
                self.delete_edge(&id);
            }
            Intent::ConnectDrag { source, target } => {
                let arrow = match &self.state {
                    EditorState::ConnectArmed { arrow, .. } => *arrow,
                    _ => ArrowStyle::Single,
                };
                self.connect(&source, &target, arrow);
            }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            direction: self.graph.direction,
            nodes: self.graph.nodes.values().cloned().collect(),
            edges: self.graph.edges.clone(),
            subgraphs: self.graph.subgraphs.clone(),
            selection: self.selection.clone(),
            state: self.state.clone(),
        }
    }

    pub fn drain_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drops selection and edit state that referenced a deleted node.
    fn forget_node(&mut self, id: &str) {
        if self.selection.as_deref() == Some(id) {
            self.selection = None;
        }
        if self.is_editing(id) {
            self.state = EditorState::Viewing;
        } else if let EditorState::ConnectArmed { source, .. } = &mut self.state {
            if source.as_deref() == Some(id) {
                *source = None;
            }
        }
    }

    /// Bend points stop lining up once an endpoint moves by hand.
    fn clear_waypoints(&mut self, node_id: &str) {
        for edge in self.graph.edges.iter_mut().filter(|e| e.touches(node_id)) {
            edge.waypoints.clear();
        }
    }

    fn is_editing(&self, id: &str) -> bool {
        matches!(&self.state, EditorState::EditingLabel { node_id } if node_id == id)
    }
}

/// Accepts `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa` and plain color names.
fn is_valid_color(color: &str) -> bool {
    match color.strip_prefix('#') {
        Some(hex) => {
            matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => !color.is_empty() && color.chars().all(|c| c.is_ascii_alphabetic()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flowchart::NodeShape;

    const SCENARIO_A: &str = "flowchart TD\nA[Start] --> B[Process]\nB --> C[End]";

    #[derive(Default)]
    struct Recorder {
        refuse: bool,
        edits: Vec<String>,
        requests: Vec<DeleteRequest>,
    }

    impl EditorHost for Recorder {
        fn on_request_edit(&mut self, node_id: &str) {
            self.edits.push(node_id.to_string());
        }

        fn confirm_delete(&mut self, request: &DeleteRequest) -> bool {
            self.requests.push(request.clone());
            !self.refuse
        }
    }

    fn editor(text: &str) -> Editor {
        let mut editor = Editor::with_defaults();
        editor.load_source(text);
        editor
    }

    fn recording(text: &str, refuse: bool) -> Editor<Recorder> {
        let host = Recorder {
            refuse,
            ..Recorder::default()
        };
        let mut editor = Editor::new(host, LayoutConfig::default(), EditorConfig::default());
        editor.load_source(text);
        editor
    }

    #[test]
    fn load_source_lays_out_scenario_a() {
        let editor = editor(SCENARIO_A);
        let graph = editor.graph();
        assert_eq!(graph.nodes["A"].label, "Start");
        assert_eq!(graph.nodes["B"].label, "Process");
        assert_eq!(graph.nodes["C"].label, "End");
        assert!(graph.nodes["A"].position.y < graph.nodes["B"].position.y);
        assert!(graph.nodes["B"].position.y < graph.nodes["C"].position.y);
    }

    #[test]
    fn load_graph_drops_edges_to_missing_nodes() {
        let mut graph = crate::flowchart::load(SCENARIO_A, ParserOptions::default(), &LayoutConfig::default());
        graph.edges.push(Edge::new("stray", "A", "ghost"));

        let mut editor = Editor::with_defaults();
        editor.load_graph(graph);
        assert!(editor.graph().is_consistent());
        assert!(!editor.graph().contains_edge("stray"));
        assert_eq!(editor.graph().edges.len(), 2);
        assert!(matches!(
            editor.drain_events().as_slice(),
            [EditorEvent::Loaded { nodes: 3, edges: 2 }]
        ));
    }

    #[test]
    fn delete_node_cascades_edges() {
        let mut editor = editor(SCENARIO_A);
        assert!(editor.delete_node("B"));
        let graph = editor.graph();
        assert!(graph.edges.is_empty());
        let ids: Vec<&str> = graph.nodes.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["A", "C"]);
    }

    #[test]
    fn refused_confirmation_keeps_everything() {
        let mut editor = recording(SCENARIO_A, true);
        assert!(!editor.delete_node("B"));
        assert!(!editor.delete_edge("e1"));
        assert_eq!(editor.graph().nodes.len(), 3);
        assert_eq!(editor.graph().edges.len(), 2);
        assert_eq!(editor.host().requests.len(), 2);
        match &editor.host().requests[0] {
            DeleteRequest::Node { id, edges, .. } => {
                assert_eq!(id, "B");
                assert_eq!(edges, &vec!["e1".to_string(), "e2".to_string()]);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn delete_edge_removes_exactly_one() {
        let mut editor = editor(SCENARIO_A);
        assert!(editor.delete_edge("e1"));
        assert_eq!(editor.graph().edges.len(), 1);
        assert_eq!(editor.graph().edges[0].id, "e2");
        assert!(!editor.delete_edge("e1"));
    }

    #[test]
    fn connect_keeps_parallel_edges() {
        let mut editor = editor(SCENARIO_A);
        let first = editor.connect("A", "C", ArrowStyle::Single).unwrap();
        let second = editor.connect("A", "C", ArrowStyle::Bidirectional).unwrap();
        assert_ne!(first, second);
        let between: Vec<&Edge> = editor
            .graph()
            .edges
            .iter()
            .filter(|e| e.source == "A" && e.target == "C")
            .collect();
        assert_eq!(between.len(), 2);
        assert_eq!(between[1].arrow, ArrowStyle::Bidirectional);
    }

    #[test]
    fn connect_with_unknown_node_is_noop() {
        let mut editor = editor(SCENARIO_A);
        assert!(editor.connect("A", "Z", ArrowStyle::Single).is_none());
        assert!(editor.connect("Z", "A", ArrowStyle::Single).is_none());
        assert_eq!(editor.graph().edges.len(), 2);
    }

    #[test]
    fn add_node_uses_kind_defaults_and_unique_ids() {
        let mut editor = editor("node_1[Taken]");
        let id = editor.add_node(NodeKind::Decision);
        assert_eq!(id, "node_2");
        let node = editor.graph().nodes[&id].clone();
        assert_eq!(node.label, "Decision");
        assert_eq!(node.shape, NodeShape::Diamond);
        assert_eq!(node.kind, NodeKind::Decision);

        let other = editor.add_node(NodeKind::Start);
        assert_eq!(other, "node_3");
        assert_ne!(editor.graph().nodes[&other].position, node.position);
    }

    #[test]
    fn edit_label_only_touches_label() {
        let mut editor = editor(SCENARIO_A);
        let before = editor.graph().nodes["A"].clone();
        assert!(editor.edit_label("A", "Begin"));
        let after = &editor.graph().nodes["A"];
        assert_eq!(after.label, "Begin");
        assert_eq!(after.id, before.id);
        assert_eq!(after.position, before.position);
        assert!(!editor.edit_label("missing", "x"));
    }

    #[test]
    fn connect_mode_state_machine() {
        let mut editor = editor(SCENARIO_A);
        editor.enter_connect_mode(ArrowStyle::Single);
        editor.handle_intent(Intent::NodeClick("A".to_string()));
        assert_eq!(
            editor.state(),
            &EditorState::ConnectArmed {
                source: Some("A".to_string()),
                arrow: ArrowStyle::Single
            }
        );
        editor.handle_intent(Intent::NodeClick("C".to_string()));
        assert_eq!(
            editor.state(),
            &EditorState::ConnectArmed {
                source: None,
                arrow: ArrowStyle::Single
            }
        );
        assert_eq!(editor.selection(), None);
        assert_eq!(editor.graph().edges.len(), 3);

        editor.select_node("B");
        editor.select_node("B");
        assert_eq!(editor.graph().edges.len(), 3);

        editor.exit_connect_mode();
        assert_eq!(editor.state(), &EditorState::Viewing);
    }

    #[test]
    fn double_click_requests_edit_from_host() {
        let mut editor = recording(SCENARIO_A, false);
        editor.handle_intent(Intent::NodeDoubleClick("B".to_string()));
        assert_eq!(editor.host().edits, vec!["B".to_string()]);
        assert!(!editor.submit_edit("A", "wrong node"));
        assert!(editor.submit_edit("B", "Review"));
        assert_eq!(editor.graph().nodes["B"].label, "Review");
        assert_eq!(editor.state(), &EditorState::Viewing);

        editor.begin_edit("C");
        editor.cancel_edit();
        assert_eq!(editor.state(), &EditorState::Viewing);
        assert_eq!(editor.graph().nodes["C"].label, "End");
    }

    #[test]
    fn deleting_the_node_being_edited_returns_to_viewing() {
        let mut editor = editor(SCENARIO_A);
        editor.begin_edit("B");
        editor.delete_node("B");
        assert_eq!(editor.state(), &EditorState::Viewing);
        assert_eq!(editor.selection(), None);
    }

    #[test]
    fn relayout_animates_until_tick() {
        let mut editor = editor(SCENARIO_A);
        let start = Instant::now();
        editor.relayout_at(Direction::LeftRight, start);
        let graph = editor.graph();
        assert!(graph.edges.iter().all(|e| e.animated));
        assert!(graph.nodes["A"].position.x < graph.nodes["B"].position.x);

        assert!(!editor.tick(start));
        assert!(editor.is_animating());
        assert!(editor.tick(start + Duration::from_secs(5)));
        assert!(editor.graph().edges.iter().all(|e| !e.animated));
    }

    #[test]
    fn new_load_supersedes_animation() {
        let mut editor = editor(SCENARIO_A);
        editor.relayout(Direction::TopBottom);
        editor.load_source("X --> Y");
        assert!(!editor.is_animating());
        assert!(editor.graph().edges.iter().all(|e| !e.animated));
    }

    #[test]
    fn font_settings_are_uniform_and_idempotent() {
        let mut editor = editor(SCENARIO_A);
        editor.apply_font_settings(18.0, "#112233").unwrap();
        let once = editor.graph().clone();
        editor.apply_font_settings(18.0, "#112233").unwrap();
        assert_eq!(editor.graph(), &once);
        assert!(
            once.nodes
                .values()
                .all(|n| n.style.font_size == Some(18.0) && n.style.font_color.as_deref() == Some("#112233"))
        );
    }

    #[test]
    fn font_settings_reject_misuse() {
        let mut editor = editor(SCENARIO_A);
        assert!(matches!(
            editor.apply_font_settings(0.0, "red"),
            Err(Error::InvalidFontSize(_))
        ));
        assert!(matches!(
            editor.apply_font_settings(12.0, "#12"),
            Err(Error::InvalidColor(_))
        ));
    }

    #[test]
    fn drag_moves_and_resizes() {
        let mut editor = editor(SCENARIO_A);
        editor.handle_intent(Intent::NodeDrag {
            id: "A".to_string(),
            position: Point::new(500.0, 20.0),
            size: Some(Size::new(200.0, 80.0)),
        });
        let node = &editor.graph().nodes["A"];
        assert_eq!(node.position, Point::new(500.0, 20.0));
        assert_eq!(node.size, Size::new(200.0, 80.0));
    }

    #[test]
    fn moving_an_endpoint_drops_stale_bend_points() {
        let mut editor = editor("A --> B\nB --> C\nA --> C");
        assert_eq!(editor.graph().edges[2].waypoints.len(), 1);
        assert!(editor.move_node("C", Point::new(400.0, 40.0)));
        assert!(editor.graph().edges[2].waypoints.is_empty());

        editor.relayout(Direction::TopBottom);
        assert_eq!(editor.graph().edges[2].waypoints.len(), 1);
    }

    #[test]
    fn set_node_kind_changes_shape() {
        let mut editor = editor("A --> B{Check}");
        assert_eq!(editor.graph().nodes["B"].shape, NodeShape::Rectangle);
        editor.set_node_kind("B", NodeKind::Decision);
        assert_eq!(editor.graph().nodes["B"].shape, NodeShape::Diamond);
        assert_eq!(editor.graph().nodes["B"].label, "Check");
    }

    #[test]
    fn events_are_recorded_in_order() {
        let mut editor = editor(SCENARIO_A);
        editor.drain_events();
        let id = editor.add_node(NodeKind::Process);
        editor.connect("A", &id, ArrowStyle::Single);
        editor.delete_node(&id);
        let events = editor.drain_events();
        assert!(matches!(events[0], EditorEvent::NodeAdded { .. }));
        assert!(matches!(events[1], EditorEvent::EdgeAdded { .. }));
        match &events[2] {
            EditorEvent::NodeDeleted { edges, .. } => assert_eq!(edges.len(), 1),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(editor.drain_events().is_empty());
    }

    #[test]
    fn snapshot_serializes() {
        let editor = editor(SCENARIO_A);
        let json = serde_json::to_value(editor.snapshot()).unwrap();
        assert_eq!(json["direction"], "TB");
        assert_eq!(json["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(json["state"]["mode"], "viewing");
        assert_eq!(json["edges"][0]["arrow"], "single");
    }

    #[test]
    fn color_validation() {
        assert!(is_valid_color("#fff"));
        assert!(is_valid_color("#A0b1C2"));
        assert!(is_valid_color("steelblue"));
        assert!(!is_valid_color(""));
        assert!(!is_valid_color("#ggg"));
        assert!(!is_valid_color("rgb(1,2,3)"));
    }
}
