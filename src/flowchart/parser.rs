use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::{Captures, Regex};
use tracing::debug;

use super::preprocess::subgraph_header;
use super::types::{ArrowStyle, Direction, NodeShape, Subgraph};

/// Bracket pair a node label was declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bracket {
    Square,
    Curly,
    Round,
}

/// A node as seen by the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDecl {
    pub id: String,
    pub label: String,
    pub shape: NodeShape,
    /// `None` when the node was only referenced through an edge.
    pub bracket: Option<Bracket>,
}

impl NodeDecl {
    fn implicit(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
            shape: NodeShape::Rectangle,
            bracket: None,
        }
    }

    pub fn is_explicit(&self) -> bool {
        self.bracket.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEdge {
    pub source: String,
    pub target: String,
    pub label: Option<String>,
    pub arrow: ArrowStyle,
}

/// A `style <id> key:value,...` line. Layout-inert.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDirective {
    pub node_id: String,
    pub properties: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFlowchart {
    pub direction: Direction,
    pub nodes: IndexMap<String, NodeDecl>,
    pub edges: Vec<ParsedEdge>,
    pub styles: Vec<StyleDirective>,
    pub subgraphs: Vec<Subgraph>,
    /// 1-based numbers of lines no rule could classify.
    pub dropped: Vec<usize>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParserOptions {
    /// Map `{label}` declarations to diamonds. Off by default: shape is
    /// normally chosen in the editor, not in the text.
    pub infer_shapes: bool,
}

struct ParseState {
    options: ParserOptions,
    out: ParsedFlowchart,
    open_groups: Vec<Subgraph>,
}

impl ParseState {
    fn reference(&mut self, id: &str) {
        if !self.out.nodes.contains_key(id) {
            self.out.nodes.insert(id.to_string(), NodeDecl::implicit(id));
        }
        self.note_membership(id);
    }

    fn declare(&mut self, id: &str, decl: &str) {
        let (bracket, label) = split_decl(decl);
        let shape = if self.options.infer_shapes && bracket == Bracket::Curly {
            NodeShape::Diamond
        } else {
            NodeShape::Rectangle
        };

        let entry = self
            .out
            .nodes
            .entry(id.to_string())
            .or_insert_with(|| NodeDecl::implicit(id));
        entry.label = label;
        entry.shape = shape;
        entry.bracket = Some(bracket);
        self.note_membership(id);
    }

    fn note_membership(&mut self, id: &str) {
        if let Some(group) = self.open_groups.last_mut() {
            if !group.nodes.iter().any(|n| n == id) {
                group.nodes.push(id.to_string());
            }
        }
    }

    fn finish(mut self) -> ParsedFlowchart {
        // Unterminated groups still contribute their members.
        while let Some(group) = self.open_groups.pop() {
            self.out.subgraphs.push(group);
        }
        self.out
    }
}

type Handler = fn(&Captures<'_>, &mut ParseState);

struct LineRule {
    name: &'static str,
    pattern: Regex,
    handler: Handler,
}

impl LineRule {
    fn new(name: &'static str, pattern: &str, handler: Handler) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("built-in line pattern must compile"),
            handler,
        }
    }
}

const DECL: &str = r"\[[^\]]*\]|\{[^}]*\}|\([^)]*\)";

/// Line rules in priority order; the first match wins.
static RULES: LazyLock<Vec<LineRule>> = LazyLock::new(|| {
    vec![
        LineRule::new("blank", r"^$", |_, _| {}),
        LineRule::new("comment", r"^%", |_, _| {}),
        LineRule::new(
            "header",
            r"^(?:flowchart|graph)(?:\s+(?P<dir>\S+))?\s*;?$",
            on_header,
        ),
        LineRule::new(
            "style",
            r"^style\s+(?P<id>\w+)(?:\s+(?P<props>.*))?$",
            on_style,
        ),
        LineRule::new("style-other", r"^style", on_ignored_keyword),
        LineRule::new("subgraph", r"^subgraph(?:\s+(?P<title>.*))?$", on_subgraph),
        LineRule::new("subgraph-other", r"^subgraph", on_ignored_keyword),
        LineRule::new("end", r"^end\s*;?$", on_end),
        LineRule::new(
            "edge",
            &format!(
                concat!(
                    r"^(?P<src>\w+)\s*(?P<src_decl>{decl})?\s*",
                    r"(?P<lt><)?(?:-\.+-*|-+|=+)",
                    r"(?:\s*(?P<inline>[^-=.|>\s][^>|]*?)\s*(?:-+|=+))?",
                    r"(?P<head>>)?\s*(?:\|(?P<pipe>[^|]*)\|)?\s*",
                    r"(?P<dst>\w+)\s*(?P<dst_decl>{decl})?\s*;?$"
                ),
                decl = DECL
            ),
            on_edge,
        ),
        LineRule::new(
            "node",
            &format!(r"^(?P<id>\w+)\s*(?P<decl>{})\s*;?$", DECL),
            on_node,
        ),
        LineRule::new("bare-node", r"^(?P<id>\w+)\s*;?$", on_bare_node),
    ]
});

/// Parse normalized flowchart text with default options.
pub fn parse(normalized: &str) -> ParsedFlowchart {
    parse_with(normalized, ParserOptions::default())
}

/// Parse normalized flowchart text.
///
/// Total over arbitrary input: lines that match no rule are recorded in
/// [`ParsedFlowchart::dropped`] and otherwise ignored.
pub fn parse_with(normalized: &str, options: ParserOptions) -> ParsedFlowchart {
    let mut state = ParseState {
        options,
        out: ParsedFlowchart::default(),
        open_groups: Vec::new(),
    };

    for (index, raw) in normalized.lines().enumerate() {
        let line = raw.trim();
        let matched = RULES
            .iter()
            .find_map(|rule| rule.pattern.captures(line).map(|caps| (rule, caps)));

        match matched {
            Some((rule, caps)) => (rule.handler)(&caps, &mut state),
            None => {
                debug!(line = index + 1, text = line, "dropping unrecognized flowchart line");
                state.out.dropped.push(index + 1);
            }
        }
    }

    let parsed = state.finish();
    debug!(
        nodes = parsed.nodes.len(),
        edges = parsed.edges.len(),
        dropped = parsed.dropped.len(),
        rules = RULES.len(),
        "parsed flowchart"
    );
    parsed
}

/// Names of the line rules in evaluation order.
pub fn rule_names() -> Vec<&'static str> {
    RULES.iter().map(|rule| rule.name).collect()
}

fn on_header(caps: &Captures<'_>, state: &mut ParseState) {
    let token = caps.name("dir").map_or("", |m| m.as_str());
    state.out.direction = match token.to_ascii_uppercase().as_str() {
        "LR" | "RL" => Direction::LeftRight,
        "" | "TD" | "TB" | "BT" => Direction::TopBottom,
        other => {
            debug!(direction = other, "unknown flowchart direction, using TB");
            Direction::TopBottom
        }
    };
}

fn on_style(caps: &Captures<'_>, state: &mut ParseState) {
    let node_id = caps["id"].to_string();
    let properties = caps
        .name("props")
        .map_or("", |m| m.as_str())
        .split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once(':')?;
            let key = key.trim();
            let value = value.trim().trim_end_matches(';').trim();
            (!key.is_empty() && !value.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect();

    state.out.styles.push(StyleDirective {
        node_id,
        properties,
    });
}

fn on_ignored_keyword(caps: &Captures<'_>, _: &mut ParseState) {
    debug!(text = &caps[0], "ignoring malformed style/subgraph line");
}

fn on_subgraph(caps: &Captures<'_>, state: &mut ParseState) {
    let (_, title) = subgraph_header(caps.name("title").map_or("", |m| m.as_str()));
    state.open_groups.push(Subgraph {
        title: title.to_string(),
        nodes: Vec::new(),
    });
}

fn on_end(_: &Captures<'_>, state: &mut ParseState) {
    match state.open_groups.pop() {
        Some(group) => state.out.subgraphs.push(group),
        None => debug!("ignoring 'end' without an open subgraph"),
    }
}

fn on_edge(caps: &Captures<'_>, state: &mut ParseState) {
    let source = &caps["src"];
    let target = &caps["dst"];

    state.reference(source);
    if let Some(decl) = caps.name("src_decl") {
        state.declare(source, decl.as_str());
    }
    state.reference(target);
    if let Some(decl) = caps.name("dst_decl") {
        state.declare(target, decl.as_str());
    }

    let label = caps
        .name("pipe")
        .or_else(|| caps.name("inline"))
        .map(|m| unquote(m.as_str()))
        .filter(|l| !l.is_empty());

    let arrow = if caps.name("lt").is_some() && caps.name("head").is_some() {
        ArrowStyle::Bidirectional
    } else {
        ArrowStyle::Single
    };

    state.out.edges.push(ParsedEdge {
        source: source.to_string(),
        target: target.to_string(),
        label,
        arrow,
    });
}

fn on_node(caps: &Captures<'_>, state: &mut ParseState) {
    state.declare(&caps["id"], &caps["decl"]);
}

fn on_bare_node(caps: &Captures<'_>, state: &mut ParseState) {
    state.reference(&caps["id"]);
}

/// Splits `[text]`, `{text}` or `(text)` into its bracket kind and label.
fn split_decl(decl: &str) -> (Bracket, String) {
    let bracket = match decl.chars().next() {
        Some('{') => Bracket::Curly,
        Some('(') => Bracket::Round,
        _ => Bracket::Square,
    };
    let inner = decl.get(1..decl.len().saturating_sub(1)).unwrap_or("");
    (bracket, unquote(inner))
}

fn unquote(text: &str) -> String {
    let text = text.trim();
    let text = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_pairs(parsed: &ParsedFlowchart) -> Vec<(&str, &str)> {
        parsed
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect()
    }

    #[test]
    fn test_parse_simple_flowchart() {
        let parsed = parse("flowchart TD\nA --> B");
        assert_eq!(parsed.nodes.len(), 2);
        assert_eq!(parsed.nodes["A"].label, "A");
        assert_eq!(parsed.nodes["B"].label, "B");
        assert_eq!(edge_pairs(&parsed), vec![("A", "B")]);
        assert_eq!(parsed.edges[0].arrow, ArrowStyle::Single);
        assert!(parsed.dropped.is_empty());
    }

    #[test]
    fn test_parse_labels_and_inline_declarations() {
        let parsed = parse("flowchart TD\nA[Start] --> B[Process]\nB --> C[End]");
        assert_eq!(parsed.nodes["A"].label, "Start");
        assert_eq!(parsed.nodes["B"].label, "Process");
        assert_eq!(parsed.nodes["C"].label, "End");
        assert_eq!(edge_pairs(&parsed), vec![("A", "B"), ("B", "C")]);
    }

    #[test]
    fn test_edge_label_forms() {
        let parsed = parse("flowchart TD\nA --> B{Check}\nB -->|yes| C\nB -- no --> D\nB --maybe--> E");
        let labels: Vec<Option<&str>> = parsed.edges.iter().map(|e| e.label.as_deref()).collect();
        assert_eq!(labels, vec![None, Some("yes"), Some("no"), Some("maybe")]);
        assert_eq!(parsed.nodes["B"].label, "Check");
        assert_eq!(parsed.nodes["B"].shape, NodeShape::Rectangle);
        assert_eq!(parsed.nodes["B"].bracket, Some(Bracket::Curly));
    }

    #[test]
    fn test_dash_runs_and_arrows() {
        let parsed = parse("flowchart LR\nA - B\nB --- C\nC ----> D\nD <--> E\nE-->F;");
        assert_eq!(parsed.direction, Direction::LeftRight);
        assert_eq!(
            edge_pairs(&parsed),
            vec![("A", "B"), ("B", "C"), ("C", "D"), ("D", "E"), ("E", "F")]
        );
        assert_eq!(parsed.edges[3].arrow, ArrowStyle::Bidirectional);
        assert!(parsed.edges[3].label.is_none());
    }

    #[test]
    fn test_dotted_and_thick_links_do_not_become_labels() {
        let parsed = parse("flowchart TD\nA -.-> B\nB ==> C");
        assert_eq!(edge_pairs(&parsed), vec![("A", "B"), ("B", "C")]);
        assert!(parsed.edges.iter().all(|e| e.label.is_none()));
    }

    #[test]
    fn test_last_declaration_wins() {
        let parsed = parse("flowchart TD\nA[First]\nA --> B\nA[\"Second\"]\nB --> A");
        assert_eq!(parsed.nodes["A"].label, "Second");
        assert_eq!(parsed.nodes.len(), 2);
    }

    #[test]
    fn test_implicit_reference_keeps_explicit_label() {
        let parsed = parse("flowchart TD\nB[Process]\nA --> B");
        assert_eq!(parsed.nodes["B"].label, "Process");
        let order: Vec<&str> = parsed.nodes.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["B", "A"]);
    }

    #[test]
    fn test_ignored_lines() {
        let parsed = parse(
            "flowchart TD\n%% comment\n% also comment\nstyle A fill:#f9f,stroke:#333\n\nA --> B",
        );
        assert_eq!(parsed.edges.len(), 1);
        assert!(parsed.dropped.is_empty());
        assert_eq!(parsed.styles.len(), 1);
        assert_eq!(
            parsed.styles[0].properties,
            vec![
                ("fill".to_string(), "#f9f".to_string()),
                ("stroke".to_string(), "#333".to_string())
            ]
        );
    }

    #[test]
    fn test_malformed_lines_are_dropped_without_partial_nodes() {
        let parsed = parse("flowchart TD\nA --> B\n--> orphan\n[[[ nonsense\nX -->\nB --> C");
        assert_eq!(edge_pairs(&parsed), vec![("A", "B"), ("B", "C")]);
        assert_eq!(parsed.dropped, vec![3, 4, 5]);
        assert!(!parsed.nodes.contains_key("X"));
        assert!(!parsed.nodes.contains_key("orphan"));
    }

    #[test]
    fn test_labels_containing_arrows_are_node_declarations() {
        let parsed = parse("flowchart TD\nA[go --> there]");
        assert!(parsed.edges.is_empty());
        assert_eq!(parsed.nodes["A"].label, "go --> there");
    }

    #[test]
    fn test_subgraph_membership_is_flattened() {
        let parsed = parse("flowchart TD\nsubgraph Group One\nA --> B\nend\nB --> C");
        assert_eq!(parsed.nodes.len(), 3);
        assert_eq!(parsed.subgraphs.len(), 1);
        assert_eq!(parsed.subgraphs[0].title, "Group One");
        assert_eq!(parsed.subgraphs[0].nodes, vec!["A", "B"]);
    }

    #[test]
    fn test_subgraph_id_with_bracketed_title() {
        let parsed = parse("flowchart TD\nsubgraph one [Group One]\nA\nend");
        assert_eq!(parsed.subgraphs[0].title, "Group One");
        assert_eq!(parsed.subgraphs[0].nodes, vec!["A"]);
    }

    #[test]
    fn test_keyword_prefixed_lines_never_create_nodes() {
        let parsed = parse("flowchart TD\nstyle\nstyleA --> B\nsubgraphX\nend;\nstyle   \nC --> D");
        let ids: Vec<&str> = parsed.nodes.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["C", "D"]);
        assert_eq!(edge_pairs(&parsed), vec![("C", "D")]);
        assert!(parsed.styles.is_empty());
        assert!(parsed.dropped.is_empty());
    }

    #[test]
    fn test_end_accepts_trailing_semicolon() {
        let parsed = parse("flowchart TD\nsubgraph g\nA\nend;\nB");
        assert_eq!(parsed.subgraphs.len(), 1);
        assert_eq!(parsed.subgraphs[0].nodes, vec!["A"]);
        assert!(!parsed.nodes.contains_key("end"));
    }

    #[test]
    fn test_infer_shapes_is_opt_in() {
        let text = "flowchart TD\nA{Check}";
        assert_eq!(parse(text).nodes["A"].shape, NodeShape::Rectangle);
        let inferred = parse_with(text, ParserOptions { infer_shapes: true });
        assert_eq!(inferred.nodes["A"].shape, NodeShape::Diamond);
    }

    #[test]
    fn test_flowchart_cycle() {
        let parsed = parse("flowchart TD\nA --> B\nB --> C\nC --> A");
        assert_eq!(parsed.nodes.len(), 3);
        assert_eq!(parsed.edges.len(), 3);
    }

    #[test]
    fn test_direction_tokens() {
        assert_eq!(parse("graph RL").direction, Direction::LeftRight);
        assert_eq!(parse("graph BT").direction, Direction::TopBottom);
        assert_eq!(parse("flowchart").direction, Direction::TopBottom);
        assert_eq!(parse("flowchart ZZ").direction, Direction::TopBottom);
    }

    #[test]
    fn test_rule_order() {
        let names = rule_names();
        let edge = names.iter().position(|n| *n == "edge").unwrap();
        let node = names.iter().position(|n| *n == "node").unwrap();
        assert!(edge < node);
        assert_eq!(names[0], "blank");
    }
}
