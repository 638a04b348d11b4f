use super::layout::BBox;
use super::types::{ArrowStyle, Direction, Edge, Graph, Node, NodeShape, Point, Subgraph};
use crate::theme::{Theme, parse_hex_rgb};

const EMPTY_WIDTH: f32 = 100.0;
const EMPTY_HEIGHT: f32 = 50.0;
const SUBGRAPH_PADDING: f32 = 15.0;
const SUBGRAPH_TITLE: f32 = 20.0;

/// Colors and fonts for drawing a flowchart.
#[derive(Debug, Clone)]
pub struct DiagramStyle {
    pub node_fill: String,
    pub node_stroke: String,
    pub node_text: String,
    pub edge_stroke: String,
    pub edge_text: String,
    pub background: String,
    pub selection: String,
    pub font_family: String,
    pub font_size: f32,
    pub padding: f32,
}

impl Default for DiagramStyle {
    fn default() -> Self {
        Self {
            node_fill: "#f5f5f5".to_string(),
            node_stroke: "#333333".to_string(),
            node_text: "#333333".to_string(),
            edge_stroke: "#333333".to_string(),
            edge_text: "#666666".to_string(),
            background: "#ffffff".to_string(),
            selection: "#0969da".to_string(),
            font_family: "sans-serif".to_string(),
            font_size: 14.0,
            padding: 20.0,
        }
    }
}

impl DiagramStyle {
    pub fn from_theme(theme: &Theme) -> Self {
        let diagram_fg =
            pick_higher_contrast(&theme.node_fill_color, &theme.text_color, &theme.background_color);
        let label_fg =
            pick_higher_contrast(&theme.background_color, &theme.text_color, &theme.node_fill_color);

        Self {
            node_fill: theme.node_fill_color.clone(),
            node_stroke: diagram_fg.clone(),
            node_text: diagram_fg.clone(),
            edge_stroke: diagram_fg,
            edge_text: label_fg,
            background: theme.background_color.clone(),
            selection: theme.selection_color.clone(),
            font_family: theme.font_family.clone(),
            font_size: 14.0,
            padding: 20.0,
        }
    }
}

fn relative_luminance(color: (f32, f32, f32)) -> f32 {
    let linear = |v: f32| {
        if v <= 0.03928 {
            v / 12.92
        } else {
            ((v + 0.055) / 1.055).powf(2.4)
        }
    };

    let (r, g, b) = color;
    0.2126 * linear(r) + 0.7152 * linear(g) + 0.0722 * linear(b)
}

pub(crate) fn contrast_ratio(a: &str, b: &str) -> Option<f32> {
    let l1 = relative_luminance(parse_hex_rgb(a)?);
    let l2 = relative_luminance(parse_hex_rgb(b)?);
    let (hi, lo) = if l1 >= l2 { (l1, l2) } else { (l2, l1) };
    Some((hi + 0.05) / (lo + 0.05))
}

fn pick_higher_contrast(base: &str, primary: &str, secondary: &str) -> String {
    let p = contrast_ratio(base, primary).unwrap_or(0.0);
    let s = contrast_ratio(base, secondary).unwrap_or(0.0);

    if s > p {
        secondary.to_string()
    } else {
        primary.to_string()
    }
}

pub fn escape_xml(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars().filter(|&c| is_valid_xml_char(c)) {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// XML 1.0 `Char` production; anything else makes the document unparsable.
fn is_valid_xml_char(c: char) -> bool {
    matches!(
        c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF
    )
}

/// Renders a laid-out graph as a standalone SVG document.
///
/// `selection` gets an outline. Animated edges are drawn dashed with a
/// moving dash offset.
pub fn render_svg(graph: &Graph, style: &DiagramStyle, selection: Option<&str>) -> String {
    let (body, bbox) = render_body(graph, style, selection);
    let width = bbox.width.max(1.0);
    let height = bbox.height.max(1.0);

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{:.2}" height="{:.2}" viewBox="{:.2} {:.2} {:.2} {:.2}">"#,
        width, height, bbox.x, bbox.y, width, height
    ));
    svg.push_str(&format!(
        r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" />"#,
        bbox.x,
        bbox.y,
        width,
        height,
        escape_xml(&style.background)
    ));
    svg.push_str(&body);
    svg.push_str("</svg>");
    svg
}

fn render_body(graph: &Graph, style: &DiagramStyle, selection: Option<&str>) -> (String, BBox) {
    if graph.is_empty() {
        return (String::new(), BBox::new(0.0, 0.0, EMPTY_WIDTH, EMPTY_HEIGHT));
    }

    let mut svg = String::new();

    // Group boxes sit behind everything else.
    let mut group_boxes = Vec::new();
    for subgraph in &graph.subgraphs {
        if let Some(frame) = subgraph_frame(graph, subgraph) {
            svg.push_str(&render_subgraph(subgraph, &frame, style));
            group_boxes.push(frame);
        }
    }

    for edge in &graph.edges {
        if let (Some(from), Some(to)) = (graph.node(&edge.source), graph.node(&edge.target)) {
            svg.push_str(&render_edge(edge, from, to, style, graph.direction));
        }
    }

    for node in graph.nodes.values() {
        svg.push_str(&render_node(node, style, selection == Some(node.id.as_str())));
    }

    let mut bbox = BBox::around(graph.nodes.values());
    let bends = graph.edges.iter().flat_map(|e| e.waypoints.iter());
    for frame in group_boxes
        .into_iter()
        .chain(bends.map(|p| BBox::new(p.x, p.y, 0.0, 0.0)))
    {
        let left = bbox.x.min(frame.x);
        let top = bbox.y.min(frame.y);
        let right = bbox.right().max(frame.right());
        let bottom = bbox.bottom().max(frame.bottom());
        bbox = BBox::new(left, top, right - left, bottom - top);
    }

    (svg, bbox.with_padding(style.padding))
}

fn render_node(node: &Node, style: &DiagramStyle, selected: bool) -> String {
    let mut svg = String::new();
    let fill = node.style.fill.as_deref().unwrap_or(&style.node_fill);
    let stroke = node.style.stroke.as_deref().unwrap_or(&style.node_stroke);
    let (stroke, stroke_width) = if selected {
        (style.selection.as_str(), 3.0)
    } else {
        (stroke, 1.5)
    };
    let Node { position: pos, size, .. } = node;

    svg.push_str(&format!(r#"<g class="node" data-id="{}">"#, escape_xml(&node.id)));
    match node.shape {
        NodeShape::Rectangle => {
            let rx = 8.0_f32.min(size.height / 4.0);
            svg.push_str(&format!(
                r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" rx="{:.2}" fill="{}" stroke="{}" stroke-width="{:.1}" />"#,
                pos.x, pos.y, size.width, size.height, rx,
                escape_xml(fill), escape_xml(stroke), stroke_width
            ));
        }
        NodeShape::Diamond => {
            let center = node.center();
            svg.push_str(&format!(
                r#"<polygon points="{:.2},{:.2} {:.2},{:.2} {:.2},{:.2} {:.2},{:.2}" fill="{}" stroke="{}" stroke-width="{:.1}" />"#,
                center.x, pos.y,
                pos.x + size.width, center.y,
                center.x, pos.y + size.height,
                pos.x, center.y,
                escape_xml(fill), escape_xml(stroke), stroke_width
            ));
        }
    }

    let font_size = node.style.font_size.unwrap_or(style.font_size);
    let text_color = node.style.font_color.as_deref().unwrap_or(&style.node_text);
    let center = node.center();

    let escaped_label = escape_xml(&node.label);
    let lines: Vec<&str> = escaped_label.lines().collect();
    let line_height = font_size * 1.2;
    let total_height = line_height * lines.len() as f32;
    let start_y = center.y + font_size / 3.0 - total_height / 2.0 + line_height / 2.0;

    for (i, line) in lines.iter().enumerate() {
        svg.push_str(&format!(
            r#"<text x="{:.2}" y="{:.2}" font-family="{}" font-size="{:.1}" fill="{}" text-anchor="middle">{}</text>"#,
            center.x,
            start_y + i as f32 * line_height,
            escape_xml(&style.font_family),
            font_size,
            escape_xml(text_color),
            line
        ));
    }
    svg.push_str("</g>");

    svg
}

/// Endpoints on the facing sides of two nodes.
fn connection_points(from: &Node, to: &Node, direction: Direction) -> (f32, f32, f32, f32) {
    let a = from.center();
    let b = to.center();

    if direction.is_vertical() {
        if b.y >= a.y {
            (a.x, from.position.y + from.size.height, b.x, to.position.y)
        } else {
            (a.x, from.position.y, b.x, to.position.y + to.size.height)
        }
    } else if b.x >= a.x {
        (from.position.x + from.size.width, a.y, to.position.x, b.y)
    } else {
        (from.position.x, a.y, to.position.x + to.size.width, b.y)
    }
}

fn render_edge(edge: &Edge, from: &Node, to: &Node, style: &DiagramStyle, direction: Direction) -> String {
    let mut svg = String::new();
    let stroke = edge.style.stroke.as_deref().unwrap_or(&style.edge_stroke);
    let stroke = escape_xml(stroke);

    svg.push_str(&format!(r#"<g class="edge" data-id="{}">"#, escape_xml(&edge.id)));

    if edge.is_self_loop() {
        svg.push_str(&render_self_loop(edge, from, &stroke));
        svg.push_str("</g>");
        return svg;
    }

    let (x1, y1, x2, y2) = connection_points(from, to, direction);
    let dash_attr = if edge.animated {
        r#" stroke-dasharray="6,4"><animate attributeName="stroke-dashoffset" from="20" to="0" dur="0.8s" repeatCount="indefinite" /></path>"#
    } else {
        " />"
    };

    // Long edges pass through their bend points, one curve per rank gap.
    let mut points = Vec::with_capacity(edge.waypoints.len() + 2);
    points.push(Point::new(x1, y1));
    points.extend(edge.waypoints.iter().copied());
    points.push(Point::new(x2, y2));

    let mut d = format!("M {:.2} {:.2}", x1, y1);
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let (c1, c2) = if direction.is_vertical() {
            let my = (a.y + b.y) / 2.0;
            (Point::new(a.x, my), Point::new(b.x, my))
        } else {
            let mx = (a.x + b.x) / 2.0;
            (Point::new(mx, a.y), Point::new(mx, b.y))
        };
        d.push_str(&format!(
            " C {:.2} {:.2}, {:.2} {:.2}, {:.2} {:.2}",
            c1.x, c1.y, c2.x, c2.y, b.x, b.y
        ));
    }
    svg.push_str(&format!(
        r#"<path d="{}" fill="none" stroke="{}" stroke-width="1.5"{}"#,
        d, stroke, dash_attr
    ));

    let (mx, my) = match edge.waypoints.get(edge.waypoints.len() / 2) {
        Some(p) => (p.x, p.y),
        None => ((x1 + x2) / 2.0, (y1 + y2) / 2.0),
    };

    // Curves leave and enter along the rank axis.
    let before_end = points[points.len() - 2];
    let angle = if direction.is_vertical() {
        if y2 >= before_end.y { std::f32::consts::FRAC_PI_2 } else { -std::f32::consts::FRAC_PI_2 }
    } else if x2 >= before_end.x {
        0.0
    } else {
        std::f32::consts::PI
    };
    svg.push_str(&render_arrow_head(x2, y2, angle, &stroke));
    if edge.arrow == ArrowStyle::Bidirectional {
        svg.push_str(&render_arrow_head(x1, y1, angle + std::f32::consts::PI, &stroke));
    }

    if let Some(label) = &edge.label {
        svg.push_str(&render_edge_label(label, mx, my, style));
    }

    svg.push_str("</g>");
    svg
}

fn render_self_loop(edge: &Edge, node: &Node, stroke: &str) -> String {
    let right = node.position.x + node.size.width;
    let top = node.position.y + node.size.height * 0.25;
    let bottom = node.position.y + node.size.height * 0.75;
    let reach = 30.0;

    let mut svg = format!(
        r#"<path d="M {:.2} {:.2} C {:.2} {:.2}, {:.2} {:.2}, {:.2} {:.2}" fill="none" stroke="{}" stroke-width="1.5" />"#,
        right, top, right + reach, top, right + reach, bottom, right, bottom, stroke
    );
    svg.push_str(&render_arrow_head(right, bottom, std::f32::consts::PI, stroke));
    if edge.arrow == ArrowStyle::Bidirectional {
        svg.push_str(&render_arrow_head(right, top, std::f32::consts::PI, stroke));
    }
    svg
}

fn render_arrow_head(x: f32, y: f32, angle: f32, stroke: &str) -> String {
    let cos = angle.cos();
    let sin = angle.sin();
    let p1 = (x - cos * 12.0 + sin * 6.0, y - sin * 12.0 - cos * 6.0);
    let p2 = (x - cos * 12.0 - sin * 6.0, y - sin * 12.0 + cos * 6.0);
    format!(
        r#"<polygon points="{:.2},{:.2} {:.2},{:.2} {:.2},{:.2}" fill="{}" />"#,
        x, y, p1.0, p1.1, p2.0, p2.1, stroke
    )
}

fn render_edge_label(label: &str, x: f32, y: f32, style: &DiagramStyle) -> String {
    let label_width = label.chars().count() as f32 * 7.0 + 8.0;
    let label_height = style.font_size + 6.0;

    let mut svg = format!(
        r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" rx="2" fill="{}" />"#,
        x - label_width / 2.0,
        y - label_height / 2.0,
        label_width,
        label_height,
        escape_xml(&style.background)
    );
    svg.push_str(&format!(
        r#"<text x="{:.2}" y="{:.2}" font-family="{}" font-size="{:.1}" fill="{}" text-anchor="middle">{}</text>"#,
        x,
        y + style.font_size / 3.0,
        escape_xml(&style.font_family),
        style.font_size * 0.85,
        escape_xml(&style.edge_text),
        escape_xml(label)
    ));
    svg
}

/// Padded box around a subgraph's members, with room for the title.
fn subgraph_frame(graph: &Graph, subgraph: &Subgraph) -> Option<BBox> {
    let members: Vec<&Node> = subgraph.nodes.iter().filter_map(|id| graph.node(id)).collect();
    if members.is_empty() {
        return None;
    }
    let padded = BBox::around(members).with_padding(SUBGRAPH_PADDING);
    Some(BBox::new(
        padded.x,
        padded.y - SUBGRAPH_TITLE,
        padded.width,
        padded.height + SUBGRAPH_TITLE,
    ))
}

fn render_subgraph(subgraph: &Subgraph, frame: &BBox, style: &DiagramStyle) -> String {
    let mut svg = String::new();
    svg.push_str(r#"<g class="subgraph">"#);
    svg.push_str(&format!(
        r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" rx="8" fill="{}" fill-opacity="0.3" stroke="{}" stroke-width="1" stroke-dasharray="4,2" />"#,
        frame.x,
        frame.y,
        frame.width,
        frame.height,
        escape_xml(&style.node_fill),
        escape_xml(&style.node_stroke)
    ));

    if !subgraph.title.is_empty() {
        svg.push_str(&format!(
            r#"<text x="{:.2}" y="{:.2}" font-family="{}" font-size="{:.1}" fill="{}" font-weight="bold" text-anchor="middle">{}</text>"#,
            frame.x + frame.width / 2.0,
            frame.y + SUBGRAPH_TITLE / 2.0 + style.font_size * 0.3,
            escape_xml(&style.font_family),
            style.font_size * 0.9,
            escape_xml(&style.node_text),
            escape_xml(&subgraph.title)
        ));
    }

    svg.push_str("</g>");
    svg
}
