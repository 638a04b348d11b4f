use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use tracing::debug;

use super::types::{Direction, Edge, Graph, Node, Point, Size};
use crate::config::LayoutConfig;

/// Alternating median alignment passes after ordering.
const ALIGN_PASSES: usize = 4;

/// Bounding box for layout elements
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn with_padding(&self, padding: f32) -> Self {
        Self::new(
            self.x - padding,
            self.y - padding,
            self.width + padding * 2.0,
            self.height + padding * 2.0,
        )
    }

    /// Smallest box containing every node.
    pub fn around<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        Self::enclosing(nodes.into_iter().map(|n| (n.position, n.size)))
    }

    fn enclosing(rects: impl IntoIterator<Item = (Point, Size)>) -> Self {
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        let mut any = false;

        for (origin, size) in rects {
            any = true;
            min_x = min_x.min(origin.x);
            min_y = min_y.min(origin.y);
            max_x = max_x.max(origin.x + size.width);
            max_y = max_y.max(origin.y + size.height);
        }

        if !any {
            return BBox::default();
        }
        BBox::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

/// Result of a layout run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    /// Top-left corner of every node.
    pub positions: IndexMap<String, Point>,
    pub ranks: IndexMap<String, usize>,
    /// Bend points for edges spanning several ranks, keyed by edge id.
    pub waypoints: HashMap<String, Vec<Point>>,
    pub bbox: BBox,
}

impl Layout {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Layered (Sugiyama-style) layout.
pub struct LayoutEngine<'a> {
    config: &'a LayoutConfig,
}

#[derive(Debug, Clone, Copy)]
struct Link {
    edge: usize,
    from: usize,
    to: usize,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(config: &'a LayoutConfig) -> Self {
        Self { config }
    }

    pub fn layout_graph(&self, graph: &Graph) -> Layout {
        self.layout(&graph.nodes, &graph.edges, graph.direction)
    }

    /// Assign coordinates to `nodes`.
    ///
    /// Self-loops, dangling edges and back edges of cycles take no part in
    /// ranking. Output depends only on the inputs and their order.
    pub fn layout(
        &self,
        nodes: &IndexMap<String, Node>,
        edges: &[Edge],
        direction: Direction,
    ) -> Layout {
        if nodes.is_empty() {
            return Layout::default();
        }

        let index: HashMap<&str, usize> = nodes
            .keys()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let links: Vec<Link> = edges
            .iter()
            .enumerate()
            .filter_map(|(edge, e)| {
                let from = *index.get(e.source.as_str())?;
                let to = *index.get(e.target.as_str())?;
                (from != to).then_some(Link { edge, from, to })
            })
            .collect();

        let back = find_back_links(nodes.len(), &links);
        let forward: Vec<Link> = links
            .iter()
            .zip(&back)
            .filter(|(_, is_back)| !**is_back)
            .map(|(link, _)| *link)
            .collect();
        let ranks = longest_path_ranks(nodes.len(), &forward);

        let sizes: Vec<Size> = nodes.values().map(|n| n.size).collect();
        let mut layered = LayeredGraph::build(&sizes, &ranks, &forward, direction);
        layered.order(self.config.ordering_sweeps);
        let placed = layered.place(self.config);

        let to_point = |(main, cross): (f32, f32)| {
            if direction.is_vertical() {
                Point::new(cross, main)
            } else {
                Point::new(main, cross)
            }
        };

        let mut layout = Layout::default();
        for (i, id) in nodes.keys().enumerate() {
            layout.positions.insert(id.clone(), to_point(placed[i]));
            layout.ranks.insert(id.clone(), ranks[i]);
        }
        layout.bbox = BBox::enclosing(layout.positions.values().copied().zip(sizes.iter().copied()));

        for (edge, dummies) in &layered.chains {
            let points = dummies.iter().map(|&d| to_point(placed[d])).collect();
            layout.waypoints.insert(edges[*edge].id.clone(), points);
        }

        debug!(
            nodes = nodes.len(),
            back_edges = back.iter().filter(|b| **b).count(),
            ranks = layered.layers.len(),
            "computed layered layout"
        );
        layout
    }
}

/// Writes layout positions back into the graph's nodes and bend points
/// into its edges.
pub fn apply_layout(graph: &mut Graph, layout: &Layout) {
    for (id, node) in graph.nodes.iter_mut() {
        if let Some(position) = layout.positions.get(id) {
            node.position = *position;
        }
    }
    for edge in &mut graph.edges {
        edge.waypoints = layout.waypoints.get(&edge.id).cloned().unwrap_or_default();
    }
}

/// Marks links that close a cycle, found by depth-first search from each
/// node in insertion order.
fn find_back_links(count: usize, links: &[Link]) -> Vec<bool> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (i, link) in links.iter().enumerate() {
        outgoing[link.from].push(i);
    }

    let mut mark = vec![Mark::New; count];
    let mut back = vec![false; links.len()];

    for root in 0..count {
        if mark[root] != Mark::New {
            continue;
        }
        mark[root] = Mark::Active;
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let (node, cursor) = *frame;
            if cursor < outgoing[node].len() {
                frame.1 += 1;
                let link = outgoing[node][cursor];
                let next = links[link].to;
                match mark[next] {
                    Mark::New => {
                        mark[next] = Mark::Active;
                        stack.push((next, 0));
                    }
                    Mark::Active => back[link] = true,
                    Mark::Done => {}
                }
            } else {
                mark[node] = Mark::Done;
                stack.pop();
            }
        }
    }

    back
}

/// Longest-path layering over an acyclic link set; sources get rank 0.
fn longest_path_ranks(count: usize, links: &[Link]) -> Vec<usize> {
    let mut indegree = vec![0usize; count];
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); count];
    for link in links {
        indegree[link.to] += 1;
        outgoing[link.from].push(link.to);
    }

    let mut rank = vec![0usize; count];
    let mut queue: VecDeque<usize> = (0..count).filter(|&v| indegree[v] == 0).collect();
    while let Some(v) = queue.pop_front() {
        for &w in &outgoing[v] {
            rank[w] = rank[w].max(rank[v] + 1);
            indegree[w] -= 1;
            if indegree[w] == 0 {
                queue.push_back(w);
            }
        }
    }

    rank
}

#[derive(Debug, Clone, Copy)]
struct Vertex {
    rank: usize,
    /// Extent along the rank axis.
    main: f32,
    /// Extent along the in-rank axis.
    cross: f32,
}

/// Proper layered graph: real nodes first (same indices as the input), then
/// one dummy vertex per intermediate rank of every long edge.
struct LayeredGraph {
    vertices: Vec<Vertex>,
    preds: Vec<Vec<usize>>,
    succs: Vec<Vec<usize>>,
    layers: Vec<Vec<usize>>,
    chains: Vec<(usize, Vec<usize>)>,
}

impl LayeredGraph {
    fn build(sizes: &[Size], ranks: &[usize], links: &[Link], direction: Direction) -> Self {
        let extent = |size: Size| {
            if direction.is_vertical() {
                (size.height, size.width)
            } else {
                (size.width, size.height)
            }
        };

        let mut vertices: Vec<Vertex> = sizes
            .iter()
            .zip(ranks)
            .map(|(size, &rank)| {
                let (main, cross) = extent(*size);
                Vertex { rank, main, cross }
            })
            .collect();

        let mut segments: Vec<(usize, usize)> = Vec::new();
        let mut chains = Vec::new();
        for link in links {
            let mut prev = link.from;
            let mut dummies = Vec::new();
            for rank in ranks[link.from] + 1..ranks[link.to] {
                let dummy = vertices.len();
                vertices.push(Vertex {
                    rank,
                    main: 0.0,
                    cross: 0.0,
                });
                segments.push((prev, dummy));
                dummies.push(dummy);
                prev = dummy;
            }
            segments.push((prev, link.to));
            if !dummies.is_empty() {
                chains.push((link.edge, dummies));
            }
        }

        let mut preds = vec![Vec::new(); vertices.len()];
        let mut succs = vec![Vec::new(); vertices.len()];
        for &(from, to) in &segments {
            succs[from].push(to);
            preds[to].push(from);
        }

        let depth = vertices.iter().map(|v| v.rank).max().unwrap_or(0) + 1;
        let mut layers = vec![Vec::new(); depth];
        for (i, vertex) in vertices.iter().enumerate() {
            layers[vertex.rank].push(i);
        }

        Self {
            vertices,
            preds,
            succs,
            layers,
            chains,
        }
    }

    /// Barycenter sweeps, keeping the ordering with the fewest crossings.
    fn order(&mut self, sweeps: usize) {
        let mut best = self.layers.clone();
        let mut best_crossings = self.crossings();

        for _ in 0..sweeps {
            if best_crossings == 0 {
                break;
            }
            for layer in 1..self.layers.len() {
                self.reorder_layer(layer, layer - 1, true);
            }
            for layer in (0..self.layers.len().saturating_sub(1)).rev() {
                self.reorder_layer(layer, layer + 1, false);
            }

            let crossings = self.crossings();
            if crossings < best_crossings {
                best_crossings = crossings;
                best = self.layers.clone();
            }
        }

        self.layers = best;
    }

    fn reorder_layer(&mut self, layer: usize, fixed: usize, use_preds: bool) {
        let mut fixed_pos: Vec<Option<usize>> = vec![None; self.vertices.len()];
        for (i, &v) in self.layers[fixed].iter().enumerate() {
            fixed_pos[v] = Some(i);
        }

        let neighbors = if use_preds { &self.preds } else { &self.succs };
        let mut keyed: Vec<(f32, usize, usize)> = self.layers[layer]
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let key = barycenter(&neighbors[v], &fixed_pos).unwrap_or(i as f32);
                (key, i, v)
            })
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        self.layers[layer] = keyed.into_iter().map(|(_, _, v)| v).collect();
    }

    fn crossings(&self) -> usize {
        let mut pos = vec![0usize; self.vertices.len()];
        for layer in &self.layers {
            for (i, &v) in layer.iter().enumerate() {
                pos[v] = i;
            }
        }
        let pos = &pos;

        let mut total = 0;
        for pair in self.layers.windows(2) {
            let mut segments: Vec<(usize, usize)> = pair[0]
                .iter()
                .flat_map(|&u| self.succs[u].iter().map(move |&w| (pos[u], pos[w])))
                .collect();
            segments.sort_unstable();

            // Two segments cross when their lower ends are inverted; count
            // inversions with a Fenwick tree over the lower layer.
            let width = pair[1].len();
            let mut tree = vec![0usize; width + 1];
            for (seen, &(_, lower)) in segments.iter().enumerate() {
                let mut at_most = 0;
                let mut i = lower + 1;
                while i > 0 {
                    at_most += tree[i];
                    i &= i - 1;
                }
                total += seen - at_most;

                let mut i = lower + 1;
                while i <= width {
                    tree[i] += 1;
                    i += i & i.wrapping_neg();
                }
            }
        }
        total
    }

    /// Returns (main, cross) top-left coordinates for every vertex.
    fn place(&self, config: &LayoutConfig) -> Vec<(f32, f32)> {
        let count = self.vertices.len();
        let mut main = vec![0.0f32; count];
        let mut cross = vec![0.0f32; count];

        let mut offset = 0.0;
        for layer in &self.layers {
            let band = layer
                .iter()
                .map(|&v| self.vertices[v].main)
                .fold(0.0, f32::max);
            for &v in layer {
                main[v] = offset + (band - self.vertices[v].main) / 2.0;
            }
            offset += band + config.rank_spacing;
        }

        let widths: Vec<f32> = self
            .layers
            .iter()
            .map(|layer| {
                layer.iter().map(|&v| self.vertices[v].cross).sum::<f32>()
                    + config.node_spacing * layer.len().saturating_sub(1) as f32
            })
            .collect();
        let widest = widths.iter().copied().fold(0.0, f32::max);
        for (layer, width) in self.layers.iter().zip(&widths) {
            let mut at = (widest - width) / 2.0;
            for &v in layer {
                cross[v] = at;
                at += self.vertices[v].cross + config.node_spacing;
            }
        }

        for _ in 0..ALIGN_PASSES {
            for layer in 1..self.layers.len() {
                self.align_layer(layer, &self.preds, &mut cross, config.node_spacing);
            }
            for layer in (0..self.layers.len().saturating_sub(1)).rev() {
                self.align_layer(layer, &self.succs, &mut cross, config.node_spacing);
            }
        }

        let min_main = main.iter().copied().fold(f32::MAX, f32::min);
        let min_cross = cross.iter().copied().fold(f32::MAX, f32::min);
        main.iter()
            .zip(&cross)
            .map(|(m, c)| (m - min_main + config.margin, c - min_cross + config.margin))
            .collect()
    }

    /// Centers each vertex on the median of its neighbors, then restores
    /// minimum spacing left to right.
    fn align_layer(&self, layer: usize, neighbors: &[Vec<usize>], cross: &mut [f32], spacing: f32) {
        for &v in &self.layers[layer] {
            let mut centers: Vec<f32> = neighbors[v]
                .iter()
                .map(|&u| cross[u] + self.vertices[u].cross / 2.0)
                .collect();
            if centers.is_empty() {
                continue;
            }
            centers.sort_by(f32::total_cmp);
            let median = centers[centers.len() / 2];
            cross[v] = median - self.vertices[v].cross / 2.0;
        }

        let mut prev_end = f32::NEG_INFINITY;
        for &v in &self.layers[layer] {
            cross[v] = cross[v].max(prev_end + spacing);
            prev_end = cross[v] + self.vertices[v].cross;
        }
    }
}

fn barycenter(neighbors: &[usize], fixed_pos: &[Option<usize>]) -> Option<f32> {
    let mut total = 0.0;
    let mut count = 0.0;
    for &neighbor in neighbors {
        if let Some(pos) = fixed_pos[neighbor] {
            total += pos as f32;
            count += 1.0;
        }
    }

    if count > 0.0 {
        Some(total / count)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flowchart::builder::build;
    use crate::flowchart::parser::parse;
    use crate::flowchart::preprocess::normalize;

    fn graph(text: &str) -> Graph {
        build(parse(&normalize(text)), &LayoutConfig::default())
    }

    fn run(graph: &Graph, direction: Direction) -> Layout {
        let config = LayoutConfig::default();
        LayoutEngine::new(&config).layout(&graph.nodes, &graph.edges, direction)
    }

    #[test]
    fn empty_graph_gives_empty_layout() {
        let layout = run(&Graph::default(), Direction::TopBottom);
        assert!(layout.is_empty());
        assert!(layout.waypoints.is_empty());
    }

    #[test]
    fn chain_ranks_increase_downwards() {
        let g = graph("flowchart TD\nA[Start] --> B[Process]\nB --> C[End]");
        let layout = run(&g, Direction::TopBottom);
        assert_eq!(layout.ranks["A"], 0);
        assert_eq!(layout.ranks["B"], 1);
        assert_eq!(layout.ranks["C"], 2);
        assert!(layout.positions["A"].y < layout.positions["B"].y);
        assert!(layout.positions["B"].y < layout.positions["C"].y);
    }

    #[test]
    fn left_right_swaps_axes() {
        let g = graph("A --> B\nB --> C");
        let layout = run(&g, Direction::LeftRight);
        assert!(layout.positions["A"].x < layout.positions["B"].x);
        assert!(layout.positions["B"].x < layout.positions["C"].x);
        assert_eq!(layout.positions["A"].y, layout.positions["B"].y);
    }

    #[test]
    fn identical_input_gives_identical_coordinates() {
        let g = graph("A --> B\nA --> C\nB --> D\nC --> D\nD --> A\nE");
        assert_eq!(run(&g, Direction::TopBottom), run(&g, Direction::TopBottom));
        assert_eq!(run(&g, Direction::LeftRight), run(&g, Direction::LeftRight));
    }

    #[test]
    fn cycles_and_self_loops_terminate() {
        let g = graph("A --> B\nB --> C\nC --> A\nC --> C");
        let layout = run(&g, Direction::TopBottom);
        assert_eq!(layout.positions.len(), 3);
        assert_eq!(layout.ranks["A"], 0);
        assert_eq!(layout.ranks["C"], 2);
    }

    #[test]
    fn isolated_nodes_still_get_a_rank() {
        let g = graph("A --> B\nLonely[Alone]");
        let layout = run(&g, Direction::TopBottom);
        assert_eq!(layout.ranks["Lonely"], 0);
        assert!(layout.positions.contains_key("Lonely"));
    }

    #[test]
    fn nodes_in_a_rank_do_not_overlap() {
        let g = graph("A --> B\nA --> C\nA --> D");
        let layout = run(&g, Direction::TopBottom);
        let mut xs: Vec<f32> = ["B", "C", "D"].iter().map(|id| layout.positions[*id].x).collect();
        xs.sort_by(f32::total_cmp);
        let width = LayoutConfig::default().node_width;
        for pair in xs.windows(2) {
            assert!(pair[1] - pair[0] >= width);
        }
    }

    #[test]
    fn crossing_reduction_untangles_swapped_targets() {
        let g = graph("C\nD\nA --> D\nB --> C");
        let layout = run(&g, Direction::TopBottom);
        assert!(layout.positions["A"].x < layout.positions["B"].x);
        assert!(layout.positions["D"].x < layout.positions["C"].x);
    }

    #[test]
    fn crossing_count_matches_pairwise_definition() {
        let layered = |ranks: &[usize], pairs: &[(usize, usize)]| {
            let sizes = vec![Size::new(10.0, 10.0); ranks.len()];
            let links: Vec<Link> = pairs
                .iter()
                .enumerate()
                .map(|(edge, &(from, to))| Link { edge, from, to })
                .collect();
            LayeredGraph::build(&sizes, ranks, &links, Direction::TopBottom)
        };

        assert_eq!(layered(&[0, 0, 1, 1], &[(0, 3), (1, 2)]).crossings(), 1);
        assert_eq!(layered(&[0, 0, 1, 1], &[(0, 2), (1, 3)]).crossings(), 0);
        // Shared endpoints never count.
        assert_eq!(layered(&[0, 1, 1], &[(0, 1), (0, 2)]).crossings(), 0);

        let mut complete = Vec::new();
        for from in 0..3 {
            for to in 3..6 {
                complete.push((from, to));
            }
        }
        assert_eq!(layered(&[0, 0, 0, 1, 1, 1], &complete).crossings(), 9);
    }

    #[test]
    fn apply_layout_copies_bend_points_onto_edges() {
        let mut g = graph("A --> B\nB --> C\nA --> C");
        let layout = run(&g, Direction::TopBottom);
        apply_layout(&mut g, &layout);
        assert!(g.edges[0].waypoints.is_empty());
        assert_eq!(g.edges[2].waypoints, layout.waypoints[&g.edges[2].id]);
    }

    #[test]
    fn long_edges_get_waypoints() {
        let g = graph("A --> B\nB --> C\nA --> C");
        let layout = run(&g, Direction::TopBottom);
        let long_edge = &g.edges[2];
        let points = &layout.waypoints[&long_edge.id];
        assert_eq!(points.len(), 1);
        assert!(points[0].y > layout.positions["A"].y);
        assert!(points[0].y < layout.positions["C"].y);
    }

    #[test]
    fn layout_starts_at_margin() {
        let g = graph("A --> B");
        let config = LayoutConfig::default();
        let layout = run(&g, Direction::TopBottom);
        assert_eq!(layout.bbox.x, config.margin);
        assert_eq!(layout.bbox.y, config.margin);
    }

    #[test]
    fn apply_layout_moves_nodes() {
        let mut g = graph("A --> B");
        let layout = run(&g, Direction::TopBottom);
        apply_layout(&mut g, &layout);
        assert_eq!(g.nodes["B"].position, layout.positions["B"]);
        assert_eq!(BBox::around(g.nodes.values()), layout.bbox);
    }
}
