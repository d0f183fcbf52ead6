//! In-process layout engine.
//!
//! Understands the same option keys an ELK server would and covers the two
//! algorithms the diagram styles ask for:
//!
//! 1. `layered`: cycle breaking, longest-path layering, barycenter crossing
//!    reduction, then coordinate assignment along the configured direction.
//! 2. `box`: fixed-size boxes packed row by row, with the column count chosen
//!    to approach the requested aspect ratio.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use petgraph::Direction as EdgeDirection;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{DfsEvent, EdgeRef, depth_first_search};

use super::engine::{LayoutEngine, LayoutRequest, LayoutResult};
use super::options::{
    ALGORITHM, ASPECT_RATIO, DIRECTION, LAYER_SPACING, LayoutOptions, NODE_PLACEMENT, NODE_SPACING,
};
use crate::error::LayoutError;
use crate::types::Position;

/// Barycenter passes (one down, one up) over all layers.
const SWEEPS: usize = 4;

const DEFAULT_NODE_SPACING: f64 = 80.0;
const DEFAULT_LAYER_SPACING: f64 = 100.0;

#[derive(Debug, Clone, Default)]
pub struct LayeredEngine;

impl LayeredEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LayoutEngine for LayeredEngine {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "layered"
    }

    async fn layout(&self, request: &LayoutRequest) -> Result<LayoutResult, LayoutError> {
        if request.nodes.is_empty() {
            return Err(LayoutError::EmptyGraph);
        }
        match request.options.get(ALGORITHM).map(String::as_str) {
            None | Some("layered") => layered(request),
            Some("box") => Ok(pack_boxes(request)),
            Some(other) => Err(LayoutError::Engine(format!(
                "unsupported algorithm: {other}"
            ))),
        }
    }
}

/// Main flow direction of a layered drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Down,
    Up,
    Right,
    Left,
}

impl Flow {
    fn from_options(options: &LayoutOptions) -> Self {
        match options.get(DIRECTION).map(String::as_str) {
            Some("UP") => Self::Up,
            Some("RIGHT") => Self::Right,
            Some("LEFT") => Self::Left,
            _ => Self::Down,
        }
    }

    fn is_horizontal(self) -> bool {
        matches!(self, Self::Right | Self::Left)
    }

    fn is_reversed(self) -> bool {
        matches!(self, Self::Up | Self::Left)
    }
}

fn option_f64(options: &LayoutOptions, key: &str, default: f64) -> f64 {
    options
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Layered ────────────────────────────────────────────────────────

fn layered(request: &LayoutRequest) -> Result<LayoutResult, LayoutError> {
    let options = &request.options;
    let flow = Flow::from_options(options);
    let node_spacing = option_f64(options, NODE_SPACING, DEFAULT_NODE_SPACING);
    let layer_spacing = option_f64(options, LAYER_SPACING, DEFAULT_LAYER_SPACING);
    let linear = options.get(NODE_PLACEMENT).map(String::as_str) == Some("LINEAR_SEGMENTS");

    let graph = build_graph(request)?;
    let acyclic = break_cycles(&graph);
    let layer_of = assign_layers(&acyclic)?;

    let layer_count = layer_of.iter().copied().max().unwrap_or(0) + 1;
    let mut rows: Vec<Vec<NodeIndex>> = vec![Vec::new(); layer_count];
    for idx in acyclic.node_indices() {
        rows[layer_of[idx.index()]].push(idx);
    }
    order_layers(&acyclic, &mut rows);

    // Extent of a node along the flow and across it.
    let along = |idx: NodeIndex| {
        let spec = &request.nodes[acyclic[idx]];
        if flow.is_horizontal() { spec.width } else { spec.height }
    };
    let across = |idx: NodeIndex| {
        let spec = &request.nodes[acyclic[idx]];
        if flow.is_horizontal() { spec.height } else { spec.width }
    };

    // Main-axis offset of each layer.
    let mut layer_offsets = Vec::with_capacity(layer_count);
    let mut cursor = 0.0;
    for row in &rows {
        layer_offsets.push(cursor);
        let depth = row.iter().map(|&n| along(n)).fold(0.0, f64::max);
        cursor += depth + layer_spacing;
    }
    let total_depth = (cursor - layer_spacing).max(0.0);

    let cross = if linear {
        place_segments(&acyclic, &rows, &across, node_spacing)
    } else {
        place_centered(&rows, &across, node_spacing)
    };

    let mut positions = HashMap::with_capacity(request.nodes.len());
    for (layer, row) in rows.iter().enumerate() {
        for &idx in row {
            let mut main = layer_offsets[layer];
            if flow.is_reversed() {
                main = total_depth - main - along(idx);
            }
            let side = cross[&idx];
            let position = if flow.is_horizontal() {
                Position::new(main, side)
            } else {
                Position::new(side, main)
            };
            positions.insert(request.nodes[acyclic[idx]].id.clone(), position);
        }
    }
    Ok(LayoutResult { positions })
}

/// Index graph over the request. Self-loops and repeated pairs are dropped;
/// they carry no layering information.
fn build_graph(request: &LayoutRequest) -> Result<DiGraph<usize, ()>, LayoutError> {
    let mut graph = DiGraph::with_capacity(request.nodes.len(), request.edges.len());
    let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(request.nodes.len());
    for (i, spec) in request.nodes.iter().enumerate() {
        index.insert(spec.id.as_str(), graph.add_node(i));
    }

    let mut seen = HashSet::new();
    for edge in &request.edges {
        let (Some(&source), Some(&target)) =
            (index.get(edge.source.as_str()), index.get(edge.target.as_str()))
        else {
            return Err(LayoutError::Engine(format!(
                "edge {} references an unknown node",
                edge.id
            )));
        };
        if source != target && seen.insert((source, target)) {
            graph.add_edge(source, target, ());
        }
    }
    Ok(graph)
}

/// Reverse every DFS back edge. The result is acyclic and keeps node indices.
fn break_cycles(graph: &DiGraph<usize, ()>) -> DiGraph<usize, ()> {
    let mut back_edges = HashSet::new();
    depth_first_search(graph, graph.node_indices(), |event| {
        if let DfsEvent::BackEdge(u, v) = event {
            back_edges.insert((u, v));
        }
    });

    let mut acyclic = DiGraph::with_capacity(graph.node_count(), graph.edge_count());
    for idx in graph.node_indices() {
        acyclic.add_node(graph[idx]);
    }
    for edge in graph.edge_references() {
        let (source, target) = (edge.source(), edge.target());
        if back_edges.contains(&(source, target)) {
            acyclic.update_edge(target, source, ());
        } else {
            acyclic.update_edge(source, target, ());
        }
    }
    acyclic
}

/// Longest-path layering: every node sits one layer below its deepest parent.
fn assign_layers(graph: &DiGraph<usize, ()>) -> Result<Vec<usize>, LayoutError> {
    let order = toposort(graph, None).map_err(|cycle| {
        LayoutError::Engine(format!(
            "cycle through node {} survived cycle breaking",
            cycle.node_id().index()
        ))
    })?;

    let mut layer = vec![0; graph.node_count()];
    for idx in order {
        let next = layer[idx.index()] + 1;
        for succ in graph.neighbors_directed(idx, EdgeDirection::Outgoing) {
            layer[succ.index()] = layer[succ.index()].max(next);
        }
    }
    Ok(layer)
}

fn order_layers(graph: &DiGraph<usize, ()>, rows: &mut [Vec<NodeIndex>]) {
    if rows.len() < 2 {
        return;
    }
    for _ in 0..SWEEPS {
        for layer in 1..rows.len() {
            reorder_by_barycenter(graph, rows, layer, EdgeDirection::Incoming);
        }
        for layer in (0..rows.len() - 1).rev() {
            reorder_by_barycenter(graph, rows, layer, EdgeDirection::Outgoing);
        }
    }
}

/// Sort one layer by the mean slot of its neighbours in the adjacent layer.
/// Nodes without such neighbours keep their current slot as their key.
#[allow(clippy::cast_precision_loss)]
fn reorder_by_barycenter(
    graph: &DiGraph<usize, ()>,
    rows: &mut [Vec<NodeIndex>],
    layer: usize,
    direction: EdgeDirection,
) {
    let reference = match direction {
        EdgeDirection::Incoming => layer - 1,
        EdgeDirection::Outgoing => layer + 1,
    };
    let slot: HashMap<NodeIndex, usize> = rows[reference]
        .iter()
        .enumerate()
        .map(|(i, &n)| (n, i))
        .collect();

    let mut keyed: Vec<(f64, usize, NodeIndex)> = rows[layer]
        .iter()
        .enumerate()
        .map(|(pos, &idx)| {
            let slots: Vec<f64> = graph
                .neighbors_directed(idx, direction)
                .filter_map(|m| slot.get(&m))
                .map(|&s| s as f64)
                .collect();
            let key = if slots.is_empty() {
                pos as f64
            } else {
                slots.iter().sum::<f64>() / slots.len() as f64
            };
            (key, pos, idx)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    rows[layer] = keyed.into_iter().map(|(_, _, idx)| idx).collect();
}

/// Pack each layer contiguously and center it against the widest layer.
#[allow(clippy::cast_precision_loss)]
fn place_centered(
    rows: &[Vec<NodeIndex>],
    across: &impl Fn(NodeIndex) -> f64,
    spacing: f64,
) -> HashMap<NodeIndex, f64> {
    let breadth = |row: &Vec<NodeIndex>| {
        let sum: f64 = row.iter().map(|&n| across(n)).sum();
        sum + spacing * row.len().saturating_sub(1) as f64
    };
    let widest = rows.iter().map(breadth).fold(0.0, f64::max);

    let mut placed = HashMap::new();
    for row in rows {
        let mut cursor = (widest - breadth(row)) / 2.0;
        for &idx in row {
            placed.insert(idx, cursor);
            cursor += across(idx) + spacing;
        }
    }
    placed
}

/// Align each node with the mean center of its already placed predecessors so
/// chains run straight, then push overlapping neighbours apart.
#[allow(clippy::cast_precision_loss)]
fn place_segments(
    graph: &DiGraph<usize, ()>,
    rows: &[Vec<NodeIndex>],
    across: &impl Fn(NodeIndex) -> f64,
    spacing: f64,
) -> HashMap<NodeIndex, f64> {
    let mut placed: HashMap<NodeIndex, f64> = HashMap::new();
    for row in rows {
        let mut next_free = f64::NEG_INFINITY;
        for &idx in row {
            let centers: Vec<f64> = graph
                .neighbors_directed(idx, EdgeDirection::Incoming)
                .filter_map(|p| placed.get(&p).map(|start| start + across(p) / 2.0))
                .collect();
            let desired = if centers.is_empty() {
                next_free.max(0.0)
            } else {
                centers.iter().sum::<f64>() / centers.len() as f64 - across(idx) / 2.0
            };
            let start = desired.max(next_free);
            placed.insert(idx, start);
            next_free = start + across(idx) + spacing;
        }
    }

    let min = placed.values().copied().fold(f64::INFINITY, f64::min);
    if min.is_finite() {
        for start in placed.values_mut() {
            *start -= min;
        }
    }
    placed
}

// ── Box packing ────────────────────────────────────────────────────

/// Lay boxes out in rows of equal cells, choosing the column count whose
/// overall drawing is closest to the requested aspect ratio.
#[allow(clippy::cast_precision_loss)]
fn pack_boxes(request: &LayoutRequest) -> LayoutResult {
    let spacing = option_f64(&request.options, NODE_SPACING, DEFAULT_NODE_SPACING);
    let aspect = option_f64(&request.options, ASPECT_RATIO, 1.0).max(f64::EPSILON);

    let cell_width = request.nodes.iter().map(|n| n.width).fold(0.0, f64::max) + spacing;
    let cell_height = request.nodes.iter().map(|n| n.height).fold(0.0, f64::max) + spacing;
    let count = request.nodes.len();

    let score = |columns: usize| {
        let rows = count.div_ceil(columns);
        let ratio = (columns as f64 * cell_width) / (rows as f64 * cell_height);
        (ratio - aspect).abs()
    };
    let columns = (1..=count)
        .min_by(|&a, &b| score(a).total_cmp(&score(b)))
        .unwrap_or(1);

    let positions = request
        .nodes
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let (row, column) = (i / columns, i % columns);
            let position = Position::new(column as f64 * cell_width, row as f64 * cell_height);
            (spec.id.clone(), position)
        })
        .collect();
    LayoutResult { positions }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Direction, LayoutSection};
    use crate::layout::engine::{LayoutEdgeSpec, LayoutNodeSpec};
    use crate::layout::options::algorithm_options;
    use crate::types::DiagramStyle;

    fn request(style: DiagramStyle, nodes: &[&str], edges: &[(&str, &str)]) -> LayoutRequest {
        request_with(style, &LayoutSection::default(), nodes, edges)
    }

    fn request_with(
        style: DiagramStyle,
        section: &LayoutSection,
        nodes: &[&str],
        edges: &[(&str, &str)],
    ) -> LayoutRequest {
        LayoutRequest {
            nodes: nodes
                .iter()
                .map(|id| LayoutNodeSpec {
                    id: (*id).to_string(),
                    width: section.node_width,
                    height: section.node_height,
                })
                .collect(),
            edges: edges
                .iter()
                .enumerate()
                .map(|(i, (s, t))| LayoutEdgeSpec {
                    id: format!("edge-{i}"),
                    source: (*s).to_string(),
                    target: (*t).to_string(),
                })
                .collect(),
            options: algorithm_options(style, section),
        }
    }

    fn run(request: &LayoutRequest) -> LayoutResult {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(LayeredEngine::new().layout(request))
            .unwrap()
    }

    fn overlaps(a: Position, b: Position, width: f64, height: f64) -> bool {
        (a.x - b.x).abs() < width && (a.y - b.y).abs() < height
    }

    #[test]
    fn timeline_chain_runs_left_to_right() {
        let result = run(&request(
            DiagramStyle::Timeline,
            &["a", "b", "c"],
            &[("a", "b"), ("b", "c")],
        ));
        let [a, b, c] = ["a", "b", "c"].map(|id| result.positions[id]);
        assert!(a.x < b.x && b.x < c.x);
        assert_eq!(a.y, b.y);
        assert_eq!(b.y, c.y);
        // Layer step is node width plus layer spacing.
        assert_eq!(b.x - a.x, 350.0);
    }

    #[test]
    fn mindmap_places_children_below_root() {
        let result = run(&request(
            DiagramStyle::Mindmap,
            &["root", "x", "y", "z"],
            &[("root", "x"), ("root", "y"), ("root", "z")],
        ));
        let root = result.positions["root"];
        for id in ["x", "y", "z"] {
            let child = result.positions[id];
            assert_eq!(child.y, root.y + 250.0);
        }
        let children: Vec<Position> = ["x", "y", "z"].map(|id| result.positions[id]).to_vec();
        for (i, a) in children.iter().enumerate() {
            for b in &children[i + 1..] {
                assert!(!overlaps(*a, *b, 250.0, 150.0));
            }
        }
        // Root is centered over its children.
        let mid = (children[0].x + children[2].x) / 2.0;
        assert_eq!(root.x, mid);
    }

    #[test]
    fn upward_flow_mirrors_layers() {
        let section = LayoutSection {
            direction: Direction::Up,
            ..LayoutSection::default()
        };
        let result = run(&request_with(
            DiagramStyle::Mindmap,
            &section,
            &["root", "leaf"],
            &[("root", "leaf")],
        ));
        assert!(result.positions["root"].y > result.positions["leaf"].y);
    }

    #[test]
    fn cycles_are_laid_out() {
        let result = run(&request(
            DiagramStyle::Mindmap,
            &["a", "b", "c"],
            &[("a", "b"), ("b", "c"), ("c", "a")],
        ));
        assert_eq!(result.positions.len(), 3);
        assert!(result.positions["a"].y < result.positions["b"].y);
        assert!(result.positions["b"].y < result.positions["c"].y);
    }

    #[test]
    fn disconnected_nodes_share_the_first_layer() {
        let result = run(&request(DiagramStyle::Mindmap, &["a", "b"], &[]));
        let (a, b) = (result.positions["a"], result.positions["b"]);
        assert_eq!(a.y, b.y);
        assert!(!overlaps(a, b, 250.0, 150.0));
    }

    #[test]
    fn quadrant_packs_a_square_grid() {
        let result = run(&request(DiagramStyle::Quadrant, &["a", "b", "c", "d"], &[]));
        assert_eq!(result.positions["a"], Position::new(0.0, 0.0));
        assert_eq!(result.positions["b"], Position::new(330.0, 0.0));
        assert_eq!(result.positions["c"], Position::new(0.0, 230.0));
        assert_eq!(result.positions["d"], Position::new(330.0, 230.0));
    }

    #[test]
    fn unknown_algorithm_is_an_engine_error() {
        let mut req = request(DiagramStyle::Mindmap, &["a"], &[]);
        req.options.insert(ALGORITHM.into(), "force".into());
        let err = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(LayeredEngine::new().layout(&req))
            .unwrap_err();
        assert!(matches!(err, LayoutError::Engine(_)));
    }

    #[test]
    fn dangling_edge_is_an_engine_error() {
        let req = request(DiagramStyle::Mindmap, &["a"], &[("a", "ghost")]);
        let err = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(LayeredEngine::new().layout(&req))
            .unwrap_err();
        assert!(matches!(err, LayoutError::Engine(_)));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn every_node_gets_a_position(
                count in 1usize..12,
                pairs in prop::collection::vec((0usize..12, 0usize..12), 0..24),
                style in prop::sample::select(DiagramStyle::ALL.to_vec()),
            ) {
                let ids: Vec<String> = (0..count).map(|i| format!("n{i}")).collect();
                let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
                let edges: Vec<(&str, &str)> = pairs
                    .iter()
                    .filter(|(s, t)| *s < count && *t < count)
                    .map(|&(s, t)| (id_refs[s], id_refs[t]))
                    .collect();
                let result = run(&request(style, &id_refs, &edges));
                prop_assert_eq!(result.positions.len(), count);
                prop_assert!(result.positions.values().all(|p| p.x.is_finite() && p.y.is_finite()));
            }
        }
    }
}
