//! The canonical in-memory concept graph.
//!
//! [`GraphModel`] holds nodes, edges and the current selection. It performs
//! no cross-reference validation on bulk replacement; the synthesizer
//! validates responses before they reach it. Undo checkpoints live in
//! [`crate::history`], and the session decides when to take them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::types::{Dimensions, Edge, GraphCounts, Node, Position};

/// A UI-driven delta to the node collection.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeChange {
    /// The node was dragged or placed. `None` leaves the position unchanged.
    Position {
        id: String,
        position: Option<Position>,
        dragging: bool,
    },
    /// The surface measured the rendered node.
    Dimensions { id: String, dimensions: Dimensions },
    /// Selection toggled on the surface.
    Select { id: String, selected: bool },
    /// The node was deleted. Incident edges go with it.
    Remove { id: String },
    /// A node was created on the surface.
    Add { node: Node },
    /// The node was replaced wholesale.
    Replace { node: Node },
}

/// A UI-driven delta to the edge collection.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeChange {
    Remove { id: String },
    Add { edge: Edge },
    Replace { edge: Edge },
}

/// Deep, independent copy of the graph contents at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub taken_at: DateTime<Utc>,
}

impl GraphSnapshot {
    /// Structural equality with the live graph, positions included.
    pub fn matches(&self, model: &GraphModel) -> bool {
        self.nodes == model.nodes && self.edges == model.edges
    }

    pub fn counts(&self) -> GraphCounts {
        GraphCounts {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
        }
    }
}

/// Directed concept graph plus single selection.
#[derive(Debug, Clone, Default)]
pub struct GraphModel {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    selected: Option<String>,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn counts(&self) -> GraphCounts {
        GraphCounts {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn contains_edge(&self, id: &str) -> bool {
        self.edges.iter().any(|e| e.id == id)
    }

    // ── Bulk replacement ───────────────────────────────────────────

    /// Replace every node. Cross-references are not checked here.
    pub fn replace_nodes(&mut self, nodes: Vec<Node>) {
        self.nodes = nodes;
        self.revalidate_selection();
    }

    /// Replace every edge. Cross-references are not checked here.
    pub fn replace_edges(&mut self, edges: Vec<Edge>) {
        self.edges = edges;
    }

    // ── Single insertion ───────────────────────────────────────────

    /// Append a node. The caller guarantees the id is unused.
    pub fn add_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    /// Append an edge. The caller guarantees the id is unused.
    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    // ── Incremental patches ────────────────────────────────────────

    /// Apply surface deltas in order. Changes naming unknown ids are skipped.
    /// Returns the number of changes that took effect.
    pub fn apply_node_patch(&mut self, changes: &[NodeChange]) -> usize {
        let mut applied = 0;
        for change in changes {
            if self.apply_node_change(change) {
                applied += 1;
            } else {
                trace!(?change, "Ignoring node change for unknown or duplicate id");
            }
        }
        applied
    }

    fn apply_node_change(&mut self, change: &NodeChange) -> bool {
        match change {
            NodeChange::Position { id, position, .. } => match self.node_mut(id) {
                Some(node) => {
                    if let Some(position) = position {
                        node.position = *position;
                    }
                    true
                }
                None => false,
            },
            NodeChange::Dimensions { id, dimensions } => match self.node_mut(id) {
                Some(node) => {
                    node.dimensions = Some(*dimensions);
                    true
                }
                None => false,
            },
            NodeChange::Select { id, selected } => {
                if !self.contains_node(id) {
                    return false;
                }
                if *selected {
                    self.selected = Some(id.clone());
                } else if self.selected.as_deref() == Some(id.as_str()) {
                    self.selected = None;
                }
                true
            }
            NodeChange::Remove { id } => {
                let before = self.nodes.len();
                self.nodes.retain(|n| &n.id != id);
                if self.nodes.len() == before {
                    return false;
                }
                self.edges.retain(|e| &e.source != id && &e.target != id);
                self.revalidate_selection();
                true
            }
            NodeChange::Add { node } => {
                if self.contains_node(&node.id) {
                    return false;
                }
                self.nodes.push(node.clone());
                true
            }
            NodeChange::Replace { node } => match self.node_mut(&node.id) {
                Some(existing) => {
                    *existing = node.clone();
                    true
                }
                None => false,
            },
        }
    }

    /// Apply surface deltas to edges. Unknown ids, duplicate ids and edges
    /// with missing endpoints are skipped.
    pub fn apply_edge_patch(&mut self, changes: &[EdgeChange]) -> usize {
        let mut applied = 0;
        for change in changes {
            let ok = match change {
                EdgeChange::Remove { id } => {
                    let before = self.edges.len();
                    self.edges.retain(|e| &e.id != id);
                    self.edges.len() != before
                }
                EdgeChange::Add { edge } => {
                    if self.contains_edge(&edge.id) || !self.endpoints_exist(edge) {
                        false
                    } else {
                        self.edges.push(edge.clone());
                        true
                    }
                }
                EdgeChange::Replace { edge } => {
                    let endpoints_ok = self.endpoints_exist(edge);
                    match self.edges.iter_mut().find(|e| e.id == edge.id) {
                        Some(existing) if endpoints_ok => {
                            *existing = edge.clone();
                            true
                        }
                        _ => false,
                    }
                }
            };
            if ok {
                applied += 1;
            } else {
                trace!(?change, "Ignoring edge change");
            }
        }
        applied
    }

    pub fn endpoints_exist(&self, edge: &Edge) -> bool {
        self.contains_node(&edge.source) && self.contains_node(&edge.target)
    }

    // ── Selection ──────────────────────────────────────────────────

    /// Select a node, or clear the selection. Selecting an absent node deselects.
    pub fn set_selected(&mut self, id: Option<&str>) -> Option<&str> {
        self.selected = id.filter(|id| self.contains_node(id)).map(str::to_string);
        self.selected.as_deref()
    }

    fn revalidate_selection(&mut self) {
        if let Some(id) = &self.selected {
            if !self.nodes.iter().any(|n| &n.id == id) {
                self.selected = None;
            }
        }
    }

    // ── Layout write-back ──────────────────────────────────────────

    /// Move nodes to computed positions. Ids not in the graph are skipped.
    pub fn update_positions(&mut self, positions: &HashMap<String, Position>) -> usize {
        let mut moved = 0;
        for node in &mut self.nodes {
            if let Some(position) = positions.get(&node.id) {
                node.position = *position;
                moved += 1;
            }
        }
        moved
    }

    // ── Snapshots ──────────────────────────────────────────────────

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            taken_at: Utc::now(),
        }
    }

    /// Swap in the contents of a snapshot. The snapshot itself is not consumed.
    pub fn restore(&mut self, snapshot: &GraphSnapshot) {
        self.nodes.clone_from(&snapshot.nodes);
        self.edges.clone_from(&snapshot.edges);
        self.revalidate_selection();
    }

    /// Empty both collections and drop the selection.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.selected = None;
    }
}
