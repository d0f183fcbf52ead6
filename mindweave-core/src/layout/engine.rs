use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::options::{LayoutOptions, algorithm_options};
use crate::config::LayoutSection;
use crate::error::LayoutError;
use crate::model::GraphModel;
use crate::types::{DiagramStyle, Position};

/// One node as the engine sees it: an id and a fixed box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutNodeSpec {
    pub id: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEdgeSpec {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// Everything an engine needs for one pass. Built from a copy of the graph
/// so the model can keep changing while the engine works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRequest {
    pub nodes: Vec<LayoutNodeSpec>,
    pub edges: Vec<LayoutEdgeSpec>,
    pub options: LayoutOptions,
}

/// Top-left positions keyed by node id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub positions: HashMap<String, Position>,
}

/// A graph layout engine. Implementations may be local or remote.
#[async_trait]
pub trait LayoutEngine: Send + Sync + Debug {
    fn name(&self) -> &str;

    async fn layout(&self, request: &LayoutRequest) -> Result<LayoutResult, LayoutError>;
}

/// Build an engine request from the current graph.
///
/// Every node gets the configured fixed box regardless of its measured size.
/// Edges with an endpoint outside the graph are left out.
pub fn prepare_request(
    model: &GraphModel,
    style: DiagramStyle,
    section: &LayoutSection,
) -> Result<LayoutRequest, LayoutError> {
    if model.nodes().is_empty() {
        return Err(LayoutError::EmptyGraph);
    }

    let nodes: Vec<LayoutNodeSpec> = model
        .nodes()
        .iter()
        .map(|node| LayoutNodeSpec {
            id: node.id.clone(),
            width: section.node_width,
            height: section.node_height,
        })
        .collect();

    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let edges = model
        .edges()
        .iter()
        .filter(|edge| ids.contains(edge.source.as_str()) && ids.contains(edge.target.as_str()))
        .map(|edge| LayoutEdgeSpec {
            id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
        })
        .collect();

    Ok(LayoutRequest {
        nodes,
        edges,
        options: algorithm_options(style, section),
    })
}

/// Write a result back into the model.
///
/// The result must cover every requested node; a partial result is rejected
/// as a whole and nothing moves. Nodes removed from the model since the
/// request was built are skipped. Returns the number of nodes moved.
pub fn apply_result(
    model: &mut GraphModel,
    request: &LayoutRequest,
    result: &LayoutResult,
) -> Result<usize, LayoutError> {
    let missing: Vec<String> = request
        .nodes
        .iter()
        .filter(|spec| !result.positions.contains_key(&spec.id))
        .map(|spec| spec.id.clone())
        .collect();
    if !missing.is_empty() {
        return Err(LayoutError::Incomplete { missing });
    }

    let requested: HashSet<&str> = request.nodes.iter().map(|n| n.id.as_str()).collect();
    let positions: HashMap<String, Position> = result
        .positions
        .iter()
        .filter(|(id, _)| requested.contains(id.as_str()))
        .map(|(id, pos)| (id.clone(), *pos))
        .collect();
    Ok(model.update_positions(&positions))
}

// ── Tests ──────────────────────────────────────────────────────────
