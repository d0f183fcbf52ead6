//! Conversion of validated responses into graph entities.
//!
//! Both builders are pure: they either return the complete set of nodes and
//! edges to commit, or an error, and never touch the live graph.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::config::ExpansionSection;
use crate::error::SynthesisError;
use crate::model::GraphModel;
use crate::types::{Edge, Node, Position};

use super::schema::GraphResponse;

/// Nodes and edges ready to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphFragment {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Build the full replacement graph for a top-level generation.
///
/// Nodes are placed at the origin pending layout; edges get ids `edge-{i}`.
pub fn build_generation(response: &GraphResponse) -> Result<GraphFragment, SynthesisError> {
    if response.nodes.is_empty() {
        return Err(SynthesisError::Schema("response contains no nodes".into()));
    }

    let ids: HashSet<&str> = response.nodes.iter().map(|n| n.id.as_str()).collect();
    for edge in &response.edges {
        if !ids.contains(edge.source.as_str()) || !ids.contains(edge.target.as_str()) {
            return Err(SynthesisError::DanglingEdge {
                from: edge.source.clone(),
                to: edge.target.clone(),
            });
        }
    }

    let nodes = response
        .nodes
        .iter()
        .map(|n| Node::new(n.id.clone(), n.kind_or_default(), n.label.clone()).with_content(n.content.clone()))
        .collect();

    let edges = response
        .edges
        .iter()
        .enumerate()
        .map(|(i, e)| {
            Edge::new(format!("edge-{i}"), e.source.clone(), e.target.clone())
                .with_label(e.label.clone())
        })
        .collect();

    Ok(GraphFragment { nodes, edges })
}

/// Namespaced id of an expansion child.
pub fn mint_child_id(parent_id: &str, raw_id: &str) -> String {
    format!("{parent_id}-{raw_id}")
}

/// Build the nodes and edges that an expansion of `parent` appends.
///
/// Children are fanned out one row beneath the parent, centered on it.
/// Edge sources equal to the sentinel (or the parent id) resolve to the
/// parent; sources and targets naming a declared child resolve to its
/// minted id. Anything else is a dangling reference and rejects the whole
/// expansion. A child with no incoming edge is attached to the parent.
pub fn build_expansion(
    response: &GraphResponse,
    parent: &Node,
    live: &GraphModel,
    params: &ExpansionSection,
) -> Result<GraphFragment, SynthesisError> {
    let count = response.nodes.len();
    if count == 0 {
        return Err(SynthesisError::Schema(
            "expansion returned no child nodes".into(),
        ));
    }
    if count < params.min_children || count > params.max_children {
        warn!(
            parent = %parent.id,
            count,
            min = params.min_children,
            max = params.max_children,
            "Expansion child count outside requested range"
        );
    }

    let mut minted: HashMap<&str, String> = HashMap::with_capacity(count);
    let mut nodes = Vec::with_capacity(count);

    #[allow(clippy::cast_precision_loss)]
    let half = count as f64 / 2.0;
    for (index, child) in response.nodes.iter().enumerate() {
        let id = mint_child_id(&parent.id, &child.id);
        if live.contains_node(&id) {
            return Err(SynthesisError::DuplicateNode(id));
        }
        #[allow(clippy::cast_precision_loss)]
        let offset = index as f64 - half;
        let position = Position::new(
            parent.position.x + offset * params.spacing_x,
            parent.position.y + params.spacing_y,
        );
        nodes.push(
            Node::new(id.clone(), child.kind_or_default(), child.label.clone())
                .with_content(child.content.clone())
                .at(position),
        );
        minted.insert(child.id.as_str(), id);
    }

    let resolve_source = |raw: &str| -> Option<String> {
        if raw == params.sentinel || raw == parent.id {
            Some(parent.id.clone())
        } else {
            minted.get(raw).cloned()
        }
    };

    let mut edges: Vec<Edge> = Vec::with_capacity(response.edges.len().max(count));
    let mut seen_pairs: HashSet<(String, String)> = HashSet::new();
    for edge in &response.edges {
        let dangling = || SynthesisError::DanglingEdge {
            from: edge.source.clone(),
            to: edge.target.clone(),
        };
        let source = resolve_source(&edge.source).ok_or_else(dangling)?;
        let target = minted.get(edge.target.as_str()).cloned().ok_or_else(dangling)?;
        if !seen_pairs.insert((source.clone(), target.clone())) {
            debug!(%source, %target, "Dropping repeated expansion edge");
            continue;
        }
        edges.push(
            Edge::new(format!("expanded-edge-{source}-{target}"), source, target)
                .with_label(edge.label.clone()),
        );
    }

    for node in &nodes {
        if !edges.iter().any(|e| e.target == node.id) {
            debug!(child = %node.id, "Attaching orphan expansion child to parent");
            edges.push(Edge::new(
                format!("expanded-edge-{}-{}", parent.id, node.id),
                parent.id.clone(),
                node.id.clone(),
            ));
        }
    }

    Ok(GraphFragment { nodes, edges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::schema::{ResponseEdge, ResponseNode};
    use crate::types::NodeKind;

    fn node(id: &str, kind: Option<NodeKind>) -> ResponseNode {
        ResponseNode {
            id: id.to_string(),
            label: id.to_uppercase(),
            kind,
            content: format!("About {id}"),
        }
    }

    fn edge(source: &str, target: &str) -> ResponseEdge {
        ResponseEdge {
            source: source.to_string(),
            target: target.to_string(),
            label: None,
        }
    }

    fn parent_graph() -> (GraphModel, Node) {
        let parent = Node::new("node-1", NodeKind::Concept, "Photosynthesis")
            .at(Position::new(500.0, 100.0));
        let mut live = GraphModel::new();
        live.add_node(parent.clone());
        (live, parent)
    }

    #[test]
    fn generation_places_nodes_at_origin_and_numbers_edges() {
        let response = GraphResponse {
            nodes: vec![node("a", Some(NodeKind::Root)), node("b", None)],
            edges: vec![ResponseEdge {
                label: Some("causes".into()),
                ..edge("a", "b")
            }],
        };
        let fragment = build_generation(&response).unwrap();
        assert_eq!(fragment.nodes[0].kind, NodeKind::Root);
        assert_eq!(fragment.nodes[1].kind, NodeKind::Concept);
        assert!(fragment.nodes.iter().all(|n| n.position == Position::ORIGIN));
        assert_eq!(fragment.edges[0].id, "edge-0");
        assert_eq!(fragment.edges[0].label.as_deref(), Some("causes"));
    }

    #[test]
    fn generation_rejects_dangling_edges() {
        let response = GraphResponse {
            nodes: vec![node("a", None)],
            edges: vec![edge("a", "ghost")],
        };
        assert_eq!(
            build_generation(&response).unwrap_err(),
            SynthesisError::DanglingEdge {
                from: "a".into(),
                to: "ghost".into()
            }
        );
    }

    #[test]
    fn expansion_mints_ids_and_fans_out_under_parent() {
        let (live, parent) = parent_graph();
        let response = GraphResponse {
            nodes: vec![node("expanded-1", None), node("expanded-2", None), node("expanded-3", None), node("expanded-4", None)],
            edges: (1..=4)
                .map(|i| edge("PARENT_NODE", &format!("expanded-{i}")))
                .collect(),
        };
        let fragment =
            build_expansion(&response, &parent, &live, &ExpansionSection::default()).unwrap();

        let ids: Vec<_> = fragment.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            ["node-1-expanded-1", "node-1-expanded-2", "node-1-expanded-3", "node-1-expanded-4"]
        );
        let xs: Vec<_> = fragment.nodes.iter().map(|n| n.position.x).collect();
        assert_eq!(xs, [500.0 - 560.0, 500.0 - 280.0, 500.0, 500.0 + 280.0]);
        assert!(fragment.nodes.iter().all(|n| (n.position.y - 300.0).abs() < f64::EPSILON));
        assert!(fragment.edges.iter().all(|e| e.source == "node-1"));
        assert_eq!(fragment.edges.len(), 4);
    }

    #[test]
    fn expansion_rejects_edge_to_undeclared_child() {
        let (live, parent) = parent_graph();
        let response = GraphResponse {
            nodes: vec![node("expanded-1", None)],
            edges: vec![edge("PARENT_NODE", "expanded-1"), edge("PARENT_NODE", "expanded-9")],
        };
        let err = build_expansion(&response, &parent, &live, &ExpansionSection::default())
            .unwrap_err();
        assert!(matches!(err, SynthesisError::DanglingEdge { .. }));
    }

    #[test]
    fn expansion_rejects_unknown_source() {
        let (live, parent) = parent_graph();
        let response = GraphResponse {
            nodes: vec![node("expanded-1", None)],
            edges: vec![edge("elsewhere", "expanded-1")],
        };
        assert!(build_expansion(&response, &parent, &live, &ExpansionSection::default()).is_err());
    }

    #[test]
    fn expansion_rejects_collision_with_existing_id() {
        let (mut live, parent) = parent_graph();
        live.add_node(Node::new("node-1-expanded-1", NodeKind::Concept, "earlier"));
        let response = GraphResponse {
            nodes: vec![node("expanded-1", None)],
            edges: vec![edge("PARENT_NODE", "expanded-1")],
        };
        assert_eq!(
            build_expansion(&response, &parent, &live, &ExpansionSection::default()).unwrap_err(),
            SynthesisError::DuplicateNode("node-1-expanded-1".into())
        );
    }

    #[test]
    fn expansion_links_children_and_attaches_orphans() {
        let (live, parent) = parent_graph();
        let response = GraphResponse {
            nodes: vec![node("c1", None), node("c2", None), node("c3", None)],
            edges: vec![edge("PARENT_NODE", "c1"), edge("c1", "c2"), edge("PARENT_NODE", "c1")],
        };
        let fragment =
            build_expansion(&response, &parent, &live, &ExpansionSection::default()).unwrap();

        let pairs: Vec<_> = fragment
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();
        assert_eq!(
            pairs,
            [
                ("node-1", "node-1-c1"),
                ("node-1-c1", "node-1-c2"),
                ("node-1", "node-1-c3"),
            ]
        );
    }
}
