//! Adapter between a [`GraphSession`] and whatever draws it.
//!
//! The adapter publishes a [`GraphView`] on a `watch` channel and turns
//! surface gestures into model edits. Expand requests go out through an
//! explicit [`ExpandPort`] handed in at construction.

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::model::{EdgeChange, NodeChange};
use crate::session::GraphSession;
use crate::types::{DiagramStyle, Edge, Node};

/// Everything the surface needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphView {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub selected: Option<String>,
    pub generating: bool,
    pub can_undo: bool,
    pub can_redo: bool,
    pub style: DiagramStyle,
}

/// A request to expand one node, as resolved by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandRequest {
    pub node_id: String,
    pub label: String,
}

/// Receives expand requests from the surface.
pub trait ExpandPort: Send + Sync + std::fmt::Debug {
    fn request_expand(&self, request: ExpandRequest);
}

impl ExpandPort for mpsc::UnboundedSender<ExpandRequest> {
    fn request_expand(&self, request: ExpandRequest) {
        if self.send(request).is_err() {
            debug!("expand request dropped, receiver closed");
        }
    }
}

/// A user drew an edge between two handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub source: String,
    pub target: String,
}

impl Connection {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Id given to edges drawn on the surface.
    pub fn edge_id(&self) -> String {
        format!("xy-edge__{}-{}", self.source, self.target)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    NodesChanged(Vec<NodeChange>),
    EdgesChanged(Vec<EdgeChange>),
    Connect(Connection),
    NodeClick(String),
    PaneClick,
    /// The expand affordance on a node was pressed.
    ExpandClick(String),
}

/// What handling a gesture did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureEffect {
    Changed,
    Unchanged,
    ExpandRequested,
}

#[derive(Debug)]
pub struct SurfaceAdapter {
    tx: watch::Sender<GraphView>,
    port: Box<dyn ExpandPort>,
}

impl SurfaceAdapter {
    pub fn new(session: &GraphSession, port: Box<dyn ExpandPort>) -> Self {
        let (tx, _rx) = watch::channel(session.view());
        Self { tx, port }
    }

    pub fn subscribe(&self) -> watch::Receiver<GraphView> {
        self.tx.subscribe()
    }

    /// Push the session's current state to subscribers. Hosts call this
    /// after their own operations (generate, undo, layout).
    pub fn publish(&self, session: &GraphSession) {
        let view = session.view();
        self.tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }

    pub fn handle(&self, session: &mut GraphSession, gesture: Gesture) -> GestureEffect {
        let effect = match gesture {
            Gesture::NodesChanged(changes) => changed(session.apply_node_patch(&changes) > 0),
            Gesture::EdgesChanged(changes) => changed(session.apply_edge_patch(&changes) > 0),
            Gesture::Connect(connection) => Self::connect(session, &connection),
            Gesture::NodeClick(id) => {
                let before = session.model().selected().map(str::to_string);
                let after = session.select(Some(&id)).map(str::to_string);
                changed(before != after)
            }
            Gesture::PaneClick => {
                let had = session.model().selected().is_some();
                session.select(None);
                changed(had)
            }
            Gesture::ExpandClick(id) => self.expand(session, &id),
        };
        if effect == GestureEffect::Changed {
            self.publish(session);
        }
        effect
    }

    fn connect(session: &mut GraphSession, connection: &Connection) -> GestureEffect {
        let edge = Edge::new(
            connection.edge_id(),
            connection.source.clone(),
            connection.target.clone(),
        );
        if session.model().contains_edge(&edge.id) || !session.model().endpoints_exist(&edge) {
            debug!(source = %connection.source, target = %connection.target, "ignoring connection");
            return GestureEffect::Unchanged;
        }
        changed(session.apply_edge_patch(&[EdgeChange::Add { edge }]) > 0)
    }

    fn expand(&self, session: &GraphSession, id: &str) -> GestureEffect {
        let Some(node) = session.model().node(id) else {
            debug!(node = id, "expand requested for a missing node");
            return GestureEffect::Unchanged;
        };
        self.port.request_expand(ExpandRequest {
            node_id: node.id.clone(),
            label: node.label.clone(),
        });
        GestureEffect::ExpandRequested
    }
}

fn changed(yes: bool) -> GestureEffect {
    if yes {
        GestureEffect::Changed
    } else {
        GestureEffect::Unchanged
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{ExpansionSection, LlmSection, MindweaveConfig};
    use crate::error::{LlmError, MindweaveError, Result};
    use crate::layout::LayeredEngine;
    use crate::llm::{CompletionProvider, CompletionRequest, CompletionStream};
    use crate::synth::GraphSynthesizer;
    use crate::types::Position;

    #[derive(Debug)]
    struct OfflineProvider;

    #[async_trait::async_trait]
    #[allow(clippy::unnecessary_literal_bound)]
    impl CompletionProvider for OfflineProvider {
        fn name(&self) -> &str {
            "offline"
        }

        fn model_id(&self) -> &str {
            "none"
        }

        async fn stream(&self, _request: &CompletionRequest) -> Result<CompletionStream> {
            Err(MindweaveError::Llm(LlmError::Network("offline".into())))
        }
    }

    fn seeded_session() -> GraphSession {
        let synthesizer = GraphSynthesizer::new(
            Box::new(OfflineProvider),
            LlmSection::default(),
            ExpansionSection::default(),
        );
        let mut session = GraphSession::new(
            synthesizer,
            Arc::new(LayeredEngine::new()),
            &MindweaveConfig::default(),
        );
        let (ticket, _) = session.begin_generate("plants").unwrap();
        let response = serde_json::from_str(
            r#"{"nodes":[
                {"id":"node-1","label":"Photosynthesis","kind":"root"},
                {"id":"node-2","label":"Light"},
                {"id":"node-3","label":"Water"}],
              "edges":[{"source":"node-1","target":"node-2"}]}"#,
        )
        .unwrap();
        session.commit(&ticket, &response).unwrap();
        session
    }

    fn adapter(session: &GraphSession) -> (SurfaceAdapter, mpsc::UnboundedReceiver<ExpandRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SurfaceAdapter::new(session, Box::new(tx)), rx)
    }

    #[test]
    fn connect_adds_one_edge_and_ignores_repeats() {
        let mut session = seeded_session();
        let (surface, _rx) = adapter(&session);
        let gesture = Gesture::Connect(Connection::new("node-2", "node-3"));

        assert_eq!(surface.handle(&mut session, gesture.clone()), GestureEffect::Changed);
        assert!(session.model().contains_edge("xy-edge__node-2-node-3"));
        assert_eq!(surface.handle(&mut session, gesture), GestureEffect::Unchanged);
        assert_eq!(session.counts().edges, 2);
    }

    #[test]
    fn connect_to_unknown_node_is_ignored() {
        let mut session = seeded_session();
        let (surface, _rx) = adapter(&session);
        let effect = surface.handle(&mut session, Gesture::Connect(Connection::new("node-2", "ghost")));
        assert_eq!(effect, GestureEffect::Unchanged);
        assert_eq!(session.counts().edges, 1);
    }

    #[test]
    fn clicks_drive_selection() {
        let mut session = seeded_session();
        let (surface, _rx) = adapter(&session);
        let view = surface.subscribe();

        surface.handle(&mut session, Gesture::NodeClick("node-2".into()));
        assert_eq!(view.borrow().selected.as_deref(), Some("node-2"));

        surface.handle(&mut session, Gesture::PaneClick);
        assert_eq!(view.borrow().selected, None);
        assert_eq!(surface.handle(&mut session, Gesture::PaneClick), GestureEffect::Unchanged);
    }

    #[test]
    fn expand_click_resolves_label_through_the_port() {
        let mut session = seeded_session();
        let (surface, mut rx) = adapter(&session);

        let effect = surface.handle(&mut session, Gesture::ExpandClick("node-1".into()));
        assert_eq!(effect, GestureEffect::ExpandRequested);
        assert_eq!(
            rx.try_recv().unwrap(),
            ExpandRequest {
                node_id: "node-1".into(),
                label: "Photosynthesis".into(),
            }
        );

        let effect = surface.handle(&mut session, Gesture::ExpandClick("node-9".into()));
        assert_eq!(effect, GestureEffect::Unchanged);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn drag_publishes_new_positions() {
        let mut session = seeded_session();
        let (surface, _rx) = adapter(&session);
        let mut view = surface.subscribe();
        view.mark_unchanged();

        surface.handle(
            &mut session,
            Gesture::NodesChanged(vec![NodeChange::Position {
                id: "node-3".into(),
                position: Some(Position::new(40.0, 60.0)),
                dragging: true,
            }]),
        );
        assert!(view.has_changed().unwrap());
        let published = view.borrow_and_update();
        let node = published.nodes.iter().find(|n| n.id == "node-3").unwrap();
        assert_eq!(node.position, Position::new(40.0, 60.0));
    }

    #[test]
    fn node_removal_takes_its_edges_along() {
        let mut session = seeded_session();
        let (surface, _rx) = adapter(&session);
        let view = surface.subscribe();

        surface.handle(
            &mut session,
            Gesture::NodesChanged(vec![NodeChange::Remove { id: "node-2".into() }]),
        );
        assert_eq!(view.borrow().nodes.len(), 2);
        assert!(view.borrow().edges.is_empty());
    }

    #[test]
    fn publish_reflects_host_operations() {
        let mut session = seeded_session();
        let (surface, _rx) = adapter(&session);
        let view = surface.subscribe();

        session.clear();
        surface.publish(&session);
        assert!(view.borrow().nodes.is_empty());
        assert!(view.borrow().can_undo);
    }
}
