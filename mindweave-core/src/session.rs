//! The graph session: one live graph with its history, diagram style, layout
//! orchestrator and synthesis gate.
//!
//! Synthesis runs in three steps. `begin_*` checks and sets the gate and
//! hands back a [`RequestTicket`] with the completion request; the caller
//! streams the completion; `commit` accepts the final response only while
//! that ticket is still current. `generate` and `expand` run all three.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::MindweaveConfig;
use crate::error::{Result, SynthesisError};
use crate::history::History;
use crate::layout::{LayoutEngine, LayoutOrchestrator, LayoutOutcome, LayoutState};
use crate::llm::CompletionRequest;
use crate::llm::providers::provider_from_config;
use crate::model::{EdgeChange, GraphModel, NodeChange};
use crate::progress::SynthesisReporter;
use crate::surface::GraphView;
use crate::synth::GraphSynthesizer;
use crate::synth::merge::{GraphFragment, build_expansion, build_generation};
use crate::synth::schema::GraphResponse;
use crate::types::{DiagramStyle, GraphCounts};

/// What an outstanding request will do once committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Generate,
    Expand { parent: String },
}

/// Identifies one outstanding synthesis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    id: Uuid,
    kind: RequestKind,
}

impl RequestTicket {
    fn new(kind: RequestKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }
}

#[derive(Debug)]
pub struct GraphSession {
    model: GraphModel,
    history: History,
    style: DiagramStyle,
    synthesizer: GraphSynthesizer,
    layout: LayoutOrchestrator,
    in_flight: Option<RequestTicket>,
}

impl GraphSession {
    pub fn new(
        synthesizer: GraphSynthesizer,
        engine: Arc<dyn LayoutEngine>,
        config: &MindweaveConfig,
    ) -> Self {
        Self {
            model: GraphModel::new(),
            history: History::new(config.history.capacity),
            style: config.diagram.style,
            synthesizer,
            layout: LayoutOrchestrator::new(engine, config.layout.clone()),
            in_flight: None,
        }
    }

    /// Build a session whose provider comes from the `[llm]` section.
    pub fn from_config(config: &MindweaveConfig, engine: Arc<dyn LayoutEngine>) -> Result<Self> {
        config.validate()?;
        let provider = provider_from_config(&config.llm)?;
        let synthesizer =
            GraphSynthesizer::new(provider, config.llm.clone(), config.expansion.clone());
        Ok(Self::new(synthesizer, engine, config))
    }

    // ── Read access ────────────────────────────────────────────────

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn style(&self) -> DiagramStyle {
        self.style
    }

    pub fn counts(&self) -> GraphCounts {
        self.model.counts()
    }

    /// True exactly while a synthesis request is outstanding.
    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn current_ticket(&self) -> Option<&RequestTicket> {
        self.in_flight.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo(&self.model)
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn layout_state(&self) -> LayoutState {
        self.layout.state()
    }

    pub fn layout(&self) -> &LayoutOrchestrator {
        &self.layout
    }

    pub fn synthesizer(&self) -> &GraphSynthesizer {
        &self.synthesizer
    }

    /// Everything the rendering surface draws.
    pub fn view(&self) -> GraphView {
        GraphView {
            nodes: self.model.nodes().to_vec(),
            edges: self.model.edges().to_vec(),
            selected: self.model.selected().map(str::to_string),
            generating: self.is_generating(),
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            style: self.style,
        }
    }

    // ── Synthesis ──────────────────────────────────────────────────

    /// Open a top-level generation request.
    pub fn begin_generate(
        &mut self,
        content: &str,
    ) -> std::result::Result<(RequestTicket, CompletionRequest), SynthesisError> {
        self.ensure_idle()?;
        let request = self.synthesizer.generation_request(content, self.style)?;
        let ticket = RequestTicket::new(RequestKind::Generate);
        debug!(ticket = %ticket.id, style = %self.style, "generation requested");
        self.in_flight = Some(ticket.clone());
        Ok((ticket, request))
    }

    /// Open an expansion request for an existing node. A non-blank `label`
    /// overrides the node's own label in the prompt.
    pub fn begin_expand(
        &mut self,
        node_id: &str,
        label: Option<&str>,
    ) -> std::result::Result<(RequestTicket, CompletionRequest), SynthesisError> {
        self.ensure_idle()?;
        if node_id.trim().is_empty() {
            return Err(SynthesisError::EmptyInput);
        }
        let mut parent = self
            .model
            .node(node_id)
            .cloned()
            .ok_or_else(|| SynthesisError::UnknownNode(node_id.to_string()))?;
        if let Some(label) = label.filter(|l| !l.trim().is_empty()) {
            parent.label = label.to_string();
        }

        let taken = self.minted_children(node_id);
        let request = self.synthesizer.expansion_request(&parent, &taken)?;
        let ticket = RequestTicket::new(RequestKind::Expand {
            parent: node_id.to_string(),
        });
        debug!(ticket = %ticket.id, parent = node_id, taken = taken.len(), "expansion requested");
        self.in_flight = Some(ticket.clone());
        Ok((ticket, request))
    }

    /// Commit a final response for `ticket`.
    ///
    /// Rejected responses leave the graph and history untouched. The gate is
    /// released either way. Returns the number of nodes and edges committed.
    pub fn commit(
        &mut self,
        ticket: &RequestTicket,
        response: &GraphResponse,
    ) -> std::result::Result<GraphCounts, SynthesisError> {
        if self.in_flight.as_ref() != Some(ticket) {
            debug!(ticket = %ticket.id, "discarding response for a stale request");
            return Err(SynthesisError::Cancelled);
        }
        self.in_flight = None;

        let fragment = match &ticket.kind {
            RequestKind::Generate => build_generation(response)?,
            RequestKind::Expand { parent } => {
                let parent = self
                    .model
                    .node(parent)
                    .ok_or_else(|| SynthesisError::UnknownNode(parent.clone()))?;
                build_expansion(response, parent, &self.model, self.synthesizer.expansion())?
            }
        };
        let committed = GraphCounts {
            nodes: fragment.nodes.len(),
            edges: fragment.edges.len(),
        };

        self.history.snapshot(&self.model);
        match &ticket.kind {
            RequestKind::Generate => {
                self.model.replace_nodes(fragment.nodes);
                self.model.replace_edges(fragment.edges);
            }
            RequestKind::Expand { .. } => self.append(fragment),
        }
        info!(
            nodes = committed.nodes,
            edges = committed.edges,
            total_nodes = self.model.counts().nodes,
            "committed synthesis result"
        );
        self.touched();
        Ok(committed)
    }

    /// Release the gate after a failed request.
    pub fn fail(&mut self, ticket: &RequestTicket) {
        if self.in_flight.as_ref() == Some(ticket) {
            self.in_flight = None;
        }
    }

    /// Abandon the outstanding request. Its response, if it still arrives,
    /// is rejected with [`SynthesisError::Cancelled`].
    pub fn cancel(&mut self) -> bool {
        match self.in_flight.take() {
            Some(ticket) => {
                info!(ticket = %ticket.id, "request cancelled");
                true
            }
            None => false,
        }
    }

    /// Generate a new graph from free text, replacing the current one.
    #[instrument(skip_all, fields(style = %self.style))]
    pub async fn generate(
        &mut self,
        content: &str,
        reporter: &dyn SynthesisReporter,
    ) -> Result<GraphCounts> {
        let (ticket, request) = self.begin_generate(content)?;
        reporter.start("Generating graph");
        self.run_request(ticket, request, reporter).await
    }

    /// Expand an existing node with generated children.
    #[instrument(skip_all, fields(node = node_id))]
    pub async fn expand(
        &mut self,
        node_id: &str,
        label: Option<&str>,
        reporter: &dyn SynthesisReporter,
    ) -> Result<GraphCounts> {
        let (ticket, request) = self.begin_expand(node_id, label)?;
        reporter.start("Expanding node");
        self.run_request(ticket, request, reporter).await
    }

    async fn run_request(
        &mut self,
        ticket: RequestTicket,
        request: CompletionRequest,
        reporter: &dyn SynthesisReporter,
    ) -> Result<GraphCounts> {
        let result = self.synthesizer.complete(&request, reporter).await;
        reporter.finish();
        match result {
            Ok(response) => Ok(self.commit(&ticket, &response)?),
            Err(e) => {
                warn!(error = %e, "synthesis request failed");
                self.fail(&ticket);
                Err(e)
            }
        }
    }

    // ── History ────────────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        let changed = self.history.undo(&mut self.model);
        if changed {
            self.touched();
        }
        changed
    }

    pub fn redo(&mut self) -> bool {
        let changed = self.history.redo(&mut self.model);
        if changed {
            self.touched();
        }
        changed
    }

    /// Snapshot, then empty the graph. Clearing an empty graph does nothing.
    pub fn clear(&mut self) -> bool {
        if self.model.is_empty() {
            return false;
        }
        self.history.snapshot(&self.model);
        self.model.clear();
        info!("graph cleared");
        self.touched();
        true
    }

    // ── Direct edits ───────────────────────────────────────────────

    pub fn apply_node_patch(&mut self, changes: &[NodeChange]) -> usize {
        let applied = self.model.apply_node_patch(changes);
        if applied > 0 {
            self.history.mark_edited();
        }
        self.touched();
        applied
    }

    pub fn apply_edge_patch(&mut self, changes: &[EdgeChange]) -> usize {
        let applied = self.model.apply_edge_patch(changes);
        if applied > 0 {
            self.history.mark_edited();
        }
        self.touched();
        applied
    }

    /// Select a node, or deselect with `None`. Unknown ids deselect.
    pub fn select(&mut self, id: Option<&str>) -> Option<&str> {
        self.model.set_selected(id)
    }

    /// Switch the diagram style used for the next generation and layout.
    pub fn set_style(&mut self, style: DiagramStyle) {
        if style == self.style {
            return;
        }
        self.style = style;
        if !self.model.nodes().is_empty() {
            self.layout.relayout(Instant::now());
        }
    }

    // ── Layout ─────────────────────────────────────────────────────

    /// Request a layout pass regardless of structural change.
    pub fn relayout(&mut self) {
        self.layout.relayout(Instant::now());
    }

    /// Pending debounce deadline, for callers driving their own event loop.
    pub fn layout_deadline(&self) -> Option<Instant> {
        self.layout.scheduler().deadline()
    }

    /// Run the layout engine if its timer has fired.
    pub async fn poll_layout(&mut self) -> Option<LayoutOutcome> {
        self.layout
            .run_due(&mut self.model, self.style, Instant::now())
            .await
    }

    /// Wait for pending layout work to finish.
    pub async fn settle_layout(&mut self) -> Vec<LayoutOutcome> {
        self.layout.settle(&mut self.model, self.style).await
    }

    // ── Internals ──────────────────────────────────────────────────

    fn ensure_idle(&self) -> std::result::Result<(), SynthesisError> {
        if self.in_flight.is_some() {
            return Err(SynthesisError::Busy);
        }
        Ok(())
    }

    /// Raw ids of children already minted under `parent_id`.
    fn minted_children(&self, parent_id: &str) -> Vec<String> {
        let prefix = format!("{parent_id}-");
        self.model
            .nodes()
            .iter()
            .filter_map(|n| n.id.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    fn append(&mut self, fragment: GraphFragment) {
        for node in fragment.nodes {
            self.model.add_node(node);
        }
        for edge in fragment.edges {
            self.model.add_edge(edge);
        }
    }

    /// Let the layout orchestrator see the current structure.
    fn touched(&mut self) {
        self.layout.observe(&self.model, Instant::now());
    }
}

// ── Tests ──────────────────────────────────────────────────────────
