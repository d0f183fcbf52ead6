// Integration test utilities and fixtures for Mindweave.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mindweave_core::config::MindweaveConfig;
use mindweave_core::error::{LayoutError, LlmError, MindweaveError, Result};
use mindweave_core::layout::{LayeredEngine, LayoutEngine, LayoutRequest, LayoutResult};
use mindweave_core::llm::{CompletionProvider, CompletionRequest, CompletionStream};
use mindweave_core::progress::SynthesisReporter;
use mindweave_core::session::GraphSession;
use mindweave_core::synth::GraphSynthesizer;
use mindweave_core::synth::partial::PartialRevision;

// ── Canned responses ─────────────────────────────────────────────

/// "A causes B causes C" as a timeline.
pub const TIMELINE_CHAIN: &str = r#"{
  "nodes": [
    {"id": "node-1", "label": "A", "kind": "root", "content": "The first cause."},
    {"id": "node-2", "label": "B", "kind": "concept", "content": "Caused by A."},
    {"id": "node-3", "label": "C", "kind": "concept", "content": "Caused by B."}
  ],
  "edges": [
    {"source": "node-1", "target": "node-2", "label": "causes"},
    {"source": "node-2", "target": "node-3", "label": "causes"}
  ]
}"#;

/// A small mindmap rooted at "Photosynthesis" (`node-1`), five nodes.
pub const PHOTOSYNTHESIS_MAP: &str = r#"{
  "nodes": [
    {"id": "node-1", "label": "Photosynthesis", "kind": "root", "content": "How plants make food."},
    {"id": "node-2", "label": "Sunlight", "kind": "concept"},
    {"id": "node-3", "label": "Water", "kind": "concept"},
    {"id": "node-4", "label": "Carbon dioxide", "kind": "concept"},
    {"id": "node-5", "label": "Chloroplasts", "type": "note", "content": "Where it happens."}
  ],
  "edges": [
    {"source": "node-1", "target": "node-2", "label": "needs"},
    {"source": "node-1", "target": "node-3", "label": "needs"},
    {"source": "node-1", "target": "node-4", "label": "needs"},
    {"source": "node-1", "target": "node-5"}
  ]
}"#;

/// Expansion children of "Photosynthesis", with edges from the sentinel.
pub const PHOTOSYNTHESIS_CHILDREN: &str = r#"{
  "nodes": [
    {"id": "expanded-1", "label": "Light reactions", "kind": "concept", "content": "Capture light energy."},
    {"id": "expanded-2", "label": "Calvin cycle", "kind": "concept", "content": "Fixes carbon."},
    {"id": "expanded-3", "label": "Glucose", "kind": "concept", "content": "The product."},
    {"id": "expanded-4", "label": "Oxygen release", "content": "A by-product."}
  ],
  "edges": [
    {"source": "PARENT_NODE", "target": "expanded-1"},
    {"source": "PARENT_NODE", "target": "expanded-2"},
    {"source": "PARENT_NODE", "target": "expanded-3"},
    {"source": "PARENT_NODE", "target": "expanded-4"}
  ]
}"#;

/// An expansion whose last edge targets an undeclared child.
pub const DANGLING_CHILDREN: &str = r#"{
  "nodes": [
    {"id": "expanded-1", "label": "Leaves"},
    {"id": "expanded-2", "label": "Roots"},
    {"id": "expanded-3", "label": "Stems"}
  ],
  "edges": [
    {"source": "PARENT_NODE", "target": "expanded-1"},
    {"source": "PARENT_NODE", "target": "expanded-2"},
    {"source": "PARENT_NODE", "target": "expanded-9"}
  ]
}"#;

// ── Scripted completion provider ─────────────────────────────────

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream the text in `chunks` roughly equal pieces.
    Reply { text: String, chunks: usize },
    /// Fail before streaming anything.
    Refuse(String),
    /// Stream the first `cut` bytes, then fail.
    DropAfter { text: String, cut: usize },
}

impl Script {
    pub fn reply(text: &str) -> Self {
        Self::Reply {
            text: text.to_string(),
            chunks: 7,
        }
    }
}

/// Completion provider that plays back queued [`Script`]s and records the
/// requests it was sent.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            requests: Arc::default(),
        }
    }

    /// Shared log of requests, readable after the provider is boxed away.
    pub fn request_log(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        Arc::clone(&self.requests)
    }
}

fn split_chunks(text: &str, chunks: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = chars.len().div_ceil(chunks.max(1)).max(1);
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

#[async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-1"
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::Refuse("script exhausted".into()));

        match script {
            Script::Reply { text, chunks } => Ok(CompletionStream::from_items(
                split_chunks(&text, chunks).into_iter().map(Ok),
            )),
            Script::Refuse(reason) => Err(MindweaveError::Llm(LlmError::Network(reason))),
            Script::DropAfter { text, cut } => {
                let head: String = text.chars().take(cut).collect();
                Ok(CompletionStream::from_items([
                    Ok(head),
                    Err(MindweaveError::Llm(LlmError::Network("connection reset".into()))),
                ]))
            }
        }
    }
}

// ── Layout engines ───────────────────────────────────────────────

/// How a [`RecordingEngine`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    /// Delegate to the in-process layered engine.
    Layered,
    /// Fail every call.
    Fail,
    /// Drop the position of the first requested node.
    Incomplete,
}

/// Layout engine that records every request it receives.
#[derive(Debug)]
pub struct RecordingEngine {
    mode: EngineMode,
    inner: LayeredEngine,
    requests: Mutex<Vec<LayoutRequest>>,
}

impl RecordingEngine {
    pub fn new(mode: EngineMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            inner: LayeredEngine::new(),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<LayoutRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl LayoutEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    async fn layout(&self, request: &LayoutRequest) -> std::result::Result<LayoutResult, LayoutError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.mode {
            EngineMode::Layered => self.inner.layout(request).await,
            EngineMode::Fail => Err(LayoutError::Engine("engine unavailable".into())),
            EngineMode::Incomplete => {
                let mut result = self.inner.layout(request).await?;
                if let Some(first) = request.nodes.first() {
                    result.positions.remove(&first.id);
                }
                Ok(result)
            }
        }
    }
}

// ── Progress ─────────────────────────────────────────────────────

/// Reporter that keeps every partial revision's counts.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    revisions: Mutex<Vec<(usize, usize)>>,
    finished: Mutex<bool>,
}

impl RecordingReporter {
    pub fn revisions(&self) -> Vec<(usize, usize)> {
        self.revisions.lock().unwrap().clone()
    }

    pub fn finished(&self) -> bool {
        *self.finished.lock().unwrap()
    }
}

impl SynthesisReporter for RecordingReporter {
    fn start(&self, _task: &str) {}

    fn revision(&self, revision: &PartialRevision) {
        self.revisions
            .lock()
            .unwrap()
            .push((revision.nodes, revision.edges));
    }

    fn finish(&self) {
        *self.finished.lock().unwrap() = true;
    }

    fn message(&self, _msg: &str) {}
}

// ── Sessions ─────────────────────────────────────────────────────

/// A session over a scripted provider and the given engine.
pub fn scripted_session(
    scripts: impl IntoIterator<Item = Script>,
    engine: Arc<dyn LayoutEngine>,
) -> GraphSession {
    scripted_session_with(scripts, engine, &MindweaveConfig::default())
}

pub fn scripted_session_with(
    scripts: impl IntoIterator<Item = Script>,
    engine: Arc<dyn LayoutEngine>,
    config: &MindweaveConfig,
) -> GraphSession {
    let provider = ScriptedProvider::new(scripts);
    let synthesizer = GraphSynthesizer::new(
        Box::new(provider),
        config.llm.clone(),
        config.expansion.clone(),
    );
    GraphSession::new(synthesizer, engine, config)
}

/// Parse a canned response.
pub fn response(text: &str) -> mindweave_core::synth::schema::GraphResponse {
    serde_json::from_str(text).expect("fixture parses")
}
