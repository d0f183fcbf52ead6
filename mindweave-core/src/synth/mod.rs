//! Graph Synthesizer: turns text or an expansion target into a streamed
//! structured completion and validates the final object.
//!
//! Partial revisions are reported for progress only; nothing is committed
//! until the stream has finished and the full text parses against the schema.

pub mod merge;
pub mod partial;
pub mod prompt;
pub mod schema;

use tracing::{debug, info, instrument};

use crate::config::{ExpansionSection, LlmSection};
use crate::error::SynthesisError;
use crate::llm::{CompletionProvider, CompletionRequest};
use crate::progress::SynthesisReporter;
use crate::types::{DiagramStyle, Node};

use partial::RevisionTracker;
use schema::{GraphResponse, SCHEMA_NAME, graph_schema, parse_response};

/// Builds requests for, and drains completions from, a [`CompletionProvider`].
#[derive(Debug)]
pub struct GraphSynthesizer {
    provider: Box<dyn CompletionProvider>,
    llm: LlmSection,
    expansion: ExpansionSection,
    schema: serde_json::Value,
}

impl GraphSynthesizer {
    pub fn new(
        provider: Box<dyn CompletionProvider>,
        llm: LlmSection,
        expansion: ExpansionSection,
    ) -> Self {
        Self {
            provider,
            llm,
            expansion,
            schema: graph_schema(),
        }
    }

    pub fn provider(&self) -> &dyn CompletionProvider {
        &*self.provider
    }

    pub fn expansion(&self) -> &ExpansionSection {
        &self.expansion
    }

    /// Request for a top-level generation. Blank content is an input error.
    pub fn generation_request(
        &self,
        content: &str,
        style: DiagramStyle,
    ) -> Result<CompletionRequest, SynthesisError> {
        if content.trim().is_empty() {
            return Err(SynthesisError::EmptyInput);
        }
        Ok(CompletionRequest {
            system: prompt::build_system_prompt(style, &self.schema),
            user: prompt::build_generate_user_prompt(content),
            schema: self.schema.clone(),
            schema_name: SCHEMA_NAME.to_string(),
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
        })
    }

    /// Request for expanding `parent`. `taken` lists raw child ids already
    /// minted under this parent.
    pub fn expansion_request(
        &self,
        parent: &Node,
        taken: &[String],
    ) -> Result<CompletionRequest, SynthesisError> {
        if parent.label.trim().is_empty() {
            return Err(SynthesisError::EmptyInput);
        }
        Ok(CompletionRequest {
            system: prompt::build_expand_prompt(
                &parent.label,
                &self.expansion.sentinel,
                self.expansion.min_children,
                self.expansion.max_children,
                taken,
                &self.schema,
            ),
            user: prompt::build_expand_user_prompt(&parent.label),
            schema: self.schema.clone(),
            schema_name: SCHEMA_NAME.to_string(),
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
        })
    }

    /// Stream a completion to the end and parse the final object.
    #[instrument(skip_all, name = "synthesize", fields(provider = self.provider.name()))]
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        reporter: &dyn SynthesisReporter,
    ) -> crate::error::Result<GraphResponse> {
        let mut stream = self.provider.stream(request).await?;
        let mut tracker = RevisionTracker::default();
        let mut deltas = 0u64;

        while let Some(delta) = stream.next_delta().await {
            let delta = delta?;
            deltas += 1;
            if let Some(revision) = tracker.push(&delta) {
                debug!(nodes = revision.nodes, edges = revision.edges, "Partial revision");
                reporter.revision(&revision);
            }
        }

        let response = parse_response(tracker.text())?;
        info!(
            deltas,
            nodes = response.nodes.len(),
            edges = response.edges.len(),
            model = self.provider.model_id(),
            "Completion finished"
        );
        Ok(response)
    }
}
