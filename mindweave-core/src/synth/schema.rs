//! Wire shape of a structured completion and its validation.

use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::SynthesisError;
use crate::types::NodeKind;

/// Name the schema is registered under with providers.
pub const SCHEMA_NAME: &str = "concept_graph";

/// The object a completion must produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GraphResponse {
    pub nodes: Vec<ResponseNode>,
    pub edges: Vec<ResponseEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseNode {
    /// Unique id for the node, e.g. "node-1"
    pub id: String,
    /// The main concept or title
    pub label: String,
    /// Node type for visual hierarchy
    #[serde(default, alias = "type")]
    pub kind: Option<NodeKind>,
    /// A brief summary or definition (Markdown supported)
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseEdge {
    /// ID of the source node
    pub source: String,
    /// ID of the target node
    pub target: String,
    /// Relationship description
    #[serde(default)]
    pub label: Option<String>,
}

impl ResponseNode {
    pub fn kind_or_default(&self) -> NodeKind {
        self.kind.unwrap_or_default()
    }
}

/// JSON schema of [`GraphResponse`], sent with every request.
pub fn graph_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(GraphResponse)).unwrap_or_default()
}

/// Parse the final completion text. Markdown code fences around the
/// object are tolerated; anything else off-schema is a schema error.
pub fn parse_response(text: &str) -> Result<GraphResponse, SynthesisError> {
    let body = strip_code_fence(text.trim());
    if body.is_empty() {
        return Err(SynthesisError::Schema("empty response".into()));
    }
    let response: GraphResponse =
        serde_json::from_str(body).map_err(|e| SynthesisError::Schema(e.to_string()))?;
    check_unique_ids(&response)?;
    Ok(response)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn check_unique_ids(response: &GraphResponse) -> Result<(), SynthesisError> {
    let mut seen = HashSet::with_capacity(response.nodes.len());
    for node in &response.nodes {
        if node.id.trim().is_empty() {
            return Err(SynthesisError::Schema("node with empty id".into()));
        }
        if !seen.insert(node.id.as_str()) {
            return Err(SynthesisError::DuplicateNode(node.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_kind_defaults_to_concept() {
        let response = parse_response(
            r#"{"nodes":[{"id":"a","label":"A","content":"x"},{"id":"b","label":"B","type":"note","content":""}],"edges":[]}"#,
        )
        .unwrap();
        assert_eq!(response.nodes[0].kind_or_default(), NodeKind::Concept);
        assert_eq!(response.nodes[1].kind_or_default(), NodeKind::Note);
    }

    #[test]
    fn fenced_json_is_accepted() {
        let response =
            parse_response("```json\n{\"nodes\":[{\"id\":\"a\",\"label\":\"A\"}],\"edges\":[]}\n```")
                .unwrap();
        assert_eq!(response.nodes.len(), 1);
    }

    #[test]
    fn schema_violations_are_rejected() {
        assert!(matches!(
            parse_response(r#"{"nodes":[{"label":"no id"}],"edges":[]}"#),
            Err(SynthesisError::Schema(_))
        ));
        assert!(matches!(
            parse_response(r#"{"nodes":[]}"#),
            Err(SynthesisError::Schema(_))
        ));
        assert!(matches!(
            parse_response(r#"{"nodes":[{"id":"a","label":"A","kind":"planet"}],"edges":[]}"#),
            Err(SynthesisError::Schema(_))
        ));
        assert!(matches!(parse_response("  "), Err(SynthesisError::Schema(_))));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = parse_response(
            r#"{"nodes":[{"id":"a","label":"A"},{"id":"a","label":"again"}],"edges":[]}"#,
        )
        .unwrap_err();
        assert_eq!(err, SynthesisError::DuplicateNode("a".into()));
    }

    #[test]
    fn schema_describes_nodes_and_edges() {
        let schema = graph_schema();
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "nodes"));
        assert!(required.iter().any(|v| v == "edges"));
        assert!(schema["definitions"]["ResponseNode"].is_object());
    }
}
