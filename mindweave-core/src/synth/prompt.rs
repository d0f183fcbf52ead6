//! Prompt templates for initial generation and node expansion.

use crate::types::DiagramStyle;

const BASE_PROMPT: &str = "You are an expert knowledge architect. Transform the user's input \
into a structured knowledge graph. Decompose complex ideas into atomic concepts linked by \
hierarchical or causal relationships.\n\n\
Generate unique IDs for each node using a format like \"node-1\", \"node-2\", etc.\n\
The first node should be the root node with kind \"root\".\n\
All other nodes should have kind \"concept\" unless they are brief notes which should have kind \"note\".\n\
Provide a brief, informative content description for each node (1-2 sentences, supports Markdown).";

fn style_guidance(style: DiagramStyle) -> &'static str {
    match style {
        DiagramStyle::Mindmap => {
            "For Mind Maps: Focus on hierarchical expansion. Create a root concept in the center \
             with sub-concepts branching out. Organize information in a tree-like structure with \
             clear parent-child relationships."
        }
        DiagramStyle::Timeline => {
            "For Timelines: Identify dates and chronological events. Connect them linearly. \
             Structure the graph to show temporal progression with nodes representing key events \
             or milestones."
        }
        DiagramStyle::Quadrant => {
            "For Quadrants: Identify two opposing axes (e.g., Impact vs Effort, Urgency vs \
             Importance) and categorize entities into four distinct groups. Create nodes that \
             represent items in each quadrant."
        }
    }
}

fn schema_block(schema: &serde_json::Value) -> String {
    let pretty = serde_json::to_string_pretty(schema).unwrap_or_default();
    format!("Respond with a single JSON object matching this schema:\n{pretty}")
}

/// System prompt for a top-level generation in the given style.
pub fn build_system_prompt(style: DiagramStyle, schema: &serde_json::Value) -> String {
    format!(
        "{BASE_PROMPT}\n\n{guidance}\n\n{schema}",
        guidance = style_guidance(style),
        schema = schema_block(schema),
    )
}

/// System prompt for expanding one node.
///
/// `taken` lists raw child ids already used under this parent so that a
/// repeated expansion does not mint colliding ids.
pub fn build_expand_prompt(
    label: &str,
    sentinel: &str,
    min_children: usize,
    max_children: usize,
    taken: &[String],
    schema: &serde_json::Value,
) -> String {
    let avoid = if taken.is_empty() {
        String::new()
    } else {
        format!("\nDo not use any of these IDs: {}.", taken.join(", "))
    };

    format!(
        "Expand on the concept: \"{label}\"\n\n\
         Generate {min_children}-{max_children} child nodes that are direct subconcepts, \
         examples, or related ideas of this concept.\n\
         Each child node should have:\n\
         - A unique ID (e.g., \"expanded-1\", \"expanded-2\"){avoid}\n\
         - A concise label (2-5 words)\n\
         - Kind \"concept\"\n\
         - Brief content (1-2 sentences)\n\n\
         Also generate edges from a source node with id \"{sentinel}\" to each of the new child nodes.\n\n\
         {schema}",
        schema = schema_block(schema),
    )
}

pub fn build_generate_user_prompt(content: &str) -> String {
    format!("Transform this content into a knowledge graph:\n\n{content}")
}

pub fn build_expand_user_prompt(label: &str) -> String {
    format!("Expand on: {label}")
}

// ── Tests ──────────────────────────────────────────────────────────
