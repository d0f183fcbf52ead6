use std::fmt::Write as _;

use clap::ValueEnum;

use mindweave_core::surface::GraphView;
use mindweave_core::types::DiagramStyle;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Nodes and edges as JSON
    Json,
    /// Mermaid flowchart
    Mermaid,
    /// Indented plain text
    #[default]
    Text,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

pub fn render(view: &GraphView, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(view)?),
        OutputFormat::Mermaid => Ok(render_mermaid(view)),
        OutputFormat::Text => Ok(render_text(view)),
    }
}

fn mermaid_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn mermaid_label(label: &str) -> String {
    label.replace('"', "#quot;")
}

fn render_mermaid(view: &GraphView) -> String {
    let direction = match view.style {
        DiagramStyle::Timeline => "LR",
        DiagramStyle::Mindmap | DiagramStyle::Quadrant => "TD",
    };
    let mut out = format!("flowchart {direction}\n");
    for node in &view.nodes {
        let _ = writeln!(
            out,
            "    {}[\"{}\"]",
            mermaid_id(&node.id),
            mermaid_label(&node.label)
        );
    }
    for edge in &view.edges {
        let source = mermaid_id(&edge.source);
        let target = mermaid_id(&edge.target);
        let _ = match &edge.label {
            Some(label) => writeln!(out, "    {source} -->|\"{}\"| {target}", mermaid_label(label)),
            None => writeln!(out, "    {source} --> {target}"),
        };
    }
    out
}

fn render_text(view: &GraphView) -> String {
    let mut out = format!(
        "{} graph | nodes: {} | edges: {}\n",
        view.style,
        view.nodes.len(),
        view.edges.len()
    );
    for node in &view.nodes {
        let marker = if view.selected.as_deref() == Some(node.id.as_str()) {
            "*"
        } else {
            " "
        };
        let _ = writeln!(
            out,
            "{marker} {:<24} {:<8} {:<32} ({:.0}, {:.0})",
            node.id,
            node.kind.as_str(),
            node.label, node.position.x, node.position.y
        );
        if let Some(content) = &node.content {
            let _ = writeln!(out, "      {content}");
        }
    }
    if !view.edges.is_empty() {
        out.push('\n');
    }
    for edge in &view.edges {
        let label = edge.label.as_deref().unwrap_or("");
        let _ = writeln!(out, "  {} -> {}  {label}", edge.source, edge.target);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindweave_core::types::{Edge, Node, NodeKind, Position};

    fn view() -> GraphView {
        GraphView {
            nodes: vec![
                Node::new("node-1", NodeKind::Root, "Say \"hi\"").at(Position::new(0.0, 0.0)),
                Node::new("node-2", NodeKind::Concept, "World").at(Position::new(350.0, 0.0)),
            ],
            edges: vec![Edge::new("edge-0", "node-1", "node-2").with_label(Some("to".into()))],
            selected: Some("node-2".into()),
            generating: false,
            can_undo: true,
            can_redo: false,
            style: DiagramStyle::Timeline,
        }
    }

    #[test]
    fn mermaid_uses_style_direction_and_safe_ids() {
        let out = render(&view(), OutputFormat::Mermaid).unwrap();
        assert!(out.starts_with("flowchart LR\n"));
        assert!(out.contains("node_1[\"Say #quot;hi#quot;\"]"));
        assert!(out.contains("node_1 -->|\"to\"| node_2"));
    }

    #[test]
    fn text_marks_selection() {
        let out = render(&view(), OutputFormat::Text).unwrap();
        assert!(out.starts_with("timeline graph | nodes: 2 | edges: 1\n"));
        assert!(out.lines().any(|l| l.starts_with("* node-2")));
        assert!(out.contains("node-1 -> node-2  to"));
    }

    #[test]
    fn json_round_trips_counts() {
        let out = render(&view(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(value["style"], "timeline");
    }
}
