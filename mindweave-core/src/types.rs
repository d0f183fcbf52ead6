use serde::{Deserialize, Serialize};

// ── Node types ─────────────────────────────────────────────────────

/// Visual role of a node in the concept graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// The central concept of a top-level generation.
    Root,
    /// An atomic idea derived from the input.
    #[default]
    Concept,
    /// A brief annotation.
    Note,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Concept => "concept",
            Self::Note => "note",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 2D coordinates in layout units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rendered size reported by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

/// A concept node. `position` stays at the origin until the first layout pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    /// Markdown-capable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub position: Position,
    /// Measured size, when the surface has reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            content: None,
            position: Position::ORIGIN,
            dimensions: None,
        }
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        self.content = (!content.is_empty()).then_some(content);
        self
    }

    #[must_use]
    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}

// ── Edge types ─────────────────────────────────────────────────────

/// A directed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            label: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label.filter(|l| !l.is_empty());
        self
    }
}

// ── Diagram style ──────────────────────────────────────────────────

/// Diagram style selector. Shapes both the prompt and the layout algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramStyle {
    #[default]
    Mindmap,
    Timeline,
    Quadrant,
}

impl DiagramStyle {
    pub const ALL: [Self; 3] = [Self::Mindmap, Self::Timeline, Self::Quadrant];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mindmap => "mindmap",
            Self::Timeline => "timeline",
            Self::Quadrant => "quadrant",
        }
    }
}

impl std::fmt::Display for DiagramStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DiagramStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mindmap" | "mind-map" => Ok(Self::Mindmap),
            "timeline" => Ok(Self::Timeline),
            "quadrant" => Ok(Self::Quadrant),
            other => Err(format!(
                "Unknown diagram style: {other}. Use: mindmap, timeline, quadrant"
            )),
        }
    }
}

/// Node and edge counts, the structural signature watched by the layout orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphCounts {
    pub nodes: usize,
    pub edges: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_parses_case_insensitively() {
        assert_eq!("Timeline".parse::<DiagramStyle>(), Ok(DiagramStyle::Timeline));
        assert_eq!("mind-map".parse::<DiagramStyle>(), Ok(DiagramStyle::Mindmap));
        assert!("gantt".parse::<DiagramStyle>().is_err());
    }

    #[test]
    fn node_kind_defaults_to_concept() {
        assert_eq!(NodeKind::default(), NodeKind::Concept);
        let kind: NodeKind = serde_json::from_str("\"note\"").unwrap();
        assert_eq!(kind, NodeKind::Note);
    }

    #[test]
    fn empty_content_and_label_are_dropped() {
        let node = Node::new("n", NodeKind::Root, "Root").with_content("");
        assert_eq!(node.content, None);

        let edge = Edge::new("e", "a", "b").with_label(Some(String::new()));
        assert_eq!(edge.label, None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_style() -> impl Strategy<Value = DiagramStyle> {
            prop_oneof![
                Just(DiagramStyle::Mindmap),
                Just(DiagramStyle::Timeline),
                Just(DiagramStyle::Quadrant),
            ]
        }

        proptest! {
            #[test]
            fn style_display_parses_back(style in arb_style()) {
                let parsed: DiagramStyle = style.to_string().parse().unwrap();
                prop_assert_eq!(parsed, style);
            }
        }
    }
}
