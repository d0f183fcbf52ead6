use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::DiagramStyle;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "mindweave.toml";

/// Values accepted for `llm.provider`.
pub const PROVIDERS: &[&str] = &["anthropic", "openai", "custom"];

/// Top-level Mindweave configuration, matching `mindweave.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MindweaveConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub diagram: DiagramSection,
    #[serde(default)]
    pub layout: LayoutSection,
    #[serde(default)]
    pub expansion: ExpansionSection,
    #[serde(default)]
    pub history: HistorySection,
}

impl MindweaveConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "llm.provider must be one of {}, got {:?}",
                PROVIDERS.join(", "),
                self.llm.provider
            )));
        }
        // Undo checkpoints the live graph before stepping back, which needs
        // room for two entries.
        if self.history.capacity < 2 {
            return Err(ConfigError::Invalid(
                "history.capacity must be at least 2".into(),
            ));
        }
        if self.layout.node_width <= 0.0 || self.layout.node_height <= 0.0 {
            return Err(ConfigError::Invalid(
                "layout node size must be positive".into(),
            ));
        }
        if self.expansion.min_children == 0 {
            return Err(ConfigError::Invalid(
                "expansion.min_children must be at least 1".into(),
            ));
        }
        if self.expansion.min_children > self.expansion.max_children {
            return Err(ConfigError::Invalid(format!(
                "expansion.min_children ({}) exceeds max_children ({})",
                self.expansion.min_children, self.expansion.max_children
            )));
        }
        if self.expansion.sentinel.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "expansion.sentinel must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// `openai`, `anthropic`, or `custom` (OpenAI-compatible).
    pub provider: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            temperature: 0.0,
            max_tokens: 4096,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramSection {
    pub style: DiagramStyle,
}

/// Flow direction for layered layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Down,
    Right,
    Up,
    Left,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Down => "DOWN",
            Self::Right => "RIGHT",
            Self::Up => "UP",
            Self::Left => "LEFT",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSection {
    pub node_width: f64,
    pub node_height: f64,
    pub node_spacing: f64,
    pub layer_spacing: f64,
    pub debounce_ms: u64,
    /// Direction of mindmap layouts; timelines always flow right.
    pub direction: Direction,
}

impl Default for LayoutSection {
    fn default() -> Self {
        Self {
            node_width: 250.0,
            node_height: 150.0,
            node_spacing: 80.0,
            layer_spacing: 100.0,
            debounce_ms: 150,
            direction: Direction::Down,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionSection {
    pub spacing_x: f64,
    pub spacing_y: f64,
    pub min_children: usize,
    pub max_children: usize,
    /// Placeholder source id the model uses for the expanded node.
    pub sentinel: String,
}

impl Default for ExpansionSection {
    fn default() -> Self {
        Self {
            spacing_x: 280.0,
            spacing_y: 200.0,
            min_children: 3,
            max_children: 5,
            sentinel: "PARENT_NODE".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySection {
    pub capacity: usize,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            capacity: crate::history::DEFAULT_CAPACITY,
        }
    }
}
