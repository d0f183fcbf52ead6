/// Top-level Mindweave error type.
///
/// All fallible operations in `mindweave-core` return [`Result<T, MindweaveError>`](Result).
/// Each variant wraps a domain-specific error enum, allowing callers to
/// match on the error source without losing type information.
#[derive(thiserror::Error, Debug)]
pub enum MindweaveError {
    /// A synthesis request was rejected or its response could not be committed.
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    /// Error communicating with a completion provider.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// The layout engine failed or returned unusable output.
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl MindweaveError {
    /// True for failures of the transport or of the response shape. The
    /// graph is untouched in both cases and the request may simply be retried.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Llm(_) | Self::Synthesis(SynthesisError::Schema(_))
        )
    }
}

/// Errors raised while requesting or committing a structured completion.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SynthesisError {
    /// Neither free text nor an expansion target was supplied.
    #[error("Content or an expansion target is required")]
    EmptyInput,

    /// Another generation or expansion is still in flight.
    #[error("A synthesis request is already in flight")]
    Busy,

    /// The expansion target is not present in the graph.
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// The completion does not conform to the graph schema.
    #[error("Response does not match the graph schema: {0}")]
    Schema(String),

    /// An edge refers to a node id absent from the committed node set.
    #[error("Edge {from} -> {to} references a missing node")]
    DanglingEdge {
        /// Source id as it appeared in the response.
        from: String,
        /// Target id as it appeared in the response.
        to: String,
    },

    /// A node id is declared twice, or a minted id already exists.
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    /// The request was cancelled or superseded before it completed.
    #[error("Request was cancelled")]
    Cancelled,
}

/// Errors from completion provider interactions.
#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    /// Network-level failure connecting to the provider.
    #[error("Network error: {0}")]
    Network(String),

    /// Provider API returned a non-success HTTP status.
    #[error("API error (HTTP {status}): {body}")]
    ApiError {
        /// HTTP status code from the provider.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// Stream payload could not be parsed.
    #[error("Response parse error: {0}")]
    Parse(String),

    /// Provider configuration is missing or invalid (API key, model, etc.).
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors from the layout engine. Never fatal to the session.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// There is nothing to lay out.
    #[error("Graph is empty")]
    EmptyGraph,

    /// The engine itself failed.
    #[error("Layout engine failed: {0}")]
    Engine(String),

    /// The engine returned no position for some requested nodes.
    #[error("Layout result is missing {} node position(s)", missing.len())]
    Incomplete {
        /// Node ids without a position.
        missing: Vec<String>,
    },
}

/// Errors in Mindweave configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convenience alias for `Result<T, MindweaveError>`.
pub type Result<T> = std::result::Result<T, MindweaveError>;
