pub mod providers;
pub mod sse;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A structured-completion request: prompts plus the JSON schema the
/// response object must satisfy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    /// JSON schema of the expected object.
    pub schema: serde_json::Value,
    /// Name the schema is registered under with providers that require one.
    pub schema_name: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Lazy stream of text deltas for one request.
///
/// Backed by a bounded channel fed by a reader task. Dropping the stream
/// closes the channel, which stops the reader on its next send.
#[derive(Debug)]
pub struct CompletionStream {
    rx: mpsc::Receiver<crate::error::Result<String>>,
}

impl CompletionStream {
    /// A connected sender/stream pair.
    pub fn channel(buffer: usize) -> (mpsc::Sender<crate::error::Result<String>>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx })
    }

    /// A stream that yields the given items and then ends.
    pub fn from_items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = crate::error::Result<String>>,
    {
        let items: Vec<_> = items.into_iter().collect();
        let (tx, stream) = Self::channel(items.len());
        for item in items {
            // Capacity equals the item count, so this cannot fail.
            let _ = tx.try_send(item);
        }
        stream
    }

    /// Next text delta, or `None` once the provider has finished.
    pub async fn next_delta(&mut self) -> Option<crate::error::Result<String>> {
        self.rx.recv().await
    }
}

/// Common interface for structured-completion providers.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync + std::fmt::Debug {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// The model ID being used.
    fn model_id(&self) -> &str;

    /// Start a streamed completion. Errors here are connection or HTTP
    /// status failures; failures mid-stream arrive as stream items.
    async fn stream(
        &self,
        request: &CompletionRequest,
    ) -> crate::error::Result<CompletionStream>;
}
