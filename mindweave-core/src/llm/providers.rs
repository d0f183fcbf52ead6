//! Completion providers: OpenAI-compatible and Anthropic streaming endpoints.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{LlmError, MindweaveError};

use super::sse::{SseDecoder, SseEvent};
use super::{CompletionProvider, CompletionRequest, CompletionStream};

/// Deltas buffered between the reader task and the synthesizer.
const STREAM_BUFFER: usize = 64;

/// What a single decoded event contributes to the stream.
#[derive(Debug, PartialEq, Eq)]
enum StreamSignal {
    Text(String),
    Done,
    Skip,
}

type EventDecoder = fn(&SseEvent) -> crate::error::Result<StreamSignal>;

/// reqwest is built without a bundled crypto provider; install aws-lc-rs
/// once before the first client is created.
fn http_client() -> Client {
    if rustls::crypto::CryptoProvider::get_default().is_none()
        && rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .is_err()
    {
        debug!("rustls crypto provider installed concurrently");
    }
    Client::new()
}

fn parse_error(e: &serde_json::Error) -> MindweaveError {
    MindweaveError::Llm(LlmError::Parse(e.to_string()))
}

/// Read the response body chunk by chunk, decode SSE events, and forward
/// text deltas until the provider signals completion or the stream is dropped.
async fn pump_events(
    mut resp: reqwest::Response,
    tx: mpsc::Sender<crate::error::Result<String>>,
    decode: EventDecoder,
) {
    let mut decoder = SseDecoder::default();
    loop {
        let (events, finished) = match resp.chunk().await {
            Ok(Some(bytes)) => (decoder.push(&bytes), false),
            Ok(None) => (decoder.finish().into_iter().collect(), true),
            Err(e) => {
                let _ = tx
                    .send(Err(MindweaveError::Llm(LlmError::Network(e.to_string()))))
                    .await;
                return;
            }
        };

        for event in &events {
            match decode(event) {
                Ok(StreamSignal::Text(text)) => {
                    if tx.send(Ok(text)).await.is_err() {
                        debug!("Completion stream dropped by consumer");
                        return;
                    }
                }
                Ok(StreamSignal::Done) => return,
                Ok(StreamSignal::Skip) => {}
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }

        if finished {
            return;
        }
    }
}

async fn check_status(resp: reqwest::Response) -> crate::error::Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(MindweaveError::Llm(LlmError::ApiError { status, body }))
}

// ── OpenAI Provider ─────────────────────────────────────────────────

#[derive(Debug)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            model,
            base_url: "https://api.openai.com".to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    stream: bool,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Serialize)]
struct JsonSchemaFormat {
    name: String,
    schema: serde_json::Value,
}

#[derive(Deserialize)]
struct OpenAiChunk {
    choices: Vec<OpenAiChunkChoice>,
}

#[derive(Deserialize)]
struct OpenAiChunkChoice {
    #[serde(default)]
    delta: OpenAiDelta,
}

#[derive(Deserialize, Default)]
struct OpenAiDelta {
    content: Option<String>,
}

fn decode_openai_event(event: &SseEvent) -> crate::error::Result<StreamSignal> {
    let data = event.data.trim();
    if data == "[DONE]" {
        return Ok(StreamSignal::Done);
    }
    if data.is_empty() {
        return Ok(StreamSignal::Skip);
    }
    let chunk: OpenAiChunk = serde_json::from_str(data).map_err(|e| parse_error(&e))?;
    let text: String = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .collect();
    if text.is_empty() {
        Ok(StreamSignal::Skip)
    } else {
        Ok(StreamSignal::Text(text))
    }
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
    ) -> crate::error::Result<CompletionStream> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = OpenAiRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: true,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: request.schema_name.clone(),
                    schema: request.schema.clone(),
                },
            },
        };

        debug!(model = %self.model, "Calling OpenAI streaming API");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| MindweaveError::Llm(LlmError::Network(e.to_string())))?;
        let resp = check_status(resp).await?;

        let (tx, stream) = CompletionStream::channel(STREAM_BUFFER);
        tokio::spawn(pump_events(resp, tx, decode_openai_event));
        Ok(stream)
    }
}

// ── Anthropic Provider ──────────────────────────────────────────────

#[derive(Debug)]
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            model,
            base_url: "https://api.anthropic.com".to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    stream: bool,
    system: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct AnthropicEvent {
    #[serde(rename = "type")]
    kind: String,
    delta: Option<AnthropicDelta>,
    error: Option<AnthropicErrorBody>,
}

#[derive(Deserialize)]
struct AnthropicDelta {
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicErrorBody {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

fn decode_anthropic_event(event: &SseEvent) -> crate::error::Result<StreamSignal> {
    if event.data.trim().is_empty() {
        return Ok(StreamSignal::Skip);
    }
    let parsed: AnthropicEvent =
        serde_json::from_str(&event.data).map_err(|e| parse_error(&e))?;
    match parsed.kind.as_str() {
        "content_block_delta" => match parsed.delta {
            Some(AnthropicDelta {
                kind: Some(kind),
                text: Some(text),
            }) if kind == "text_delta" => Ok(StreamSignal::Text(text)),
            _ => Ok(StreamSignal::Skip),
        },
        "message_stop" => Ok(StreamSignal::Done),
        "error" => {
            let (kind, message) = parsed
                .error
                .map_or_else(|| ("unknown".to_string(), String::new()), |e| (e.kind, e.message));
            warn!(kind = %kind, "Anthropic stream error");
            Err(MindweaveError::Llm(LlmError::ApiError {
                status: 500,
                body: format!("{kind}: {message}"),
            }))
        }
        _ => Ok(StreamSignal::Skip),
    }
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
    ) -> crate::error::Result<CompletionStream> {
        let url = format!("{}/v1/messages", self.base_url);

        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: true,
            system: request.system.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.user.clone(),
            }],
        };

        debug!(model = %self.model, "Calling Anthropic streaming API");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| MindweaveError::Llm(LlmError::Network(e.to_string())))?;
        let resp = check_status(resp).await?;

        let (tx, stream) = CompletionStream::channel(STREAM_BUFFER);
        tokio::spawn(pump_events(resp, tx, decode_anthropic_event));
        Ok(stream)
    }
}

// ── Provider Factory ────────────────────────────────────────────────

/// Create a completion provider from configuration.
pub fn create_provider(
    provider: &str,
    model: &str,
    api_key: &str,
    base_url: Option<&str>,
) -> crate::error::Result<Box<dyn CompletionProvider>> {
    match provider {
        "anthropic" => {
            let mut p = AnthropicProvider::new(api_key.to_string(), model.to_string());
            if let Some(url) = base_url {
                p = p.with_base_url(url.to_string());
            }
            Ok(Box::new(p))
        }
        "openai" | "custom" => {
            let mut p = OpenAiProvider::new(api_key.to_string(), model.to_string());
            if let Some(url) = base_url {
                p = p.with_base_url(url.to_string());
            }
            Ok(Box::new(p))
        }
        other => Err(MindweaveError::Llm(LlmError::Config(format!(
            "Unknown provider: {other}. Use: anthropic, openai, custom"
        )))),
    }
}

/// Create a provider from the `[llm]` config section, reading the API key
/// from the configured environment variable.
pub fn provider_from_config(
    section: &crate::config::LlmSection,
) -> crate::error::Result<Box<dyn CompletionProvider>> {
    let api_key = std::env::var(&section.api_key_env).map_err(|_| {
        MindweaveError::Llm(LlmError::Config(format!(
            "api_key not set: environment variable {} is empty",
            section.api_key_env
        )))
    })?;
    create_provider(
        &section.provider,
        &section.model,
        &api_key,
        section.base_url.as_deref(),
    )
}

// ── Tests ───────────────────────────────────────────────────────────
