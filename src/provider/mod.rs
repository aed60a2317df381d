//! Inference server backends.
//!
//! Two server families are supported, differing in API shape:
//! - Ollama: native `/api/*` endpoints, NDJSON streaming
//! - llama.cpp server: OpenAI-compatible `/v1/*` endpoints, SSE streaming
//!
//! The harness only talks to [`StreamingProvider`]; fleet housekeeping goes through
//! [`ModelAdmin`]. Operations a backend cannot perform return
//! [`ProviderError::Unsupported`] instead of silently succeeding.

mod llamacpp;
mod ollama;

pub use llamacpp::LlamaCppBackend;
pub use ollama::OllamaBackend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Host, HostKind};

/// Errors raised by backends and stream callbacks.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("Malformed response from {url}: {reason}")]
    Format { url: String, reason: String },

    #[error("Model {model} is not available on {host}")]
    ModelUnavailable { host: String, model: String },

    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        backend: HostKind,
        operation: &'static str,
    },

    #[error("Stream callback failed: {0}")]
    Callback(String),

    #[error("Provider setup failed: {0}")]
    Setup(String),
}

impl ProviderError {
    /// True when the backend lacks the capability rather than failing at it.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// One streaming inference call.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub host: Host,
    pub model: String,
    pub history: Vec<ChatMessage>,
}

/// Token counts reported when a stream completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionMeta {
    /// Output tokens generated.
    pub eval_count: u64,
    /// Input tokens evaluated.
    pub prompt_eval_count: u64,
}

/// Receives stream events. An error from either callback aborts the stream.
pub trait StreamCallbacks: Send {
    fn on_chunk(&mut self, chunk: &str) -> Result<(), ProviderError>;
    fn on_complete(&mut self, meta: CompletionMeta) -> Result<(), ProviderError>;
}

/// Executes inference calls against one host.
#[async_trait]
pub trait StreamingProvider: Send + Sync {
    /// Make sure `model` is present and loaded so the first timed probe is not a load.
    async fn ensure_model_ready(&self, host: &Host, model: &str) -> Result<(), ProviderError>;

    /// Run one streaming request, invoking `callbacks` per chunk and once on completion.
    async fn stream(
        &self,
        request: &StreamRequest,
        callbacks: &mut dyn StreamCallbacks,
    ) -> Result<(), ProviderError>;
}

/// A model known to a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub parameter_size: Option<String>,
    #[serde(default)]
    pub quantization: Option<String>,
}

/// A model currently resident on a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningModel {
    pub name: String,
    #[serde(default)]
    pub size_vram_bytes: u64,
}

/// Model housekeeping capability set.
#[async_trait]
pub trait ModelAdmin: Send + Sync {
    async fn list_models(&self, host: &Host) -> Result<Vec<ModelInfo>, ProviderError>;
    async fn pull_model(&self, host: &Host, model: &str) -> Result<(), ProviderError>;
    async fn delete_model(&self, host: &Host, model: &str) -> Result<(), ProviderError>;
    async fn unload_model(&self, host: &Host, model: &str) -> Result<(), ProviderError>;
    async fn running_models(&self, host: &Host) -> Result<Vec<RunningModel>, ProviderError>;
    async fn model_parameters(
        &self,
        host: &Host,
        model: &str,
    ) -> Result<serde_json::Value, ProviderError>;
}

/// Everything the harness needs from one host.
pub trait Backend: StreamingProvider + ModelAdmin {}

impl<T: StreamingProvider + ModelAdmin> Backend for T {}

/// Creates the backend serving a host.
pub trait BackendFactory: Send + Sync {
    fn create(&self, host: &Host) -> Result<Arc<dyn Backend>, ProviderError>;
}

/// Factory for the real HTTP backends.
#[derive(Debug, Clone)]
pub struct HttpBackendFactory {
    timeout: Duration,
}

impl HttpBackendFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpBackendFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl BackendFactory for HttpBackendFactory {
    fn create(&self, host: &Host) -> Result<Arc<dyn Backend>, ProviderError> {
        let client = http_client(self.timeout)?;
        let backend: Arc<dyn Backend> = match host.kind {
            HostKind::Ollama => Arc::new(OllamaBackend::new(client)),
            HostKind::LlamaCpp => Arc::new(LlamaCppBackend::new(client)),
        };
        Ok(backend)
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Setup(format!("HTTP client: {}", e)))
}

/// Fail with [`ProviderError::Status`] unless the response is 2xx.
async fn check_status(
    url: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        url: url.to_string(),
        status,
        body,
    })
}

/// Adapt a response body into an async line reader.
fn body_lines(
    response: reqwest::Response,
) -> tokio::io::Lines<tokio::io::BufReader<impl tokio::io::AsyncRead + Unpin>> {
    use futures::stream::StreamExt;
    use tokio::io::AsyncBufReadExt;

    let byte_stream = response
        .bytes_stream()
        .map(|r| r.map_err(std::io::Error::other));
    let reader = tokio_util::io::StreamReader::new(byte_stream);
    tokio::io::BufReader::new(reader).lines()
}

fn http_error(url: &str, source: reqwest::Error) -> ProviderError {
    ProviderError::Http {
        url: url.to_string(),
        source,
    }
}

fn format_error(url: &str, reason: impl std::fmt::Display) -> ProviderError {
    ProviderError::Format {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}
