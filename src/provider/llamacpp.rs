//! llama.cpp server backend: OpenAI-compatible `/v1/*` endpoints.
//!
//! A llama.cpp server serves the model it was started with. It cannot pull,
//! delete or unload models over HTTP, so those operations are reported as
//! unsupported.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    body_lines, check_status, format_error, http_error, ChatMessage, CompletionMeta, ModelAdmin,
    ModelInfo, ProviderError, RunningModel, StreamCallbacks, StreamRequest, StreamingProvider,
};
use crate::config::{Host, HostKind};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    stream_options: StreamOptions,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct ChunkFrame {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    timings: Option<Timings>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Timings {
    #[serde(default)]
    prompt_n: u64,
    #[serde(default)]
    predicted_n: u64,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ListedModel>,
}

#[derive(Debug, Deserialize)]
struct ListedModel {
    id: String,
    #[serde(default)]
    meta: Option<ListedMeta>,
}

#[derive(Debug, Deserialize)]
struct ListedMeta {
    #[serde(default)]
    size: u64,
    #[serde(default)]
    n_params: u64,
}

/// Token counts seen so far in one stream, preferring `usage` over `timings`.
#[derive(Debug, Default)]
struct CountTracker {
    usage: Option<Usage>,
    timings: Option<Timings>,
    chunks: u64,
}

impl CountTracker {
    fn observe(&mut self, frame: &ChunkFrame) {
        if frame.usage.is_some() {
            self.usage = frame.usage;
        }
        if frame.timings.is_some() {
            self.timings = frame.timings;
        }
    }

    fn meta(&self) -> CompletionMeta {
        match (self.usage, self.timings) {
            (Some(u), _) => CompletionMeta {
                eval_count: u.completion_tokens,
                prompt_eval_count: u.prompt_tokens,
            },
            (None, Some(t)) => CompletionMeta {
                eval_count: t.predicted_n,
                prompt_eval_count: t.prompt_n,
            },
            // One chunk per token is the server's default streaming granularity.
            (None, None) => CompletionMeta {
                eval_count: self.chunks,
                prompt_eval_count: 0,
            },
        }
    }
}

/// Client for a llama.cpp `llama-server`.
pub struct LlamaCppBackend {
    client: reqwest::Client,
}

impl LlamaCppBackend {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn unsupported(operation: &'static str) -> ProviderError {
        ProviderError::Unsupported {
            backend: HostKind::LlamaCpp,
            operation,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ProviderError> {
        let response = self.client.get(url).send().await.map_err(|e| http_error(url, e))?;
        check_status(url, response)
            .await?
            .json()
            .await
            .map_err(|e| format_error(url, e))
    }
}

/// Served model ids are often file paths; match on the path tail as well.
fn serves_model(id: &str, wanted: &str) -> bool {
    if id == wanted {
        return true;
    }
    let tail = id.rsplit(['/', '\\']).next().unwrap_or(id);
    tail == wanted || tail.strip_suffix(".gguf") == Some(wanted)
}

#[async_trait]
impl StreamingProvider for LlamaCppBackend {
    async fn ensure_model_ready(&self, host: &Host, model: &str) -> Result<(), ProviderError> {
        let url = format!("{}/health", host.base_url());
        let response = self.client.get(&url).send().await.map_err(|e| http_error(&url, e))?;
        check_status(&url, response).await?;

        let models = self.list_models(host).await?;
        if models.iter().any(|m| serves_model(&m.name, model)) {
            Ok(())
        } else {
            Err(ProviderError::ModelUnavailable {
                host: host.name.clone(),
                model: model.to_string(),
            })
        }
    }

    async fn stream(
        &self,
        request: &StreamRequest,
        callbacks: &mut dyn StreamCallbacks,
    ) -> Result<(), ProviderError> {
        let url = format!("{}/v1/chat/completions", request.host.base_url());
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: &request.history,
            stream: true,
            stream_options: StreamOptions { include_usage: true },
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| http_error(&url, e))?;
        let response = check_status(&url, response).await?;

        let mut tracker = CountTracker::default();
        let mut lines = body_lines(response);
        while let Some(line) = lines.next_line().await.map_err(|e| format_error(&url, e))? {
            let Some(data) = line.trim().strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                return callbacks.on_complete(tracker.meta());
            }
            let frame: ChunkFrame =
                serde_json::from_str(data).map_err(|e| format_error(&url, e))?;
            tracker.observe(&frame);
            let content = frame
                .choices
                .first()
                .and_then(|c| c.delta.as_ref())
                .and_then(|d| d.content.as_deref())
                .unwrap_or_default();
            if !content.is_empty() {
                tracker.chunks += 1;
                callbacks.on_chunk(content)?;
            }
        }
        Err(format_error(&url, "stream ended without [DONE]"))
    }
}

#[async_trait]
impl ModelAdmin for LlamaCppBackend {
    async fn list_models(&self, host: &Host) -> Result<Vec<ModelInfo>, ProviderError> {
        let url = format!("{}/v1/models", host.base_url());
        let list: ModelList = self.get_json(&url).await?;
        Ok(list
            .data
            .into_iter()
            .map(|m| {
                let (size_bytes, n_params) = m.meta.map(|meta| (meta.size, meta.n_params)).unwrap_or((0, 0));
                ModelInfo {
                    name: m.id,
                    size_bytes,
                    parameter_size: (n_params > 0).then(|| n_params.to_string()),
                    quantization: None,
                }
            })
            .collect())
    }

    async fn pull_model(&self, _host: &Host, _model: &str) -> Result<(), ProviderError> {
        Err(Self::unsupported("pull"))
    }

    async fn delete_model(&self, _host: &Host, _model: &str) -> Result<(), ProviderError> {
        Err(Self::unsupported("delete"))
    }

    async fn unload_model(&self, _host: &Host, _model: &str) -> Result<(), ProviderError> {
        Err(Self::unsupported("unload"))
    }

    async fn running_models(&self, host: &Host) -> Result<Vec<RunningModel>, ProviderError> {
        // The served model is resident for the lifetime of the server.
        Ok(self
            .list_models(host)
            .await?
            .into_iter()
            .map(|m| RunningModel {
                name: m.name,
                size_vram_bytes: 0,
            })
            .collect())
    }

    async fn model_parameters(
        &self,
        host: &Host,
        _model: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/props", host.base_url());
        self.get_json(&url).await
    }
}
