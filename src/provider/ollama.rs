//! Ollama backend: native `/api/*` endpoints.
//!
//! Streaming uses `/api/chat`, which emits one JSON object per line; the final
//! object has `done: true` and carries the token counts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    body_lines, check_status, format_error, http_error, ChatMessage, CompletionMeta, ModelAdmin,
    ModelInfo, ProviderError, RunningModel, StreamCallbacks, StreamRequest, StreamingProvider,
};
use crate::config::Host;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatFrame {
    #[serde(default)]
    message: Option<FrameMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    eval_count: u64,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FrameMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct Tags {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    #[serde(default)]
    name: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    details: Option<TagDetails>,
}

#[derive(Debug, Deserialize)]
struct TagDetails {
    #[serde(default)]
    parameter_size: Option<String>,
    #[serde(default)]
    quantization_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Ps {
    #[serde(default)]
    models: Vec<PsModel>,
}

#[derive(Debug, Deserialize)]
struct PsModel {
    #[serde(default)]
    name: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    size_vram: u64,
}

/// Listings carry `name` and usually `model`; older servers sent only one of them.
fn listed_name(name: String, model: Option<String>) -> String {
    if name.is_empty() {
        model.unwrap_or_default()
    } else {
        name
    }
}

/// Client for an Ollama server.
pub struct OllamaBackend {
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| http_error(url, e))?;
        check_status(url, response).await
    }

    async fn has_model(&self, host: &Host, model: &str) -> Result<bool, ProviderError> {
        let models = self.list_models(host).await?;
        Ok(models.iter().any(|m| same_model(&m.name, model)))
    }
}

/// Ollama reports untagged models with an implicit `:latest`.
fn same_model(listed: &str, wanted: &str) -> bool {
    listed == wanted
        || listed.strip_suffix(":latest") == Some(wanted)
        || wanted.strip_suffix(":latest") == Some(listed)
}

#[async_trait]
impl StreamingProvider for OllamaBackend {
    async fn ensure_model_ready(&self, host: &Host, model: &str) -> Result<(), ProviderError> {
        if !self.has_model(host, model).await? {
            tracing::info!(host = %host.name, model, "model missing, pulling");
            self.pull_model(host, model).await?;
        }
        // An empty prompt loads the model without generating.
        let url = format!("{}/api/generate", host.base_url());
        self.post_json(&url, &serde_json::json!({ "model": model, "prompt": "", "stream": false }))
            .await?;
        Ok(())
    }

    async fn stream(
        &self,
        request: &StreamRequest,
        callbacks: &mut dyn StreamCallbacks,
    ) -> Result<(), ProviderError> {
        let url = format!("{}/api/chat", request.host.base_url());
        let body = ChatRequest {
            model: &request.model,
            messages: &request.history,
            stream: true,
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| http_error(&url, e))?;
        let response = check_status(&url, response).await?;

        let mut lines = body_lines(response);
        while let Some(line) = lines.next_line().await.map_err(|e| format_error(&url, e))? {
            if line.trim().is_empty() {
                continue;
            }
            let frame: ChatFrame =
                serde_json::from_str(&line).map_err(|e| format_error(&url, e))?;
            if let Some(error) = frame.error {
                return Err(format_error(&url, error));
            }
            if let Some(message) = frame.message {
                if !message.content.is_empty() {
                    callbacks.on_chunk(&message.content)?;
                }
            }
            if frame.done {
                return callbacks.on_complete(CompletionMeta {
                    eval_count: frame.eval_count,
                    prompt_eval_count: frame.prompt_eval_count,
                });
            }
        }
        Err(format_error(&url, "stream ended without a done frame"))
    }
}

#[async_trait]
impl ModelAdmin for OllamaBackend {
    async fn list_models(&self, host: &Host) -> Result<Vec<ModelInfo>, ProviderError> {
        let url = format!("{}/api/tags", host.base_url());
        let response = self.client.get(&url).send().await.map_err(|e| http_error(&url, e))?;
        let tags: Tags = check_status(&url, response)
            .await?
            .json()
            .await
            .map_err(|e| format_error(&url, e))?;
        Ok(tags
            .models
            .into_iter()
            .map(|m| {
                let (parameter_size, quantization) = m
                    .details
                    .map(|d| (d.parameter_size, d.quantization_level))
                    .unwrap_or((None, None));
                ModelInfo {
                    name: listed_name(m.name, m.model),
                    size_bytes: m.size,
                    parameter_size,
                    quantization,
                }
            })
            .collect())
    }

    async fn pull_model(&self, host: &Host, model: &str) -> Result<(), ProviderError> {
        let url = format!("{}/api/pull", host.base_url());
        let response = self
            .post_json(&url, &serde_json::json!({ "model": model, "stream": false }))
            .await?;
        let status: serde_json::Value = response.json().await.map_err(|e| format_error(&url, e))?;
        if let Some(error) = status.get("error").and_then(|e| e.as_str()) {
            return Err(format_error(&url, error));
        }
        Ok(())
    }

    async fn delete_model(&self, host: &Host, model: &str) -> Result<(), ProviderError> {
        let url = format!("{}/api/delete", host.base_url());
        let response = self
            .client
            .delete(&url)
            .json(&serde_json::json!({ "model": model }))
            .send()
            .await
            .map_err(|e| http_error(&url, e))?;
        check_status(&url, response).await?;
        Ok(())
    }

    async fn unload_model(&self, host: &Host, model: &str) -> Result<(), ProviderError> {
        let url = format!("{}/api/generate", host.base_url());
        self.post_json(&url, &serde_json::json!({ "model": model, "keep_alive": 0 }))
            .await?;
        Ok(())
    }

    async fn running_models(&self, host: &Host) -> Result<Vec<RunningModel>, ProviderError> {
        let url = format!("{}/api/ps", host.base_url());
        let response = self.client.get(&url).send().await.map_err(|e| http_error(&url, e))?;
        let ps: Ps = check_status(&url, response)
            .await?
            .json()
            .await
            .map_err(|e| format_error(&url, e))?;
        Ok(ps
            .models
            .into_iter()
            .map(|m| RunningModel {
                name: listed_name(m.name, m.model),
                size_vram_bytes: m.size_vram,
            })
            .collect())
    }

    async fn model_parameters(
        &self,
        host: &Host,
        model: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/api/show", host.base_url());
        let response = self.post_json(&url, &serde_json::json!({ "model": model })).await?;
        response.json().await.map_err(|e| format_error(&url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_tag_is_implicit() {
        assert!(same_model("llama3.2:latest", "llama3.2"));
        assert!(same_model("llama3.2", "llama3.2:latest"));
        assert!(same_model("llama3.2:1b", "llama3.2:1b"));
        assert!(!same_model("llama3.2:1b", "llama3.2"));
    }

    #[test]
    fn test_final_frame_parses_counts() {
        let frame: ChatFrame = serde_json::from_str(
            r#"{"model":"m","message":{"role":"assistant","content":""},"done":true,"eval_count":42,"prompt_eval_count":7}"#,
        )
        .unwrap();
        assert!(frame.done);
        assert_eq!(frame.eval_count, 42);
        assert_eq!(frame.prompt_eval_count, 7);
    }

    #[test]
    fn test_tags_fall_back_to_model_key() {
        let tags: Tags = serde_json::from_str(
            r#"{"models":[{"model":"qwen2.5:7b","size":4683087332,"details":{"parameter_size":"7.6B","quantization_level":"Q4_K_M"}}]}"#,
        )
        .unwrap();
        let first = &tags.models[0];
        assert_eq!(listed_name(first.name.clone(), first.model.clone()), "qwen2.5:7b");
        assert_eq!(
            tags.models[0].details.as_ref().and_then(|d| d.parameter_size.as_deref()),
            Some("7.6B")
        );
    }

    #[test]
    fn test_tags_with_name_and_model_keys() {
        let tags: Tags = serde_json::from_str(
            r#"{"models":[{"name":"llama3.2:1b","model":"llama3.2:1b","size":1,"details":{}}]}"#,
        )
        .unwrap();
        let m = tags.models.into_iter().next().unwrap();
        assert_eq!(listed_name(m.name, m.model), "llama3.2:1b");
    }

    #[test]
    fn test_ps_with_name_and_model_keys() {
        let ps: Ps = serde_json::from_str(
            r#"{"models":[{"name":"qwen2.5:7b","model":"qwen2.5:7b","size_vram":5137025024,"expires_at":"2024-06-04T14:38:31Z"}]}"#,
        )
        .unwrap();
        let m = ps.models.into_iter().next().unwrap();
        assert_eq!(m.size_vram, 5_137_025_024);
        assert_eq!(listed_name(m.name, m.model), "qwen2.5:7b");
    }
}
