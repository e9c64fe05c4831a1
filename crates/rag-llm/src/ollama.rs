use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use rag_core::traits::ChatModel;
use rag_core::types::ChatMessage;

use crate::{http_client, status_error};

#[derive(Clone)]
pub struct OllamaChatModel {
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

impl OllamaChatModel {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: http_client(timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChatModel {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn invoke(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });
        tracing::debug!(url = %url, model = %self.model, messages = messages.len(), "ollama chat request");
        let res = self.client.post(&url).json(&body).send().await?;
        if !res.status().is_success() {
            return Err(status_error("Ollama", res).await);
        }
        let payload: OllamaChatResponse = res.json().await?;
        if let Some(error) = payload.error {
            anyhow::bail!("Ollama chat error: {}", error);
        }
        payload
            .message
            .map(|m| m.content)
            .ok_or_else(|| anyhow::anyhow!("Ollama response has no message"))
    }
}
