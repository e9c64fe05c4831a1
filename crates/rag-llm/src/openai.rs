use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use rag_core::traits::ChatModel;
use rag_core::types::ChatMessage;

use crate::{http_client, status_error};

#[derive(Clone)]
pub struct OpenAiChatModel {
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: Option<f64>,
    client: Client,
}

impl OpenAiChatModel {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>, temperature: Option<f64>, timeout_secs: u64) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            temperature,
            client: http_client(timeout_secs)?,
        })
    }

    fn request_body(&self, messages: &[ChatMessage]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });
        if let (Some(obj), Some(t)) = (body.as_object_mut(), self.temperature) {
            obj.insert("temperature".to_string(), json!(t));
        }
        body
    }
}

/// `choices[0].message.content` of a chat-completions payload.
pub(crate) fn parse_content(payload: &Value) -> anyhow::Result<String> {
    if let Some(err) = payload.get("error") {
        let message = err.get("message").and_then(Value::as_str).unwrap_or("unknown error");
        anyhow::bail!("chat completion error: {}", message);
    }
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("chat completion response has no message content"))
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn name(&self) -> &str {
        "openai"
    }

    async fn invoke(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut request = self.client.post(&url).json(&self.request_body(messages));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        tracing::debug!(url = %url, model = %self.model, messages = messages.len(), "chat completion request");
        let res = request.send().await?;
        if !res.status().is_success() {
            return Err(status_error("OpenAI-compatible", res).await);
        }
        let payload: Value = res.json().await?;
        parse_content(&payload)
    }
}
