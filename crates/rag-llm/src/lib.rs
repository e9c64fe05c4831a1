//! HTTP chat clients implementing `ChatModel`.
//!
//! - `OpenAiChatModel`: any OpenAI-compatible `/chat/completions` endpoint
//!   (OpenAI, LM Studio, vLLM, llama.cpp server, Ollama's `/v1`)
//! - `OllamaChatModel`: Ollama's native `/api/chat`
mod ollama;
mod openai;

pub use ollama::OllamaChatModel;
pub use openai::OpenAiChatModel;

use std::time::Duration;

pub(crate) fn http_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs.max(1))).build()?)
}

/// Error for a non-success HTTP status, including whatever body came back.
pub(crate) async fn status_error(provider: &str, res: reqwest::Response) -> anyhow::Error {
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    anyhow::anyhow!("{} chat error ({}): {}", provider, status, text.trim())
}
