use std::sync::Arc;

use rag_core::error::{RagError, Result};
use rag_core::traits::ChatModel;
use rag_core::types::{ChatMessage, RankedItem};

/// Information block used when nothing was retrieved.
pub const NO_INFORMATION: &str = "No relevant information found.";
/// Marks an answer that the language model could not produce.
pub const SYNTHESIS_FAILURE_PREFIX: &str = "[answer unavailable]";

/// Grounded answer generation from the ranked chunks.
pub struct AnswerSynthesizer {
    chat_model: Arc<dyn ChatModel>,
    system_prompt: String,
}

impl AnswerSynthesizer {
    pub fn new(chat_model: Arc<dyn ChatModel>, system_prompt: impl Into<String>) -> Self {
        Self { chat_model, system_prompt: system_prompt.into() }
    }

    pub async fn try_synthesize(&self, query: &str, ranked: &[RankedItem]) -> Result<String> {
        let messages = [
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(format!("Question: {}\n\nInformation:\n{}", query, information_block(ranked))),
        ];
        self.chat_model
            .invoke(&messages)
            .await
            .map_err(|e| RagError::Synthesis(format!("{}: {:#}", self.chat_model.name(), e)))
    }

    /// The model's answer, or a marked degraded answer when the call fails.
    pub async fn synthesize(&self, query: &str, ranked: &[RankedItem]) -> String {
        match self.try_synthesize(query, ranked).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(stage = e.stage(), error = %e, "answer synthesis failed");
                degraded_answer(&e)
            }
        }
    }
}

/// Ranked chunk texts in rank order, separated by blank lines.
pub fn information_block(ranked: &[RankedItem]) -> String {
    if ranked.is_empty() {
        return NO_INFORMATION.to_string();
    }
    ranked.iter().map(|r| r.result.text()).collect::<Vec<_>>().join("\n\n")
}

pub fn degraded_answer(error: &RagError) -> String {
    format!("{} The language model could not generate an answer: {}", SYNTHESIS_FAILURE_PREFIX, error)
}
