//! Query rewriting ahead of vector search.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use rag_core::config::PromptConfig;
use rag_core::error::{RagError, Result};
use rag_core::traits::ChatModel;
use rag_core::types::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AugmentationMode {
    None,
    #[default]
    Expansion,
    /// Hypothetical document: search with a generated answer passage.
    Hyde,
}

impl AugmentationMode {
    /// Case-insensitive; anything unrecognised is `None`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "expansion" => Self::Expansion,
            "hyde" => Self::Hyde,
            "none" | "" => Self::None,
            other => {
                tracing::warn!(mode = other, "unknown augmentation mode, passing query through");
                Self::None
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Expansion => "expansion",
            Self::Hyde => "hyde",
        }
    }
}

impl fmt::Display for AugmentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct QueryAugmenter {
    chat_model: Arc<dyn ChatModel>,
    expansion_prompt: String,
    hyde_prompt: String,
}

impl QueryAugmenter {
    pub fn new(chat_model: Arc<dyn ChatModel>, prompts: &PromptConfig) -> Self {
        Self {
            chat_model,
            expansion_prompt: prompts.expansion.clone(),
            hyde_prompt: prompts.hyde.clone(),
        }
    }

    async fn request(&self, query: &str, mode: AugmentationMode) -> Result<Option<String>> {
        let system = match mode {
            AugmentationMode::None => return Ok(Some(query.to_string())),
            AugmentationMode::Expansion => &self.expansion_prompt,
            AugmentationMode::Hyde => &self.hyde_prompt,
        };
        let messages = [ChatMessage::system(system.as_str()), ChatMessage::user(query)];
        let output = self
            .chat_model
            .invoke(&messages)
            .await
            .map_err(|e| RagError::Augmentation(format!("{} ({}): {:#}", mode, self.chat_model.name(), e)))?;
        let output = output.trim();
        Ok((!output.is_empty()).then(|| output.to_string()))
    }

    /// The rewritten query, or the stage error when the model fails or
    /// returns nothing usable.
    pub async fn try_augment(&self, query: &str, mode: AugmentationMode) -> Result<String> {
        self.request(query, mode)
            .await?
            .ok_or_else(|| RagError::Augmentation(format!("{} produced an empty query", mode)))
    }

    /// Never fails: on any error the original query is used.
    pub async fn augment(&self, query: &str, mode: AugmentationMode) -> String {
        match self.request(query, mode).await {
            Ok(Some(augmented)) => {
                tracing::debug!(%mode, augmented = %augmented, "query augmented");
                augmented
            }
            Ok(None) => {
                tracing::warn!(%mode, "augmentation returned nothing, using original query");
                query.to_string()
            }
            Err(e) => {
                tracing::error!(stage = e.stage(), error = %e, "augmentation failed, using original query");
                query.to_string()
            }
        }
    }
}
