//! Builds the collaborators named in `RagSettings`. This is the only place
//! that knows about concrete backends.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use rag_core::config::{expand_path, ChatModelConfig, CollectionConfig, CrossEncoderConfig, EmbedderConfig, RagSettings};
use rag_core::traits::{ChatModel, Collection, CrossEncoder, Embedder};
use rag_embed::{get_default_embedder, resolve_model_dir, CandleCrossEncoder, FakeEmbedder, LexicalCrossEncoder};
use rag_llm::{OllamaChatModel, OpenAiChatModel};
use rag_vector::{LanceCollection, MemoryCollection};

use crate::RagPipeline;

const RERANKER_MODEL: &str = "bge-reranker-v2-m3";

pub fn build_embedder(config: &EmbedderConfig) -> Result<Arc<dyn Embedder>> {
    match config {
        EmbedderConfig::Fake { dim } => Ok(Arc::new(FakeEmbedder::new(*dim))),
        EmbedderConfig::BgeM3 { model_dir } => {
            let dir = model_dir.as_deref().map(expand_path);
            Ok(Arc::from(get_default_embedder(dir.as_deref())?))
        }
    }
}

pub async fn build_collection(config: &CollectionConfig, embedder: Arc<dyn Embedder>) -> Result<Arc<dyn Collection>> {
    match config {
        CollectionConfig::Memory => Ok(Arc::new(MemoryCollection::new(embedder))),
        CollectionConfig::Lancedb { uri, table } => {
            let uri = expand_path(uri).to_string_lossy().to_string();
            Ok(Arc::new(LanceCollection::new(&uri, table, embedder).await?))
        }
    }
}

pub fn build_chat_model(config: &ChatModelConfig) -> Result<Arc<dyn ChatModel>> {
    match config {
        ChatModelConfig::OpenAi { base_url, model, api_key, temperature, timeout_secs } => {
            let key = api_key.clone().or_else(|| std::env::var("OPENAI_API_KEY").ok());
            Ok(Arc::new(OpenAiChatModel::new(base_url, model, key, *temperature, *timeout_secs)?))
        }
        ChatModelConfig::Ollama { base_url, model, timeout_secs } => Ok(Arc::new(OllamaChatModel::new(base_url, model, *timeout_secs)?)),
    }
}

/// `None` means reranking is bypassed even when requested.
pub fn build_cross_encoder(config: &CrossEncoderConfig) -> Result<Option<Arc<dyn CrossEncoder>>> {
    match config {
        CrossEncoderConfig::None => Ok(None),
        CrossEncoderConfig::Lexical => Ok(Some(Arc::new(LexicalCrossEncoder))),
        CrossEncoderConfig::Candle { model_dir, max_len } => {
            let explicit: Option<PathBuf> = model_dir.as_deref().map(expand_path);
            let dir = resolve_model_dir(explicit.as_deref(), RERANKER_MODEL)?;
            Ok(Some(Arc::new(CandleCrossEncoder::new(&dir, *max_len)?)))
        }
    }
}

/// Everything the pipeline needs, plus the collection handle for ingestion.
pub async fn build_pipeline(settings: RagSettings) -> Result<(RagPipeline, Arc<dyn Collection>)> {
    settings.validate()?;
    let embedder = build_embedder(&settings.embedder)?;
    let collection = build_collection(&settings.collection, embedder).await?;
    let chat_model = build_chat_model(&settings.chat_model)?;
    let cross_encoder = build_cross_encoder(&settings.cross_encoder)?;
    tracing::info!(chat_model = chat_model.name(), reranker = cross_encoder.is_some(), "pipeline components ready");
    let pipeline = RagPipeline::new(settings, Arc::clone(&collection), chat_model, cross_encoder);
    Ok((pipeline, collection))
}
