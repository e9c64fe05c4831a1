use async_trait::async_trait;

use crate::types::{ChatMessage, Chunk, ChunkId, RetrievalHit};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Vector store holding chunks, their metadata and vectors.
///
/// Reads (`search`, `scroll_by_id`) may run concurrently. `insert` and
/// `reset` are ingestion-time operations and must not overlap queries.
#[async_trait]
pub trait Collection: Send + Sync {
    /// Up to `k` nearest chunks, best first, with higher-is-better relevance.
    /// `k` larger than the corpus returns the whole corpus.
    async fn search(&self, query_text: &str, k: usize) -> anyhow::Result<Vec<RetrievalHit>>;
    /// Chunks for the given ids; ids that do not exist are omitted.
    async fn scroll_by_id(&self, ids: &[ChunkId]) -> anyhow::Result<Vec<Chunk>>;
    /// Store chunks, returning how many were written.
    async fn insert(&self, elements: &[Chunk]) -> anyhow::Result<usize>;
    async fn reset(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;
    /// Plain text content of the model's reply.
    async fn invoke(&self, messages: &[ChatMessage]) -> anyhow::Result<String>;
}

/// Pairwise `(query, passage)` relevance model.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    /// One score per pair in input order, higher is more relevant.
    async fn predict(&self, pairs: &[(String, String)]) -> anyhow::Result<Vec<f32>>;
}
