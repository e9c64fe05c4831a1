use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use rag_core::traits::{Collection, Embedder};
use rag_core::types::{Chunk, ChunkId, RetrievalHit};

use crate::cosine;

struct Row {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Brute-force cosine search over chunks held in memory, keyed by id.
///
/// Reported relevance is the cosine similarity; equal similarities are
/// ordered by ascending id so repeated searches return the same order.
pub struct MemoryCollection {
    embedder: Arc<dyn Embedder>,
    rows: RwLock<BTreeMap<ChunkId, Row>>,
}

impl MemoryCollection {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder, rows: RwLock::new(BTreeMap::new()) }
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[async_trait]
impl Collection for MemoryCollection {
    async fn search(&self, query_text: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        if k == 0 { return Ok(vec![]); }
        let query_vec = self
            .embedder
            .embed_batch(&[query_text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector for the query"))?;
        let rows = self.rows.read().map_err(|_| anyhow!("collection lock poisoned"))?;
        let mut scored: Vec<(f32, &Row)> = rows.values().map(|row| (cosine(&query_vec, &row.vector), row)).collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.chunk.id.cmp(&b.1.chunk.id)));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(relevance, row)| {
                let mut chunk = row.chunk.clone();
                chunk.embedding = Some(row.vector.clone());
                RetrievalHit::new(chunk, relevance)
            })
            .collect())
    }

    async fn scroll_by_id(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>> {
        let rows = self.rows.read().map_err(|_| anyhow!("collection lock poisoned"))?;
        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| rows.get(id).map(|row| row.chunk.clone()))
            .collect())
    }

    async fn insert(&self, elements: &[Chunk]) -> Result<usize> {
        if elements.is_empty() { return Ok(0); }
        let dim = self.embedder.dim();
        let missing: Vec<String> = elements
            .iter()
            .filter(|c| c.embedding.as_ref().map_or(true, |e| e.len() != dim))
            .map(|c| c.text.clone())
            .collect();
        let mut computed = self.embedder.embed_batch(&missing)?.into_iter();
        let mut prepared = Vec::with_capacity(elements.len());
        for chunk in elements {
            let vector = match &chunk.embedding {
                Some(e) if e.len() == dim => e.clone(),
                _ => computed.next().ok_or_else(|| anyhow!("embedder returned fewer vectors than inputs"))?,
            };
            let mut stored = chunk.clone();
            stored.embedding = None;
            prepared.push(Row { chunk: stored, vector });
        }
        let mut rows = self.rows.write().map_err(|_| anyhow!("collection lock poisoned"))?;
        for row in prepared { rows.insert(row.chunk.id, row); }
        tracing::debug!(inserted = elements.len(), total = rows.len(), "memory collection insert");
        Ok(elements.len())
    }

    async fn reset(&self) -> Result<()> {
        self.rows.write().map_err(|_| anyhow!("collection lock poisoned"))?.clear();
        Ok(())
    }
}
