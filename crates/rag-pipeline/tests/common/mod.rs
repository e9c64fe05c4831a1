#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rag_core::config::{CrossEncoderConfig, EmbedderConfig, RagSettings};
use rag_core::traits::{ChatModel, Collection, CrossEncoder};
use rag_core::types::{relevance_from_distance, ChatMessage, Chunk, ChunkId, RetrievalHit};
use rag_embed::FakeEmbedder;
use rag_vector::MemoryCollection;

type Reply = Box<dyn Fn(&[ChatMessage]) -> Result<String> + Send + Sync>;

/// Chat model driven by a closure; records every conversation it sees.
pub struct ScriptedChat {
    reply: Reply,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub fn new(reply: impl Fn(&[ChatMessage]) -> Result<String> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { reply: Box::new(reply), calls: Mutex::new(Vec::new()) })
    }

    pub fn answering(answer: &'static str) -> Arc<Self> {
        Self::new(move |_| Ok(answer.to_string()))
    }

    pub fn failing() -> Arc<Self> {
        Self::new(|_| Err(anyhow!("connection refused")))
    }

    pub fn user_messages(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .flat_map(|conv| conv.iter().filter(|m| m.role == "user").map(|m| m.content.clone()).collect::<Vec<_>>())
            .collect()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        (self.reply)(messages)
    }
}

/// Scores passages from a lookup table; unknown passages score 0.
pub struct TableEncoder(pub HashMap<String, f32>);

impl TableEncoder {
    pub fn new(scores: &[(&str, f32)]) -> Arc<Self> {
        Arc::new(Self(scores.iter().map(|(t, s)| (t.to_string(), *s)).collect()))
    }
}

#[async_trait]
impl CrossEncoder for TableEncoder {
    async fn predict(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        Ok(pairs.iter().map(|(_, p)| self.0.get(p).copied().unwrap_or(0.0)).collect())
    }
}

pub struct FailingEncoder;

#[async_trait]
impl CrossEncoder for FailingEncoder {
    async fn predict(&self, _pairs: &[(String, String)]) -> Result<Vec<f32>> {
        Err(anyhow!("model weights missing"))
    }
}

/// Returns preset hits regardless of the query and records the queries it got.
pub struct FixedCollection {
    hits: Vec<RetrievalHit>,
    by_id: HashMap<ChunkId, Chunk>,
    fail_search: bool,
    fail_scroll: bool,
    pub queries: Mutex<Vec<String>>,
}

impl FixedCollection {
    pub fn new(hits: Vec<RetrievalHit>) -> Self {
        let by_id = hits.iter().map(|h| (h.chunk.id, h.chunk.clone())).collect();
        Self { hits, by_id, fail_search: false, fail_scroll: false, queries: Mutex::new(Vec::new()) }
    }

    pub fn with_extra(mut self, chunks: Vec<Chunk>) -> Self {
        for c in chunks { self.by_id.insert(c.id, c); }
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn failing_scroll(mut self) -> Self {
        self.fail_scroll = true;
        self
    }
}

#[async_trait]
impl Collection for FixedCollection {
    async fn search(&self, query_text: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        self.queries.lock().unwrap().push(query_text.to_string());
        if self.fail_search { return Err(anyhow!("vector store offline")); }
        Ok(self.hits.iter().take(k).cloned().collect())
    }

    async fn scroll_by_id(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>> {
        if self.fail_scroll { return Err(anyhow!("scroll timed out")); }
        Ok(ids.iter().filter_map(|id| self.by_id.get(id).cloned()).collect())
    }

    async fn insert(&self, elements: &[Chunk]) -> Result<usize> {
        Ok(elements.len())
    }

    async fn reset(&self) -> Result<()> {
        Ok(())
    }
}

pub fn chunk(id: ChunkId, text: &str, header: &str, source: &str) -> Chunk {
    Chunk::new(id, text).with_meta("header", header).with_meta("filename", source)
}

/// A hit as a distance-reporting store would produce it.
pub fn hit_at_distance(chunk: Chunk, distance: f32) -> RetrievalHit {
    RetrievalHit::new(chunk, relevance_from_distance(distance))
}

pub async fn memory_collection(chunks: &[Chunk]) -> Arc<MemoryCollection> {
    let collection = Arc::new(MemoryCollection::new(Arc::new(FakeEmbedder::new(64))));
    collection.insert(chunks).await.unwrap();
    collection
}

pub fn test_settings() -> RagSettings {
    RagSettings {
        embedder: EmbedderConfig::Fake { dim: 64 },
        cross_encoder: CrossEncoderConfig::Lexical,
        ..RagSettings::default()
    }
}
