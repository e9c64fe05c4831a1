//! Domain types shared by collections, the pipeline stages and the formatter.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type ChunkId = u64;
pub type Meta = HashMap<String, serde_json::Value>;

/// Metadata key holding the section identifier used for group expansion.
pub const HEADER_KEY: &str = "header";
/// Preferred metadata key for the originating file.
pub const FILENAME_KEY: &str = "filename";
/// Fallback metadata key for the originating document.
pub const SOURCE_KEY: &str = "source";

/// A unit of indexed content.
///
/// - `id`: sequential identifier assigned at ingestion in document order, so
///   the neighbours of chunk `n` are `n - 1` and `n + 1`
/// - `text`: the text payload
/// - `metadata`: at least `header` and `filename`/`source`
/// - `embedding`: present only when the store returns vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    #[serde(default)]
    pub metadata: Meta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn new(id: ChunkId, text: impl Into<String>) -> Self {
        Self { id, text: text.into(), metadata: Meta::new(), embedding: None }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Non-empty string value of a metadata field.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn header(&self) -> Option<&str> {
        self.meta_str(HEADER_KEY)
    }

    /// `filename` if present, otherwise `source`.
    pub fn source(&self) -> Option<&str> {
        self.meta_str(FILENAME_KEY).or_else(|| self.meta_str(SOURCE_KEY))
    }
}

/// A candidate produced by nearest-neighbour search.
///
/// `relevance` is always higher-is-better. Backends that report a distance
/// convert it before handing hits out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub chunk: Chunk,
    pub relevance: f32,
}

impl RetrievalHit {
    pub fn new(chunk: Chunk, relevance: f32) -> Self {
        Self { chunk, relevance }
    }
}

/// Distance to relevance conversion used by distance-reporting stores:
/// `relevance = 1 / (1 + distance)`, clamping negative distances to zero.
pub fn relevance_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// A hit whose text was enriched with neighbouring or sibling chunks.
///
/// `chunk` carries the representative's id and metadata with the expanded
/// text. `relevance` and `rank` are the representative's values from the
/// search stage. `members` lists every chunk id merged into this result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedResult {
    pub chunk: Chunk,
    pub relevance: f32,
    pub rank: usize,
    pub members: Vec<ChunkId>,
}

impl ExpandedResult {
    /// A result that is just the hit itself.
    pub fn from_hit(hit: RetrievalHit, rank: usize) -> Self {
        let members = vec![hit.chunk.id];
        Self { chunk: hit.chunk, relevance: hit.relevance, rank, members }
    }

    pub fn text(&self) -> &str {
        &self.chunk.text
    }
}

/// An expanded result after the rerank stage. `score` is `None` when the
/// cross-encoder was bypassed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    pub result: ExpandedResult,
    pub score: Option<f32>,
}

/// Caller-facing evidence for one ranked chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub score: String,
    pub source: String,
    pub header: String,
    pub chunk: String,
}

/// One chat turn sent to a language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}
