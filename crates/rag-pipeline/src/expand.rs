//! Turns raw nearest-neighbour hits into larger context windows.
//!
//! Expansion only enriches text: every result keeps its representative's
//! relevance and search rank, and results come out in rank order.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rag_core::config::{ExpansionConfig, ExpansionStrategy};
use rag_core::traits::Collection;
use rag_core::types::{ChunkId, ExpandedResult, RetrievalHit};

pub struct WindowExpander {
    collection: Arc<dyn Collection>,
    config: ExpansionConfig,
}

impl WindowExpander {
    pub fn new(collection: Arc<dyn Collection>, config: ExpansionConfig) -> Self {
        Self { collection, config }
    }

    pub async fn expand(&self, hits: Vec<RetrievalHit>) -> Vec<ExpandedResult> {
        match self.config.strategy {
            ExpansionStrategy::None => hits.into_iter().enumerate().map(|(rank, hit)| ExpandedResult::from_hit(hit, rank)).collect(),
            ExpansionStrategy::Group => group_by_header(hits),
            ExpansionStrategy::SentenceWindow => sentence_window(self.collection.as_ref(), hits, self.config.window).await,
        }
    }
}

/// One result per distinct `header`. The most relevant member represents the
/// group (earlier rank wins ties) and member texts are joined with newlines in
/// retrieval order. Hits without a header are never merged.
pub fn group_by_header(hits: Vec<RetrievalHit>) -> Vec<ExpandedResult> {
    let mut groups: Vec<Vec<(usize, RetrievalHit)>> = Vec::new();
    let mut by_header: HashMap<String, usize> = HashMap::new();
    for (rank, hit) in hits.into_iter().enumerate() {
        let slot = match hit.chunk.header() {
            Some(header) => *by_header.entry(header.to_string()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            }),
            None => {
                groups.push(Vec::new());
                groups.len() - 1
            }
        };
        groups[slot].push((rank, hit));
    }

    let mut results: Vec<ExpandedResult> = groups.into_iter().filter_map(merge_group).collect();
    results.sort_by_key(|r| r.rank);
    results
}

fn merge_group(members: Vec<(usize, RetrievalHit)>) -> Option<ExpandedResult> {
    let best = members
        .iter()
        .enumerate()
        .fold(None::<usize>, |best, (i, (_, hit))| match best {
            Some(b) if members[b].1.relevance >= hit.relevance => Some(b),
            _ => Some(i),
        })?;
    let text = members.iter().map(|(_, h)| h.chunk.text.as_str()).collect::<Vec<_>>().join("\n");
    let ids = members.iter().map(|(_, h)| h.chunk.id).collect();
    let (rank, representative) = &members[best];
    let mut chunk = representative.chunk.clone();
    chunk.text = text;
    Some(ExpandedResult { chunk, relevance: representative.relevance, rank: *rank, members: ids })
}

/// Ids `id - window ..= id + window`, clipped at zero.
pub fn neighbor_ids(id: ChunkId, window: usize) -> impl Iterator<Item = ChunkId> {
    let w = window as ChunkId;
    id.saturating_sub(w)..=id.saturating_add(w)
}

/// Rebuild the passage around each hit from its neighbours, in document
/// order. Neighbours from another source are outside the document and are
/// dropped; missing neighbours just shorten the window.
///
/// Windows that share a chunk are merged into one result spanning their
/// union. The best-ranked hit among them is the representative.
pub async fn sentence_window(collection: &dyn Collection, hits: Vec<RetrievalHit>, window: usize) -> Vec<ExpandedResult> {
    let mut wanted: Vec<ChunkId> = hits.iter().flat_map(|h| neighbor_ids(h.chunk.id, window)).collect();
    wanted.sort_unstable();
    wanted.dedup();

    let neighbours: HashMap<ChunkId, _> = if window == 0 || hits.is_empty() {
        HashMap::new()
    } else {
        match collection.scroll_by_id(&wanted).await {
            Ok(chunks) => chunks.into_iter().map(|c| (c.id, c)).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "neighbour lookup failed, using hits without context");
                HashMap::new()
            }
        }
    };

    // Pairwise disjoint windows, kept in representative rank order.
    let mut windows: Vec<(usize, RetrievalHit, BTreeMap<ChunkId, String>)> = Vec::new();
    for (rank, hit) in hits.into_iter().enumerate() {
        let mut texts: BTreeMap<ChunkId, String> = BTreeMap::new();
        for id in neighbor_ids(hit.chunk.id, window) {
            if let Some(n) = neighbours.get(&id) {
                if n.source() == hit.chunk.source() {
                    texts.insert(id, n.text.clone());
                }
            }
        }
        texts.insert(hit.chunk.id, hit.chunk.text.clone());

        let overlapping: Vec<usize> = windows
            .iter()
            .enumerate()
            .filter(|(_, (_, _, existing))| texts.keys().any(|id| existing.contains_key(id)))
            .map(|(i, _)| i)
            .collect();
        match overlapping.split_first() {
            None => windows.push((rank, hit, texts)),
            Some((&keep, rest)) => {
                for &i in rest.iter().rev() {
                    let (_, _, absorbed) = windows.remove(i);
                    windows[keep].2.extend(absorbed);
                }
                for (id, text) in texts {
                    windows[keep].2.entry(id).or_insert(text);
                }
                tracing::debug!(chunk = hit.chunk.id, into = windows[keep].1.chunk.id, "merged overlapping window");
            }
        }
    }

    windows
        .into_iter()
        .map(|(rank, hit, texts)| {
            let members: Vec<ChunkId> = texts.keys().copied().collect();
            let mut chunk = hit.chunk;
            chunk.text = texts.into_values().collect::<Vec<_>>().join(" ");
            ExpandedResult { chunk, relevance: hit.relevance, rank, members }
        })
        .collect()
}
