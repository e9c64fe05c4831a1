use std::cmp::Ordering;
use std::sync::Arc;

use rag_core::error::{RagError, Result};
use rag_core::traits::CrossEncoder;
use rag_core::types::{ExpandedResult, RankedItem};

/// Second-pass ordering with a cross-encoder.
pub struct Reranker {
    encoder: Option<Arc<dyn CrossEncoder>>,
}

impl Reranker {
    pub fn new(encoder: Option<Arc<dyn CrossEncoder>>) -> Self {
        Self { encoder }
    }

    /// Top `max_chunks` candidates. With `enabled == false` or no encoder the
    /// incoming order is kept and scores are `None`.
    pub async fn rerank(&self, query: &str, candidates: Vec<ExpandedResult>, max_chunks: usize, enabled: bool) -> Result<Vec<RankedItem>> {
        let encoder = match (&self.encoder, enabled) {
            (Some(encoder), true) => encoder,
            (None, true) => {
                tracing::debug!("no cross-encoder configured, keeping search order");
                return Ok(take_unscored(candidates, max_chunks));
            }
            (_, false) => return Ok(take_unscored(candidates, max_chunks)),
        };
        if candidates.is_empty() {
            return Ok(vec![]);
        }

        let pairs: Vec<(String, String)> = candidates.iter().map(|c| (query.to_string(), c.text().to_string())).collect();
        let scores = encoder.predict(&pairs).await.map_err(|e| RagError::Rerank(format!("{:#}", e)))?;
        if scores.len() != candidates.len() {
            return Err(RagError::Rerank(format!("cross-encoder returned {} scores for {} candidates", scores.len(), candidates.len())));
        }
        Ok(order_by_score(candidates, &scores, max_chunks))
    }
}

pub fn take_unscored(candidates: Vec<ExpandedResult>, max_chunks: usize) -> Vec<RankedItem> {
    candidates.into_iter().take(max_chunks).map(|result| RankedItem { result, score: None }).collect()
}

/// Descending by score; equal scores keep their incoming position. NaN sorts last.
pub fn order_by_score(candidates: Vec<ExpandedResult>, scores: &[f32], max_chunks: usize) -> Vec<RankedItem> {
    let mut indexed: Vec<(usize, f32, ExpandedResult)> = candidates
        .into_iter()
        .zip(scores.iter().copied())
        .enumerate()
        .map(|(position, (result, score))| (position, score, result))
        .collect();
    indexed.sort_by(|a, b| compare_scores(a.1, b.1).then(a.0.cmp(&b.0)));
    indexed
        .into_iter()
        .take(max_chunks)
        .map(|(_, score, result)| RankedItem { result, score: Some(score) })
        .collect()
}

fn compare_scores(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
