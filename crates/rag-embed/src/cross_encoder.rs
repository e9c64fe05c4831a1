use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use candle_transformers::models::xlm_roberta::XLMRobertaForSequenceClassification;
use tokenizers::{Tokenizer, TruncationParams};

use rag_core::traits::CrossEncoder;

use crate::{device, load_config, load_tokenizer, load_weights, tokenize};

struct RerankerModel {
    model: XLMRobertaForSequenceClassification,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

impl RerankerModel {
    fn score(&self, query: &str, passage: &str) -> Result<f32> {
        let (input_ids, attention_mask) = tokenize::tokenize_pair_on_device(&self.tokenizer, query, passage, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let logits = self.model.forward(&input_ids, &attention_mask, &token_type_ids)?;
        let logit = logits
            .to_device(&Device::Cpu)?
            .to_dtype(DType::F32)?
            .flatten_all()?
            .to_vec1::<f32>()?
            .first()
            .copied()
            .ok_or_else(|| anyhow!("cross-encoder returned no logits"))?;
        Ok(sigmoid(logit))
    }
}

/// XLM-RoBERTa sequence classifier with a single relevance logit
/// (e.g. `bge-reranker-v2-m3`); scores are squashed into `0..1`.
pub struct CandleCrossEncoder {
    inner: Arc<RerankerModel>,
}

impl CandleCrossEncoder {
    pub fn new(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = device::select_device();
        tracing::info!(dir = %model_dir.display(), "loading cross-encoder");
        let mut tokenizer = load_tokenizer(model_dir)?;
        tokenizer
            .with_truncation(Some(TruncationParams { max_length: max_len, ..Default::default() }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
        let config = load_config(model_dir)?;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaForSequenceClassification::new(1, &config, vb)?;
        Ok(Self { inner: Arc::new(RerankerModel { model, tokenizer, device, max_len }) })
    }
}

#[async_trait]
impl CrossEncoder for CandleCrossEncoder {
    async fn predict(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        let inner = Arc::clone(&self.inner);
        let pairs = pairs.to_vec();
        tokio::task::spawn_blocking(move || pairs.iter().map(|(q, p)| inner.score(q, p)).collect::<Result<Vec<f32>>>()).await?
    }
}

/// Share of distinct query terms that occur in the passage. Deterministic and
/// model-free; useful offline and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalCrossEncoder;

impl LexicalCrossEncoder {
    pub fn score(query: &str, passage: &str) -> f32 {
        let query_terms = terms(query);
        if query_terms.is_empty() { return 0.0; }
        let passage_terms = terms(passage);
        let overlap = query_terms.intersection(&passage_terms).count() as f32;
        overlap / query_terms.len() as f32
    }
}

#[async_trait]
impl CrossEncoder for LexicalCrossEncoder {
    async fn predict(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        Ok(pairs.iter().map(|(q, p)| Self::score(q, p)).collect())
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn sigmoid(x: f32) -> f32 { 1.0 / (1.0 + (-x).exp()) }
