//! Local models: BGE-M3 embeddings and an XLM-RoBERTa cross-encoder, both on
//! candle, plus deterministic stand-ins that need no model files.
use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use rag_core::traits::Embedder;

pub mod cross_encoder;
pub mod device;
pub mod pool;
pub mod tokenize;

pub use cross_encoder::{CandleCrossEncoder, LexicalCrossEncoder};
pub use pool::masked_mean_l2;

pub const BGE_M3_DIM: usize = 1024;
const EMBED_MAX_LEN: usize = 256;

pub struct EmbeddingModel { model: XLMRobertaModel, tokenizer: Tokenizer, device: Device }

impl EmbeddingModel {
    pub fn new(model_dir: &Path) -> Result<Self> {
        let device = device::select_device();
        tracing::info!(dir = %model_dir.display(), "loading BGE-M3 embedding model");
        let tokenizer = load_tokenizer(model_dir)?;
        let config: XLMRobertaConfig = load_config(model_dir)?;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaModel::new(&config, vb)?;
        tracing::info!("BGE-M3 model loaded");
        Ok(Self { model, tokenizer, device })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize::tokenize_on_device(&self.tokenizer, text, EMBED_MAX_LEN, &self.device)?;
        let token_type_ids = Tensor::zeros((1, EMBED_MAX_LEN), DType::I64, &self.device)?;
        let hidden_states = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden_states, &attention_mask)?;
        let emb = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1::<f32>()?;
        if emb.len() != BGE_M3_DIM {
            return Err(anyhow!("expected {} dimensions, model produced {}", BGE_M3_DIM, emb.len()));
        }
        if start.elapsed().as_millis() > 100 { tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "slow embedding"); }
        Ok(emb)
    }
}

impl Embedder for EmbeddingModel {
    fn dim(&self) -> usize { BGE_M3_DIM }
    fn max_len(&self) -> usize { EMBED_MAX_LEN }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }
}

/// Hashed bag-of-words vectors: deterministic, L2-normalised, no model needed.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.is_empty() { continue; }
            let mut hasher = XxHash64::with_seed(0); token.hash(&mut hasher); let h = hasher.finish();
            let idx = (h as usize) % self.dim; let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6); for x in &mut v { *x /= norm; } v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// BGE-M3 from `model_dir` (or the usual lookup locations), or the fake
/// embedder when `APP_USE_FAKE_EMBEDDINGS` is set.
pub fn get_default_embedder(model_dir: Option<&Path>) -> Result<Box<dyn Embedder>> {
    if use_fake_embeddings() { tracing::info!("using FakeEmbedder"); return Ok(Box::new(FakeEmbedder::new(BGE_M3_DIM))); }
    let dir = resolve_model_dir(model_dir, "bge-m3")?;
    Ok(Box::new(EmbeddingModel::new(&dir)?))
}

/// Locate a model directory: explicit path, then `APP_MODEL_DIR/<name>`, then
/// `../models/<name>` and `models/<name>`.
pub fn resolve_model_dir(explicit: Option<&Path>, name: &str) -> Result<PathBuf> {
    if let Some(p) = explicit { if p.exists() { return Ok(p.to_path_buf()); } return Err(anyhow!("Model directory {} does not exist", p.display())); }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") { let p = PathBuf::from(&dir).join(name); if p.exists() { return Ok(p); } }
    let root = Path::new("../models").join(name); if root.exists() { return Ok(root); }
    let local = Path::new("models").join(name); if local.exists() { return Ok(local); }
    Err(anyhow!("Could not locate {} model directory", name))
}

pub(crate) fn load_tokenizer(model_dir: &Path) -> Result<Tokenizer> {
    let tokenizer_path = model_dir.join("tokenizer.json");
    Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))
}

pub(crate) fn load_config(model_dir: &Path) -> Result<XLMRobertaConfig> {
    let config_path = model_dir.join("config.json");
    Ok(serde_json::from_str(&std::fs::read_to_string(&config_path)?)?)
}

/// Weights from `model.safetensors` when present, otherwise `pytorch_model.bin`.
pub(crate) fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        // SAFETY: the file is memory-mapped read-only and not modified while the model is alive.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, device)? };
        return Ok(vb);
    }
    let weights_path = model_dir.join("pytorch_model.bin");
    let weights = candle_core::pickle::read_all(&weights_path)?;
    let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
    Ok(VarBuilder::from_tensors(weights_map, DType::F32, device))
}
