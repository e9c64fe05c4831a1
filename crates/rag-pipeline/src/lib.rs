use std::sync::Arc;
use std::time::Instant;

use rag_core::config::RagSettings;
use rag_core::error::RagError;
use rag_core::traits::{ChatModel, Collection, CrossEncoder};
use rag_core::types::{ExpandedResult, RankedItem, RetrievalHit};

pub mod augment;
pub mod expand;
pub mod factory;
pub mod format;
pub mod rerank;
pub mod synthesize;

pub use augment::{AugmentationMode, QueryAugmenter};
pub use expand::WindowExpander;
pub use factory::build_pipeline;
pub use format::RagResponse;
pub use rerank::Reranker;
pub use synthesize::AnswerSynthesizer;

/// Per-call switches for `RagPipeline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrieveOptions {
    pub augmentation: AugmentationMode,
    pub rerank: bool,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self { augmentation: AugmentationMode::Expansion, rerank: true }
    }
}

/// augment -> search -> expand -> rerank -> synthesize -> format.
///
/// Every stage is fault-isolated, so a query always produces a response.
pub struct RagPipeline {
    settings: RagSettings,
    collection: Arc<dyn Collection>,
    augmenter: QueryAugmenter,
    expander: WindowExpander,
    reranker: Reranker,
    synthesizer: AnswerSynthesizer,
}

impl RagPipeline {
    pub fn new(
        settings: RagSettings,
        collection: Arc<dyn Collection>,
        chat_model: Arc<dyn ChatModel>,
        cross_encoder: Option<Arc<dyn CrossEncoder>>,
    ) -> Self {
        let augmenter = QueryAugmenter::new(Arc::clone(&chat_model), &settings.prompts);
        let expander = WindowExpander::new(Arc::clone(&collection), settings.expansion.clone());
        let synthesizer = AnswerSynthesizer::new(chat_model, settings.prompts.synthesis.clone());
        Self { settings, collection, augmenter, expander, reranker: Reranker::new(cross_encoder), synthesizer }
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    /// Options taken from the configured `augmentation` and `rerank` values.
    pub fn default_options(&self) -> RetrieveOptions {
        RetrieveOptions { augmentation: AugmentationMode::parse(&self.settings.augmentation), rerank: self.settings.rerank }
    }

    /// Answer followed by a fenced JSON evidence block. Never fails.
    pub async fn retrieve(&self, query: &str, augmentation: AugmentationMode, rerank: bool) -> String {
        self.retrieve_with(query, RetrieveOptions { augmentation, rerank }).await
    }

    pub async fn retrieve_with(&self, query: &str, options: RetrieveOptions) -> String {
        self.run(query, options).await.render()
    }

    pub async fn run(&self, query: &str, options: RetrieveOptions) -> RagResponse {
        let started = Instant::now();

        let t = Instant::now();
        let search_query = self.augmenter.augment(query, options.augmentation).await;
        tracing::debug!(mode = %options.augmentation, elapsed_ms = t.elapsed().as_millis() as u64, "augment");

        let t = Instant::now();
        let hits = self.search(&search_query).await;
        tracing::debug!(hits = hits.len(), k = self.settings.search_k, elapsed_ms = t.elapsed().as_millis() as u64, "search");

        let t = Instant::now();
        let candidates = self.expander.expand(hits).await;
        tracing::debug!(candidates = candidates.len(), strategy = ?self.settings.expansion.strategy, elapsed_ms = t.elapsed().as_millis() as u64, "expand");

        let t = Instant::now();
        let ranked = self.rerank(&search_query, candidates, options.rerank).await;
        tracing::debug!(ranked = ranked.len(), rerank = options.rerank, elapsed_ms = t.elapsed().as_millis() as u64, "rerank");

        let t = Instant::now();
        let answer = self.synthesizer.synthesize(&search_query, &ranked).await;
        tracing::debug!(elapsed_ms = t.elapsed().as_millis() as u64, "synthesize");

        let response = RagResponse::new(answer, &ranked, self.settings.summary_chunks);
        tracing::info!(evidence = response.evidence.len(), elapsed_ms = started.elapsed().as_millis() as u64, "query answered");
        response
    }

    async fn search(&self, query: &str) -> Vec<RetrievalHit> {
        match self.collection.search(query, self.settings.search_k).await {
            Ok(hits) => hits,
            Err(e) => {
                let err = RagError::Retrieval(format!("{:#}", e));
                tracing::error!(stage = err.stage(), error = %err, "search failed, continuing without context");
                Vec::new()
            }
        }
    }

    async fn rerank(&self, query: &str, candidates: Vec<ExpandedResult>, enabled: bool) -> Vec<RankedItem> {
        match self.reranker.rerank(query, candidates, self.settings.summary_chunks, enabled).await {
            Ok(ranked) => ranked,
            Err(e) => {
                tracing::error!(stage = e.stage(), error = %e, "reranking failed, continuing without context");
                Vec::new()
            }
        }
    }
}
