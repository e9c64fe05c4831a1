mod common;

use std::sync::Arc;

use rag_core::config::{ExpansionStrategy, DEFAULT_EXPANSION_PROMPT};
use rag_core::traits::{ChatModel, Collection, CrossEncoder};
use rag_embed::LexicalCrossEncoder;
use rag_pipeline::format::{parse_evidence, NO_SCORE};
use rag_pipeline::synthesize::{NO_INFORMATION, SYNTHESIS_FAILURE_PREFIX};
use rag_pipeline::{AugmentationMode, RagPipeline, RetrieveOptions};

use common::*;

fn pipeline(collection: Arc<dyn Collection>, chat: Arc<dyn ChatModel>, encoder: Option<Arc<dyn CrossEncoder>>) -> RagPipeline {
    RagPipeline::new(test_settings(), collection, chat, encoder)
}

#[tokio::test]
async fn empty_collection_still_answers_with_empty_evidence() {
    let chat = ScriptedChat::answering("I could not find anything about that.");
    let collection = memory_collection(&[]).await;
    let rag = pipeline(collection, chat.clone(), Some(Arc::new(LexicalCrossEncoder)));

    let out = rag.retrieve("What is network slicing?", AugmentationMode::None, false).await;
    assert!(!out.trim().is_empty());
    assert!(out.starts_with("I could not find anything about that."));
    assert_eq!(parse_evidence(&out), Some(vec![]));
    assert!(chat.user_messages().iter().any(|m| m.contains(NO_INFORMATION)));
}

#[tokio::test]
async fn repeated_queries_return_identical_evidence() {
    let chunks = vec![
        chunk(0, "5G enables low latency via network slicing", "NetSlice", "spec.pdf"),
        chunk(1, "Edge computing moves workloads near users", "Edge", "spec.pdf"),
        chunk(2, "Latency budgets differ per slice type", "NetSlice", "spec.pdf"),
        chunk(3, "LTE uses a different core network", "Legacy", "lte.pdf"),
    ];
    let rag = pipeline(memory_collection(&chunks).await, ScriptedChat::answering("ok"), Some(Arc::new(LexicalCrossEncoder)));

    let first = rag.run("How does 5G reduce latency?", RetrieveOptions { augmentation: AugmentationMode::None, rerank: true }).await;
    for _ in 0..5 {
        let again = rag.run("How does 5G reduce latency?", RetrieveOptions { augmentation: AugmentationMode::None, rerank: true }).await;
        assert_eq!(again.evidence, first.evidence);
    }
    assert!(!first.evidence.is_empty());
}

#[tokio::test]
async fn tied_scores_keep_search_order_across_runs() {
    let collection = Arc::new(FixedCollection::new(vec![
        hit_at_distance(chunk(0, "x", "X", "a.md"), 0.1),
        hit_at_distance(chunk(1, "y", "Y", "a.md"), 0.2),
    ]));
    let encoder = TableEncoder::new(&[("x", 0.5), ("y", 0.5)]);
    let rag = pipeline(collection, ScriptedChat::answering("ok"), Some(encoder));

    for _ in 0..10 {
        let response = rag.run("q", RetrieveOptions { augmentation: AugmentationMode::None, rerank: true }).await;
        let texts: Vec<&str> = response.evidence.iter().map(|e| e.chunk.as_str()).collect();
        assert_eq!(texts, vec!["x", "y"]);
        assert!(response.evidence.iter().all(|e| e.score == "0.50"));
    }
}

#[tokio::test]
async fn rerank_disabled_reports_no_score() {
    let hits = (0..5).map(|i| hit_at_distance(chunk(i, &format!("passage {i}"), &format!("H{i}"), "doc.md"), i as f32 * 0.1)).collect();
    let mut settings = test_settings();
    settings.summary_chunks = 2;
    let encoder = TableEncoder::new(&[("passage 4", 0.99)]);
    let rag = RagPipeline::new(settings, Arc::new(FixedCollection::new(hits)), ScriptedChat::answering("ok"), Some(encoder));

    let out = rag.retrieve("q", AugmentationMode::None, false).await;
    let evidence = parse_evidence(&out).unwrap();
    assert_eq!(evidence.len(), 2);
    assert_eq!(evidence[0].chunk, "passage 0");
    assert_eq!(evidence[1].chunk, "passage 1");
    assert!(evidence.iter().all(|e| e.score == NO_SCORE));
}

#[tokio::test]
async fn failing_cross_encoder_yields_empty_evidence() {
    let chunks = vec![chunk(0, "5G enables low latency via network slicing", "NetSlice", "spec.pdf")];
    let rag = pipeline(memory_collection(&chunks).await, ScriptedChat::answering("no context"), Some(Arc::new(FailingEncoder)));

    let out = rag.retrieve("How does 5G reduce latency?", AugmentationMode::None, true).await;
    assert!(out.starts_with("no context"));
    assert_eq!(parse_evidence(&out), Some(vec![]));
}

#[tokio::test]
async fn evidence_is_not_padded_to_summary_chunks() {
    let mut settings = test_settings();
    settings.summary_chunks = 3;
    let collection = memory_collection(&[chunk(7, "the only chunk", "Only", "one.md")]).await;
    let rag = RagPipeline::new(settings, collection, ScriptedChat::answering("ok"), Some(Arc::new(LexicalCrossEncoder)));

    let response = rag.run("only chunk", RetrieveOptions::default()).await;
    assert_eq!(response.evidence.len(), 1);
}

#[tokio::test]
async fn network_slicing_scenario_reports_header_and_source() {
    let mut settings = test_settings();
    settings.summary_chunks = 1;
    let collection = memory_collection(&[chunk(0, "5G enables low latency via network slicing", "NetSlice", "spec.pdf")]).await;
    let rag = RagPipeline::new(settings, collection, ScriptedChat::answering("5G uses network slicing."), None);

    let out = rag.retrieve("How does 5G reduce latency?", AugmentationMode::None, false).await;
    let evidence = parse_evidence(&out).unwrap();
    assert_eq!(evidence.len(), 1);
    assert_eq!(evidence[0].header, "NetSlice");
    assert_eq!(evidence[0].source, "spec.pdf");
    assert_eq!(evidence[0].chunk, "5G enables low latency via network slicing");
    assert!(out.starts_with("5G uses network slicing.\n\n```json\n"));
}

#[tokio::test]
async fn failed_augmentation_searches_with_the_original_query() {
    let chat = ScriptedChat::new(|messages| {
        if messages[0].content == DEFAULT_EXPANSION_PROMPT { anyhow::bail!("rate limited") }
        Ok("answer".to_string())
    });
    let collection = Arc::new(FixedCollection::new(vec![hit_at_distance(chunk(0, "text", "H", "a.md"), 0.1)]));
    let rag = pipeline(collection.clone(), chat, None);

    let response = rag.run("original question", RetrieveOptions::default()).await;
    assert_eq!(collection.queries.lock().unwrap().as_slice(), ["original question"]);
    assert_eq!(response.answer, "answer");
    assert_eq!(response.evidence.len(), 1);
}

#[tokio::test]
async fn expansion_output_drives_search_and_synthesis() {
    let chat = ScriptedChat::new(|messages| {
        if messages[0].content == DEFAULT_EXPANSION_PROMPT { return Ok("  5G latency network slicing  ".to_string()) }
        Ok("answer".to_string())
    });
    let collection = Arc::new(FixedCollection::new(vec![hit_at_distance(chunk(0, "text", "H", "a.md"), 0.1)]));
    let rag = pipeline(collection.clone(), chat.clone(), None);

    rag.retrieve("how fast is 5g", AugmentationMode::Expansion, true).await;
    assert_eq!(collection.queries.lock().unwrap().as_slice(), ["5G latency network slicing"]);
    assert!(chat.user_messages().iter().any(|m| m.starts_with("Question: 5G latency network slicing")));
}

#[tokio::test]
async fn search_failure_synthesizes_without_context() {
    let chat = ScriptedChat::answering("nothing to go on");
    let collection = Arc::new(FixedCollection::new(vec![]).failing_search());
    let rag = pipeline(collection, chat.clone(), None);

    let out = rag.retrieve("q", AugmentationMode::None, true).await;
    assert!(out.starts_with("nothing to go on"));
    assert_eq!(parse_evidence(&out), Some(vec![]));
    assert!(chat.user_messages().iter().any(|m| m.ends_with(NO_INFORMATION)));
}

#[tokio::test]
async fn synthesis_failure_keeps_evidence() {
    let collection = Arc::new(FixedCollection::new(vec![hit_at_distance(chunk(0, "grounding text", "H", "a.md"), 0.1)]));
    let rag = pipeline(collection, ScriptedChat::failing(), None);

    let out = rag.retrieve("q", AugmentationMode::Hyde, false).await;
    assert!(out.starts_with(SYNTHESIS_FAILURE_PREFIX));
    let evidence = parse_evidence(&out).unwrap();
    assert_eq!(evidence.len(), 1);
    assert_eq!(evidence[0].chunk, "grounding text");
}

#[tokio::test]
async fn group_expansion_runs_inside_the_pipeline() {
    let collection = Arc::new(FixedCollection::new(vec![
        hit_at_distance(chunk(0, "a1", "A", "doc.md"), 0.1),
        hit_at_distance(chunk(1, "a2", "A", "doc.md"), 0.3),
        hit_at_distance(chunk(2, "b1", "B", "doc.md"), 0.2),
    ]));
    let mut settings = test_settings();
    settings.expansion.strategy = ExpansionStrategy::Group;
    let rag = RagPipeline::new(settings, collection, ScriptedChat::answering("ok"), None);

    let response = rag.run("q", RetrieveOptions { augmentation: AugmentationMode::None, rerank: false }).await;
    let chunks: Vec<&str> = response.evidence.iter().map(|e| e.chunk.as_str()).collect();
    assert_eq!(chunks, vec!["a1\na2", "b1"]);
}

#[tokio::test]
async fn concurrent_queries_share_one_pipeline() {
    let chunks = vec![
        chunk(0, "5G enables low latency via network slicing", "NetSlice", "spec.pdf"),
        chunk(1, "Wi-Fi 7 adds multi-link operation", "WiFi", "wifi.pdf"),
    ];
    let rag = Arc::new(pipeline(memory_collection(&chunks).await, ScriptedChat::answering("ok"), Some(Arc::new(LexicalCrossEncoder))));
    let opts = RetrieveOptions { augmentation: AugmentationMode::None, rerank: true };

    let (a, b) = tokio::join!(rag.run("5G latency slicing", opts), rag.run("Wi-Fi multi-link", opts));
    assert_eq!(a.evidence[0].header, "NetSlice");
    assert_eq!(b.evidence[0].header, "WiFi");
}

#[tokio::test]
async fn default_options_follow_settings() {
    let mut settings = test_settings();
    settings.augmentation = "HyDE".to_string();
    settings.rerank = false;
    let rag = RagPipeline::new(settings, Arc::new(FixedCollection::new(vec![])), ScriptedChat::answering("ok"), None);
    assert_eq!(rag.default_options(), RetrieveOptions { augmentation: AugmentationMode::Hyde, rerank: false });
    assert_eq!(RetrieveOptions::default(), RetrieveOptions { augmentation: AugmentationMode::Expansion, rerank: true });
}
