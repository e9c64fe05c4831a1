use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rag_core::config::Config;
use rag_core::data_processor::DataProcessor;
use rag_core::traits::Collection;
use rag_pipeline::{build_pipeline, AugmentationMode};

const USAGE: &str = "Usage:
  ragline ingest <dir>
  ragline query \"<question>\" [--augment none|expansion|hyde] [--no-rerank] [--data <dir>]";

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).with_writer(std::io::stderr).init();
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{}", USAGE); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

struct QueryArgs {
    question: String,
    augmentation: Option<AugmentationMode>,
    rerank: Option<bool>,
    data_dir: Option<PathBuf>,
}

fn parse_query_args(args: &[String]) -> anyhow::Result<QueryArgs> {
    let mut parsed = QueryArgs { question: String::new(), augmentation: None, rerank: None, data_dir: None };
    let mut words = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--augment" | "-a" => {
                let mode = args.get(i + 1).ok_or_else(|| anyhow::anyhow!("--augment requires a mode"))?;
                parsed.augmentation = Some(AugmentationMode::parse(mode));
                i += 1;
            }
            "--no-rerank" => parsed.rerank = Some(false),
            "--data" => {
                let dir = args.get(i + 1).ok_or_else(|| anyhow::anyhow!("--data requires a directory"))?;
                parsed.data_dir = Some(PathBuf::from(dir));
                i += 1;
            }
            other => words.push(other.to_string()),
        }
        i += 1;
    }
    parsed.question = words.join(" ");
    if parsed.question.trim().is_empty() { anyhow::bail!("missing question\n{}", USAGE); }
    Ok(parsed)
}

/// Replace the collection contents with the chunks found under `data_dir`.
/// Nothing is reset when the directory yields no chunks.
async fn ingest(collection: &Arc<dyn Collection>, processor: &DataProcessor, data_dir: &Path) -> anyhow::Result<usize> {
    let chunks = processor.process_directory(data_dir, 0)?;
    if chunks.is_empty() {
        anyhow::bail!("no chunks found under {}, keeping the existing collection", data_dir.display());
    }
    tracing::warn!(dir = %data_dir.display(), chunks = chunks.len(), "resetting collection before ingest");
    collection.reset().await?;
    let inserted = collection.insert(&chunks).await?;
    tracing::info!(dir = %data_dir.display(), chunks = inserted, "ingest complete");
    Ok(inserted)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let (cmd, args) = parse_args();

    match cmd.as_str() {
        "ingest" => {
            let data_dir = args.first().map(PathBuf::from).unwrap_or_else(|| {
                let dir: String = config.get("data.raw_txt_dir").unwrap_or_else(|_| "data".to_string()); PathBuf::from(dir)
            });
            let processor = DataProcessor::with_config(settings.ingest.clone());
            let (_, collection) = build_pipeline(settings).await?;
            let inserted = ingest(&collection, &processor, &data_dir).await?;
            println!("Ingested {} chunks from {}", inserted, data_dir.display());
        }
        "query" => {
            let query = parse_query_args(&args)?;
            let processor = DataProcessor::with_config(settings.ingest.clone());
            let (pipeline, collection) = build_pipeline(settings).await?;
            if let Some(dir) = &query.data_dir { ingest(&collection, &processor, dir).await?; }
            let mut options = pipeline.default_options();
            if let Some(mode) = query.augmentation { options.augmentation = mode; }
            if let Some(rerank) = query.rerank { options.rerank = rerank; }
            println!("{}", pipeline.retrieve_with(&query.question, options).await);
        }
        _ => { eprintln!("Unknown command: {}\n{}", cmd, USAGE); std::process::exit(1); }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rag_core::types::{Chunk, ChunkId, RetrievalHit};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCollection {
        ops: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Collection for RecordingCollection {
        async fn search(&self, _query_text: &str, _k: usize) -> anyhow::Result<Vec<RetrievalHit>> { Ok(vec![]) }
        async fn scroll_by_id(&self, _ids: &[ChunkId]) -> anyhow::Result<Vec<Chunk>> { Ok(vec![]) }
        async fn insert(&self, elements: &[Chunk]) -> anyhow::Result<usize> {
            self.ops.lock().unwrap().push(format!("insert {}", elements.len()));
            Ok(elements.len())
        }
        async fn reset(&self) -> anyhow::Result<()> {
            self.ops.lock().unwrap().push("reset".to_string());
            Ok(())
        }
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn query_flags_are_parsed_around_the_question() {
        let parsed = parse_query_args(&args(&["How", "does", "5G", "work?", "--augment", "hyde", "--no-rerank"])).unwrap();
        assert_eq!(parsed.question, "How does 5G work?");
        assert_eq!(parsed.augmentation, Some(AugmentationMode::Hyde));
        assert_eq!(parsed.rerank, Some(false));
        assert!(parsed.data_dir.is_none());
    }

    #[test]
    fn missing_question_is_an_error() {
        assert!(parse_query_args(&args(&["--no-rerank"])).is_err());
        assert!(parse_query_args(&args(&["q", "--augment"])).is_err());
    }

    #[tokio::test]
    async fn empty_input_directory_keeps_the_collection() {
        let tmp = tempfile::tempdir().unwrap();
        let recording = Arc::new(RecordingCollection::default());
        let collection: Arc<dyn Collection> = recording.clone();
        assert!(ingest(&collection, &DataProcessor::new(), tmp.path()).await.is_err());
        assert!(recording.ops.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ingest_resets_then_inserts() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("power.md"), "# Power\nSolar panels lose output in shade.").unwrap();
        let recording = Arc::new(RecordingCollection::default());
        let collection: Arc<dyn Collection> = recording.clone();
        assert_eq!(ingest(&collection, &DataProcessor::new(), tmp.path()).await.unwrap(), 1);
        assert_eq!(recording.ops.lock().unwrap().as_slice(), ["reset", "insert 1"]);
    }
}
