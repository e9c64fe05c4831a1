//! Lightweight configuration loader, typed pipeline settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_RAG__SEARCH_K=10`). Pipeline settings
//! live under the `rag` key and every field has a default.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::data_processor::ChunkingConfig;
use crate::error::RagError;

pub const SETTINGS_KEY: &str = "rag";

pub const DEFAULT_EXPANSION_PROMPT: &str = "You rewrite search queries for a document retrieval system. \
Expand the user's query so it retrieves more relevant passages: add synonyms and closely related terms, \
spell out acronyms, and resolve ambiguous wording. Keep the original intent. \
Reply with the rewritten query only, without explanations.";

pub const DEFAULT_HYDE_PROMPT: &str = "Write a short, factual passage that would answer the user's question \
as if it were taken from a technical document. Do not mention that the passage is hypothetical. \
Reply with the passage only.";

pub const DEFAULT_SYNTHESIS_PROMPT: &str = "Answer the user's question using only the information provided below. \
If the information does not contain the answer, say that you could not find it. \
Do not use prior knowledge and do not invent facts.";

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load `config.toml` and the environment overlay from `dir`.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed pipeline settings; defaults when no `rag` section exists.
    pub fn settings(&self) -> anyhow::Result<RagSettings> {
        let settings = if self.figment.find_value(SETTINGS_KEY).is_ok() {
            self.get::<RagSettings>(SETTINGS_KEY)?
        } else {
            RagSettings::default()
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Default augmentation mode, parsed leniently by the pipeline.
    pub augmentation: String,
    pub rerank: bool,
    /// Nearest neighbours requested from the collection.
    pub search_k: usize,
    /// Ranked chunks used for synthesis and shown as evidence.
    pub summary_chunks: usize,
    pub expansion: ExpansionConfig,
    pub prompts: PromptConfig,
    pub collection: CollectionConfig,
    pub embedder: EmbedderConfig,
    pub chat_model: ChatModelConfig,
    pub cross_encoder: CrossEncoderConfig,
    /// Sentence chunking used by `ragline ingest`.
    pub ingest: ChunkingConfig,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            augmentation: "expansion".to_string(),
            rerank: true,
            search_k: 20,
            summary_chunks: 5,
            expansion: ExpansionConfig::default(),
            prompts: PromptConfig::default(),
            collection: CollectionConfig::default(),
            embedder: EmbedderConfig::default(),
            chat_model: ChatModelConfig::default(),
            cross_encoder: CrossEncoderConfig::default(),
            ingest: ChunkingConfig::default(),
        }
    }
}

impl RagSettings {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.summary_chunks == 0 {
            return Err(RagError::InvalidConfig("summary_chunks must be at least 1".to_string()));
        }
        if self.search_k == 0 {
            return Err(RagError::InvalidConfig("search_k must be at least 1".to_string()));
        }
        if self.search_k < self.summary_chunks {
            return Err(RagError::InvalidConfig(format!(
                "search_k ({}) must not be smaller than summary_chunks ({})",
                self.search_k, self.summary_chunks
            )));
        }
        if self.ingest.extensions.is_empty() {
            return Err(RagError::InvalidConfig("ingest.extensions must list at least one extension".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionStrategy {
    None,
    #[default]
    Group,
    SentenceWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    pub strategy: ExpansionStrategy,
    /// Neighbours fetched on each side for sentence-window expansion.
    pub window: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self { strategy: ExpansionStrategy::Group, window: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub expansion: String,
    pub hyde: String,
    pub synthesis: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            expansion: DEFAULT_EXPANSION_PROMPT.to_string(),
            hyde: DEFAULT_HYDE_PROMPT.to_string(),
            synthesis: DEFAULT_SYNTHESIS_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollectionConfig {
    #[default]
    Memory,
    Lancedb {
        uri: String,
        #[serde(default = "default_table")]
        table: String,
    },
}

fn default_table() -> String {
    "chunks".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmbedderConfig {
    Fake {
        #[serde(default = "default_dim")]
        dim: usize,
    },
    BgeM3 {
        #[serde(default)]
        model_dir: Option<String>,
    },
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self::BgeM3 { model_dir: None }
    }
}

fn default_dim() -> usize {
    1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatModelConfig {
    /// Any server speaking the OpenAI chat-completions API.
    #[serde(rename = "openai")]
    OpenAi {
        #[serde(default = "default_openai_url")]
        base_url: String,
        model: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        temperature: Option<f64>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        model: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

impl Default for ChatModelConfig {
    fn default() -> Self {
        Self::Ollama {
            base_url: default_ollama_url(),
            model: "llama3.1".to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrossEncoderConfig {
    None,
    Lexical,
    Candle {
        #[serde(default)]
        model_dir: Option<String>,
        #[serde(default = "default_max_len")]
        max_len: usize,
    },
}

impl Default for CrossEncoderConfig {
    fn default() -> Self {
        Self::Candle { model_dir: None, max_len: default_max_len() }
    }
}

fn default_max_len() -> usize {
    512
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
