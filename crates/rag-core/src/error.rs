use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Query augmentation failed: {0}")]
    Augmentation(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Reranking failed: {0}")]
    Rerank(String),

    #[error("Answer synthesis failed: {0}")]
    Synthesis(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RagError {
    /// Short stage label used as a structured logging field.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Augmentation(_) => "augment",
            Self::Retrieval(_) => "retrieve",
            Self::Rerank(_) => "rerank",
            Self::Synthesis(_) => "synthesize",
            Self::InvalidConfig(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
