//! Error types for evaluation and generation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Malformed judge response: {reason}")]
    MalformedResponse { reason: String, response: String },

    #[error("Judge returned an empty completion")]
    EmptyCompletion,

    #[error("Unknown prompt template: {category}/{name}")]
    UnknownPrompt { category: String, name: String },

    #[error("Distribution fractions must sum to 1, got {0}")]
    InvalidDistribution(f32),

    #[error("A translator is required when a target language is set")]
    MissingTranslator,

    #[error("Judge call failed: {0:#}")]
    Judge(anyhow::Error),

    #[error("Embedding call failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error("System under test failed: {0:#}")]
    SystemUnderTest(anyhow::Error),

    #[error("Corpus store failed: {0:#}")]
    Corpus(anyhow::Error),

    #[error("Translation failed: {0:#}")]
    Translation(anyhow::Error),

    #[error("Judge produced no usable output: {0}")]
    Unusable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EvalError>;
