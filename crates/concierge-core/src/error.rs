//! Error types for the Concierge core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A model could not be materialized during registry initialization.
    #[error("Failed to load model: {0}")]
    ModelLoadError(String),

    /// The domain key is unknown, or its model never finished loading.
    #[error("Model '{0}' not loaded.")]
    ModelUnavailable(String),

    /// Tokenization, decoding or tensor work failed while serving a request.
    #[error("Generation failed for model '{domain}': {reason}")]
    GenerationFailed { domain: String, reason: String },

    #[error("Tokenization error: {0}")]
    TokenizationError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("HuggingFace Hub error: {0}")]
    HfHubError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tensor error: {0}")]
    Candle(#[from] candle_core::Error),
}

impl Error {
    pub(crate) fn generation_failed(domain: &str, err: impl std::fmt::Display) -> Self {
        Error::GenerationFailed {
            domain: domain.to_string(),
            reason: err.to_string(),
        }
    }

    /// True for the per-request "no such model" condition.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::ModelUnavailable(_))
    }
}
