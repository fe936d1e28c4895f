//! Runtime request/response types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub domain_key: String,
    pub input_text: String,
}

impl GenerationRequest {
    pub fn new(domain_key: impl Into<String>, input_text: impl Into<String>) -> Self {
        Self {
            domain_key: domain_key.into(),
            input_text: input_text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub domain_key: String,
    pub input_text: String,
    pub output_text: String,
    pub tokens_generated: usize,
    pub generation_time_ms: f64,
}
