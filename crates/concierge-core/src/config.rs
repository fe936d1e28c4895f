//! Configuration types for the Concierge engine and server

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::{Domain, ModelSpec};
use crate::error::{Error, Result};

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// HuggingFace Hub cache directory used when resolving repo ids
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Compute preference: "cuda", "metal", "cpu" or unset for auto-detect
    #[serde(default = "default_device")]
    pub device: Option<String>,

    /// Weight dtype override ("f32"); unset lets the device decide
    #[serde(default = "default_dtype")]
    pub dtype: Option<String>,

    /// Repository providing `tokenizer.json` when a model source only ships
    /// a sentencepiece model
    #[serde(default = "default_tokenizer_fallback")]
    pub tokenizer_fallback: Option<String>,

    /// Per-domain source overrides (local directory or hub repo id)
    #[serde(default = "default_sources")]
    pub sources: BTreeMap<Domain, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            device: default_device(),
            dtype: default_dtype(),
            tokenizer_fallback: default_tokenizer_fallback(),
            sources: default_sources(),
        }
    }
}

impl EngineConfig {
    /// Load from the JSON file named by `CONCIERGE_CONFIG`, or defaults.
    pub fn load() -> Result<Self> {
        match env_non_empty("CONCIERGE_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::ConfigError(format!("Invalid {}: {}", path.display(), e)))?;
        info!("Loaded engine configuration from {}", path.display());
        Ok(config)
    }

    /// Source identifier for a domain, falling back to the catalog default.
    pub fn source_for(&self, domain: Domain) -> &str {
        self.sources
            .get(&domain)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| domain.default_source())
    }

    /// One unloaded spec per domain, in load order.
    pub fn model_specs(&self) -> Vec<ModelSpec> {
        Domain::all()
            .iter()
            .map(|domain| ModelSpec::new(*domain, self.source_for(*domain)))
            .collect()
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_cache_dir() -> PathBuf {
    if let Some(from_env) = env_non_empty("CONCIERGE_CACHE_DIR") {
        return PathBuf::from(from_env);
    }

    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("concierge")
        .join("hub")
}

fn default_device() -> Option<String> {
    env_non_empty("CONCIERGE_DEVICE").map(|v| v.to_ascii_lowercase())
}

fn default_dtype() -> Option<String> {
    env_non_empty("CONCIERGE_DTYPE").map(|v| v.to_ascii_lowercase())
}

fn default_tokenizer_fallback() -> Option<String> {
    match std::env::var("CONCIERGE_TOKENIZER_FALLBACK") {
        // An explicitly empty value disables the fallback.
        Ok(value) => Some(value.trim().to_string()).filter(|v| !v.is_empty()),
        Err(_) => Some("google-t5/t5-small".to_string()),
    }
}

fn default_sources() -> BTreeMap<Domain, String> {
    Domain::all()
        .iter()
        .map(|domain| {
            let source = env_non_empty(&domain.source_env_var())
                .unwrap_or_else(|| domain.default_source().to_string());
            (*domain, source)
        })
        .collect()
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on in-flight generation requests
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Caller-side deadline for one generation (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    env_non_empty("CONCIERGE_HOST").unwrap_or_else(|| "0.0.0.0".to_string())
}

fn default_port() -> u16 {
    match env_non_empty("CONCIERGE_PORT") {
        Some(raw) => match raw.parse::<u16>() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!("Invalid CONCIERGE_PORT='{}', falling back to 8000", raw);
                8000
            }
        },
        None => 8000,
    }
}

fn default_max_concurrent_requests() -> usize {
    env_non_empty("MAX_CONCURRENT_REQUESTS")
        .and_then(|s| s.parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(100)
}

fn default_request_timeout_secs() -> u64 {
    env_non_empty("REQUEST_TIMEOUT_SECS")
        .and_then(|s| s.parse().ok())
        .unwrap_or(300)
}
