//! Resolution of model source identifiers to files on disk.
//!
//! A source identifier is either a local directory or a HuggingFace Hub
//! repository id. Hub files are fetched through the `hf-hub` cache.

use std::fs;
use std::path::{Path, PathBuf};

use hf_hub::api::sync::{Api, ApiBuilder, ApiRepo};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::ModelSpec;
use crate::config::EngineConfig;
use crate::device::DeviceProfile;
use crate::error::{Error, Result};
use crate::models::{LoadedModel, ModelSource, T5Generator};
use crate::tokenizer::Tokenizer;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const SAFETENSORS_FILE: &str = "model.safetensors";
const SAFETENSORS_INDEX_FILE: &str = "model.safetensors.index.json";
const PYTORCH_FILE: &str = "pytorch_model.bin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightsFormat {
    Safetensors,
    Pytorch,
}

/// Files needed to build one seq2seq model.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: Vec<PathBuf>,
    pub format: WeightsFormat,
}

enum SourceLocation {
    Local(PathBuf),
    Hub { repo_id: String, repo: ApiRepo },
}

impl SourceLocation {
    fn describe(&self) -> String {
        match self {
            Self::Local(dir) => dir.display().to_string(),
            Self::Hub { repo_id, .. } => repo_id.clone(),
        }
    }

    /// Returns `None` when the file is absent from the source.
    fn fetch(&self, filename: &str) -> Option<PathBuf> {
        match self {
            Self::Local(dir) => {
                let path = dir.join(filename);
                path.is_file().then_some(path)
            }
            Self::Hub { repo_id, repo } => match repo.get(filename) {
                Ok(path) => Some(path),
                Err(e) => {
                    debug!("{} not available from {}: {}", filename, repo_id, e);
                    None
                }
            },
        }
    }

    fn require(&self, filename: &str) -> Result<PathBuf> {
        self.fetch(filename).ok_or_else(|| {
            Error::ModelLoadError(format!("{} is missing {}", self.describe(), filename))
        })
    }
}

/// Model source that reads local directories and the HuggingFace Hub.
pub struct HubModelSource {
    api: Option<Api>,
    tokenizer_fallback: Option<String>,
    dtype: Option<String>,
}

impl HubModelSource {
    pub fn new(config: &EngineConfig) -> Self {
        let api = match ApiBuilder::new()
            .with_cache_dir(config.cache_dir.clone())
            .with_progress(false)
            .build()
        {
            Ok(api) => Some(api),
            Err(e) => {
                warn!("HuggingFace Hub unavailable, only local sources will load: {}", e);
                None
            }
        };

        Self {
            api,
            tokenizer_fallback: config.tokenizer_fallback.clone(),
            dtype: config.dtype.clone(),
        }
    }

    fn locate(&self, source: &str) -> Result<SourceLocation> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(Error::ModelLoadError("Empty model source".to_string()));
        }

        let local = Path::new(trimmed);
        if local.is_dir() {
            return Ok(SourceLocation::Local(local.to_path_buf()));
        }

        let api = self.api.as_ref().ok_or_else(|| {
            Error::HfHubError(format!(
                "{trimmed} is not a local directory and the hub client is unavailable"
            ))
        })?;
        Ok(SourceLocation::Hub {
            repo_id: trimmed.to_string(),
            repo: api.model(trimmed.to_string()),
        })
    }

    /// Resolve every file a T5 checkpoint needs.
    pub fn resolve(&self, source: &str) -> Result<ModelFiles> {
        let location = self.locate(source)?;
        info!("Resolving model files from {}", location.describe());

        let config = location.require(CONFIG_FILE)?;
        let (weights, format) = resolve_weights(&location)?;
        let tokenizer = match location.fetch(TOKENIZER_FILE) {
            Some(path) => path,
            None => self.fallback_tokenizer(&location)?,
        };

        Ok(ModelFiles {
            config,
            tokenizer,
            weights,
            format,
        })
    }

    fn fallback_tokenizer(&self, location: &SourceLocation) -> Result<PathBuf> {
        let fallback = self.tokenizer_fallback.as_deref().ok_or_else(|| {
            Error::ModelLoadError(format!(
                "{} has no {} and no tokenizer fallback is configured",
                location.describe(),
                TOKENIZER_FILE
            ))
        })?;

        warn!(
            "{} has no {}, using tokenizer from {}",
            location.describe(),
            TOKENIZER_FILE,
            fallback
        );
        self.locate(fallback)?.require(TOKENIZER_FILE)
    }
}

fn resolve_weights(location: &SourceLocation) -> Result<(Vec<PathBuf>, WeightsFormat)> {
    if let Some(path) = location.fetch(SAFETENSORS_FILE) {
        return Ok((vec![path], WeightsFormat::Safetensors));
    }

    if let Some(index_path) = location.fetch(SAFETENSORS_INDEX_FILE) {
        let shards = shard_names(&index_path)?;
        let paths = shards
            .iter()
            .map(|name| location.require(name))
            .collect::<Result<Vec<_>>>()?;
        return Ok((paths, WeightsFormat::Safetensors));
    }

    if let Some(path) = location.fetch(PYTORCH_FILE) {
        return Ok((vec![path], WeightsFormat::Pytorch));
    }

    Err(Error::ModelLoadError(format!(
        "{} has no {}, {} or {}",
        location.describe(),
        SAFETENSORS_FILE,
        SAFETENSORS_INDEX_FILE,
        PYTORCH_FILE
    )))
}

fn shard_names(index_path: &Path) -> Result<Vec<String>> {
    let index: Value = serde_json::from_str(&fs::read_to_string(index_path)?)?;
    let weight_map = index
        .get("weight_map")
        .and_then(|m| m.as_object())
        .ok_or_else(|| {
            Error::ModelLoadError(format!("Invalid {}", SAFETENSORS_INDEX_FILE))
        })?;

    let mut shards: Vec<String> = weight_map
        .values()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();
    shards.sort();
    shards.dedup();
    Ok(shards)
}

impl ModelSource for HubModelSource {
    fn load(&self, spec: &ModelSpec, device: &DeviceProfile) -> Result<LoadedModel> {
        let files = self.resolve(&spec.source)?;
        let tokenizer = Tokenizer::from_file(&files.tokenizer)?;
        let generator = T5Generator::load(&files, device, self.dtype.as_deref())?;

        Ok(LoadedModel::new(
            Box::new(tokenizer),
            Box::new(generator),
            device.compute_target(),
        ))
    }
}
