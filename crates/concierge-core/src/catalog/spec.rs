//! Per-domain model specification and load status.

use serde::{Deserialize, Serialize};

use super::Domain;

/// Load status of a registry entry. Transitions once, from `Unloaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    /// Not attempted yet
    Unloaded,
    /// Loaded and ready for inference
    Loaded,
    /// Load attempt failed; unavailable for the process lifetime
    Failed,
}

impl ModelStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelStatus::Loaded)
    }
}

/// Static description of one domain model plus its load outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub domain: Domain,
    pub source: String,
    pub status: ModelStatus,
    pub error_message: Option<String>,
}

impl ModelSpec {
    pub fn new(domain: Domain, source: impl Into<String>) -> Self {
        Self {
            domain,
            source: source.into(),
            status: ModelStatus::Unloaded,
            error_message: None,
        }
    }

    pub fn key(&self) -> &'static str {
        self.domain.key()
    }

    /// Drop any load outcome carried in from outside the registry.
    pub(crate) fn reset(&mut self) {
        self.status = ModelStatus::Unloaded;
        self.error_message = None;
    }

    pub(crate) fn mark_loaded(&mut self) {
        debug_assert_eq!(self.status, ModelStatus::Unloaded);
        self.status = ModelStatus::Loaded;
    }

    pub(crate) fn mark_failed(&mut self, reason: impl Into<String>) {
        debug_assert_eq!(self.status, ModelStatus::Unloaded);
        self.status = ModelStatus::Failed;
        self.error_message = Some(reason.into());
    }
}
