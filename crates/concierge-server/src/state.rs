//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use concierge_core::{GenerationService, ModelRegistry, ServerConfig};
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GenerationService>,
    /// Bounds in-flight generations across all domains
    pub request_semaphore: Arc<Semaphore>,
    pub request_timeout_secs: u64,
}

impl AppState {
    pub fn new(registry: Arc<ModelRegistry>, config: &ServerConfig) -> Self {
        Self {
            service: Arc::new(GenerationService::new(registry)),
            request_semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            request_timeout_secs: config.request_timeout_secs,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        self.service.registry()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub async fn acquire_permit(&self) -> Result<SemaphorePermit<'_>, ApiError> {
        self.request_semaphore
            .acquire()
            .await
            .map_err(|_| ApiError::internal("Server is shutting down"))
    }
}
