//! Model listing endpoint

use axum::{extract::State, Json};
use concierge_core::{ComputeTarget, ModelStatus};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub key: &'static str,
    pub name: &'static str,
    pub source: String,
    pub status: ModelStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present only for loaded models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_target: Option<ComputeTarget>,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelEntry>,
}

/// List every configured domain model with its load outcome
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let registry = state.registry();
    let models = registry
        .specs()
        .map(|spec| ModelEntry {
            key: spec.key(),
            name: spec.domain.display_name(),
            source: spec.source.clone(),
            status: spec.status,
            error: spec.error_message.clone(),
            compute_target: registry.get(spec.key()).map(|m| m.compute_target()),
        })
        .collect();

    Json(ModelsResponse { models })
}
