//! Health check endpoint

use axum::{extract::State, Json};
use concierge_core::{ComputeTarget, Domain, ModelStatus};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub compute_target: ComputeTarget,
    pub models: Vec<DomainHealth>,
}

#[derive(Debug, Serialize)]
pub struct DomainHealth {
    pub domain: Domain,
    pub status: ModelStatus,
}

/// `ok` when every domain loaded, `degraded` otherwise.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.registry();
    let models: Vec<DomainHealth> = registry
        .specs()
        .map(|spec| DomainHealth {
            domain: spec.domain,
            status: spec.status,
        })
        .collect();
    let status = if models.iter().all(|m| m.status.is_loaded()) {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        compute_target: registry.compute_target(),
        models,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::testing::{FakeBehavior, FakeSource};

    use crate::api::test_support::state_with;

    #[tokio::test]
    async fn all_loaded_is_ok() {
        let Json(health) = health_check(State(state_with(FakeSource::new()))).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.models.len(), 4);
        assert_eq!(health.compute_target, ComputeTarget::Cpu);
    }

    #[tokio::test]
    async fn failed_domain_degrades() {
        let state = state_with(FakeSource::new().with(Domain::Medical, FakeBehavior::LoadError));
        let Json(health) = health_check(State(state)).await;
        assert_eq!(health.status, "degraded");

        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["models"][1]["domain"], "medical");
        assert_eq!(json["models"][1]["status"], "failed");
        assert_eq!(json["compute_target"], "cpu");
    }
}
