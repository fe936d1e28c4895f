//! Domain generation endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use concierge_core::Domain;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

const USAGE: &str = "Use /ecommerce, /medical, /restaurant, or /classify endpoints with POST method and {text: 'your query'}";

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub model: String,
    pub input: String,
    pub output: String,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub message: &'static str,
}

pub async fn usage() -> Json<UsageResponse> {
    Json(UsageResponse { message: USAGE })
}

/// Handler bound to one of the fixed domain routes.
pub async fn generate_for_domain(
    domain: Domain,
    State(state): State<AppState>,
    Json(req): Json<TextRequest>,
) -> Result<Json<TextResponse>, ApiError> {
    generate(&state, domain.key(), req.text).await
}

pub async fn generate_for_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<TextRequest>,
) -> Result<Json<TextResponse>, ApiError> {
    generate(&state, &key, req.text).await
}

async fn generate(state: &AppState, key: &str, text: String) -> Result<Json<TextResponse>, ApiError> {
    let _permit = state.acquire_permit().await?;

    let result = tokio::time::timeout(state.request_timeout(), state.service.generate(key, &text))
        .await
        .map_err(|_| {
            warn!("Generation for {} exceeded {}s", key, state.request_timeout_secs);
            ApiError::timeout(format!("Request for model '{key}' timed out"))
        })?
        .map_err(|e| {
            if !e.is_unavailable() {
                warn!("Generation for {} failed: {}", key, e);
            }
            ApiError::from(e)
        })?;

    Ok(Json(TextResponse {
        model: result.domain_key,
        input: result.input_text,
        output: result.output_text,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use concierge_core::testing::{FakeBehavior, FakeSource};

    use crate::api::test_support::state_with;

    fn body(text: &str) -> Json<TextRequest> {
        Json(TextRequest {
            text: text.to_string(),
        })
    }

    async fn error_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn ecommerce_route_returns_model_input_output() {
        let state = state_with(FakeSource::new());
        let Json(response) =
            generate_for_domain(Domain::Ecommerce, State(state), body("track parcel"))
                .await
                .unwrap();

        assert_eq!(response.model, "ecommerce");
        assert_eq!(response.input, "track parcel");
        assert_eq!(response.output, "track parcel");

        let value = serde_json::to_value(&response).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["input", "model", "output"]);
    }

    #[tokio::test]
    async fn failed_model_route_is_not_found() {
        let state = state_with(FakeSource::new().with(Domain::Medical, FakeBehavior::LoadError));
        let err = generate_for_domain(Domain::Medical, State(state), body("I feel dizzy"))
            .await
            .unwrap_err();

        let (status, json) = error_json(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["message"], "Model 'medical' not loaded.");
        assert!(json.get("output").is_none());
    }

    #[tokio::test]
    async fn generic_route_rejects_unknown_key() {
        let state = state_with(FakeSource::new());
        let err = generate_for_key(State(state), Path("legal".to_string()), body("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Model 'legal' not loaded.");
    }

    #[tokio::test]
    async fn generic_route_serves_known_key() {
        let state = state_with(FakeSource::new());
        let Json(response) =
            generate_for_key(State(state), Path("restaurant".to_string()), body("menu"))
                .await
                .unwrap();
        assert_eq!(response.model, "restaurant");
        assert_eq!(response.output, "menu");
    }

    #[tokio::test]
    async fn broken_generator_is_server_error() {
        let state = state_with(
            FakeSource::new().with(Domain::Classify, FakeBehavior::BrokenGenerator),
        );
        let err = generate_for_domain(Domain::Classify, State(state), body("refund"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn usage_hint_lists_routes() {
        let Json(response) = usage().await;
        assert_eq!(response.message, USAGE);
        assert!(response.message.contains("/classify"));
    }
}
