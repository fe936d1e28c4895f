//! API routes and handlers

mod generate;
mod health;
mod models;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use concierge_core::Domain;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use generate::TextRequest;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let mut router: Router<AppState> = Router::new()
        .route("/", get(generate::usage))
        .route("/generate/:domain", post(generate::generate_for_key))
        .route("/health", get(health::health_check))
        .route("/models", get(models::list_models));

    // One fixed route per domain, all sharing the generic handler.
    for domain in Domain::all().iter().copied() {
        router = router.route(
            &format!("/{}", domain.key()),
            post(move |state: State<AppState>, body: Json<TextRequest>| {
                generate::generate_for_domain(domain, state, body)
            }),
        );
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
