use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Experiment endpoints
        .route("/api/experiments", post(handlers::create_experiment))
        .route("/api/experiments", get(handlers::list_experiments))
        .route(
            "/api/experiments/compare",
            post(handlers::compare_experiments),
        )
        .route("/api/experiments/:id", get(handlers::get_experiment))
        .route("/api/experiments/:id", patch(handlers::update_experiment))
        .route("/api/experiments/:id", delete(handlers::delete_experiment))
        // Liveness endpoint
        .route("/health", get(handlers::health_handler))
        // Add state and CORS
        .with_state(state)
        .layer(cors)
}
