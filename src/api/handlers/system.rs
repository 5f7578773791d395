use axum::Json;

use crate::api::types::HealthResponse;

/// GET /health -- fixed liveness response, no side effects
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
