use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::api::handlers::store_error;
use crate::api::state::AppState;
use crate::api::types::{
    CompareExperimentsRequest, DeleteExperimentResponse, ListExperimentsQuery,
};
use crate::domain::{
    Experiment, ExperimentComparison, ExperimentFilter, ExperimentUpdate, NewExperiment,
};

/// POST /api/experiments
pub async fn create_experiment(
    State(state): State<AppState>,
    Json(req): Json<NewExperiment>,
) -> std::result::Result<Json<Experiment>, (StatusCode, String)> {
    if req.name.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "experiment name is required".to_string(),
        ));
    }

    let experiment = state.store.create(&req).await.map_err(store_error)?;
    Ok(Json(experiment))
}

/// GET /api/experiments
pub async fn list_experiments(
    State(state): State<AppState>,
    Query(query): Query<ListExperimentsQuery>,
) -> std::result::Result<Json<Vec<Experiment>>, (StatusCode, String)> {
    let (skip, limit) = page_bounds(query.skip, query.limit);
    let filter = ExperimentFilter {
        status: query.status,
        user: query.user,
        skip,
        limit,
    };

    let experiments = state.store.list(&filter).await.map_err(store_error)?;
    Ok(Json(experiments))
}

/// Postgres rejects negative OFFSET/LIMIT, so both are floored at zero.
/// No upper bound on limit.
fn page_bounds(skip: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    (skip.unwrap_or(0).max(0), limit.unwrap_or(10).max(0))
}

/// GET /api/experiments/:id
pub async fn get_experiment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> std::result::Result<Json<Experiment>, (StatusCode, String)> {
    let experiment = state.store.get(id).await.map_err(store_error)?;
    Ok(Json(experiment))
}

/// PATCH /api/experiments/:id
///
/// Mapping fields shallow-merge into the stored values; status replaces.
pub async fn update_experiment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(update): Json<ExperimentUpdate>,
) -> std::result::Result<Json<Experiment>, (StatusCode, String)> {
    let experiment = state
        .store
        .update(id, &update)
        .await
        .map_err(store_error)?;
    Ok(Json(experiment))
}

/// POST /api/experiments/compare
pub async fn compare_experiments(
    State(state): State<AppState>,
    Json(req): Json<CompareExperimentsRequest>,
) -> std::result::Result<Json<ExperimentComparison>, (StatusCode, String)> {
    let comparison = state
        .store
        .compare(&req.experiment_ids)
        .await
        .map_err(store_error)?;
    Ok(Json(comparison))
}

/// DELETE /api/experiments/:id
pub async fn delete_experiment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> std::result::Result<Json<DeleteExperimentResponse>, (StatusCode, String)> {
    state.store.delete(id).await.map_err(store_error)?;
    Ok(Json(DeleteExperimentResponse { success: true, id }))
}

#[cfg(test)]
mod tests {
    use super::page_bounds;

    #[test]
    fn test_page_bounds_defaults() {
        assert_eq!(page_bounds(None, None), (0, 10));
    }

    #[test]
    fn test_page_bounds_floors_negatives() {
        assert_eq!(page_bounds(Some(-3), Some(-1)), (0, 0));
    }

    #[test]
    fn test_page_bounds_has_no_upper_cap() {
        assert_eq!(page_bounds(Some(40), Some(5000)), (40, 5000));
    }
}
