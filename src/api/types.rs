use serde::{Deserialize, Serialize};

use crate::domain::ExperimentStatus;

/// Query parameters for GET /api/experiments.
///
/// Absent filters mean no restriction; skip/limit default to 0/10.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListExperimentsQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<ExperimentStatus>,
    pub user: Option<String>,
}

/// POST /api/experiments/compare request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompareExperimentsRequest {
    pub experiment_ids: Vec<i32>,
}

/// DELETE /api/experiments/:id confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteExperimentResponse {
    pub success: bool,
    pub id: i32,
}

/// GET /health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::CompareExperimentsRequest;
    use serde_json::json;

    #[test]
    fn compare_request_rejects_unknown_fields() {
        let payload = json!({
            "experiment_ids": [1, 2],
            "mode": "full"
        });

        let parsed = serde_json::from_value::<CompareExperimentsRequest>(payload);
        assert!(parsed.is_err());
    }
}
