use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::api::types::{
    CompareExperimentsRequest, DeleteExperimentResponse, HealthResponse, ListExperimentsQuery,
};
use crate::domain::{Experiment, ExperimentComparison, ExperimentUpdate, NewExperiment};
use crate::error::{Result, TrackerError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Typed HTTP client for the experiment API.
///
/// One method per endpoint, sharing the server's request and response
/// types. No retries; every call is a single request.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();

        let http = Client::builder()
            .user_agent("exptrack-client/0.1")
            .build()
            .map_err(|e| TrackerError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /api/experiments
    pub async fn create_experiment(&self, new: &NewExperiment) -> Result<Experiment> {
        let resp = self
            .http
            .post(format!("{}/api/experiments", self.base_url))
            .json(new)
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// GET /api/experiments
    pub async fn list_experiments(&self, query: &ListExperimentsQuery) -> Result<Vec<Experiment>> {
        let resp = self
            .http
            .get(format!("{}/api/experiments", self.base_url))
            .query(query)
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// GET /api/experiments/:id
    pub async fn get_experiment(&self, id: i32) -> Result<Experiment> {
        let resp = self
            .http
            .get(format!("{}/api/experiments/{}", self.base_url, id))
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// PATCH /api/experiments/:id
    pub async fn update_experiment(
        &self,
        id: i32,
        update: &ExperimentUpdate,
    ) -> Result<Experiment> {
        let resp = self
            .http
            .patch(format!("{}/api/experiments/{}", self.base_url, id))
            .json(update)
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// POST /api/experiments/compare
    pub async fn compare_experiments(&self, ids: &[i32]) -> Result<ExperimentComparison> {
        let resp = self
            .http
            .post(format!("{}/api/experiments/compare", self.base_url))
            .json(&CompareExperimentsRequest {
                experiment_ids: ids.to_vec(),
            })
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// DELETE /api/experiments/:id
    pub async fn delete_experiment(&self, id: i32) -> Result<DeleteExperimentResponse> {
        let resp = self
            .http
            .delete(format!("{}/api/experiments/{}", self.base_url, id))
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// GET /health
    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        let text = resp.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(TrackerError::NotFound(text));
        }
        if !status.is_success() {
            return Err(TrackerError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::ApiClient;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");

        let client = ApiClient::new("http://tracker.internal:9000").unwrap();
        assert_eq!(client.base_url(), "http://tracker.internal:9000");
    }
}
