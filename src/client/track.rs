use std::future::Future;

use serde::Serialize;
use tracing::warn;

use crate::client::rest::DEFAULT_BASE_URL;
use crate::client::run::TrackedRun;
use crate::domain::{ExperimentStatus, JsonMap};
use crate::error::Result;

/// Options for [`track`]
#[derive(Debug, Clone)]
pub struct TrackOptions {
    name: String,
    base_url: String,
    description: Option<String>,
    user: Option<String>,
    params: JsonMap,
    log_result: bool,
}

impl TrackOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            description: None,
            user: None,
            params: JsonMap::new(),
            log_result: true,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Parameters logged before the closure runs
    pub fn params(mut self, params: JsonMap) -> Self {
        self.params = params;
        self
    }

    /// Single-parameter convenience
    pub fn param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Log the closure's return value as metrics (default true)
    pub fn log_result(mut self, enabled: bool) -> Self {
        self.log_result = enabled;
        self
    }
}

/// Run a closure as a tracked experiment.
///
/// Creates the run (failure is fatal), logs the configured params, then
/// invokes the closure. An Ok value is logged as metrics -- a JSON object
/// one metric per key, any other non-null value under "result" -- and the
/// run ends completed. An Err marks the run failed and is propagated
/// unchanged.
pub async fn track<F, Fut, T>(options: TrackOptions, f: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
    T: Serialize,
{
    let mut builder = TrackedRun::builder(&options.name).base_url(&options.base_url);
    if let Some(ref description) = options.description {
        builder = builder.description(description);
    }
    if let Some(ref user) = options.user {
        builder = builder.user(user);
    }

    let mut run = builder.start().await?;

    if !options.params.is_empty() {
        run.log_params(options.params.clone()).await;
    }

    match f().await {
        Ok(value) => {
            if options.log_result {
                match serde_json::to_value(&value) {
                    Ok(json) => {
                        if let Some(metrics) = result_to_metrics(json) {
                            run.log_metrics(metrics).await;
                        }
                    }
                    Err(e) => warn!("Result not serializable, skipping metrics: {}", e),
                }
            }
            run.end().await;
            Ok(value)
        }
        Err(e) => {
            run.end_with_status(ExperimentStatus::Failed).await;
            Err(e)
        }
    }
}

/// An object becomes one metric per key, null nothing, anything else a
/// single "result" metric.
fn result_to_metrics(value: serde_json::Value) -> Option<JsonMap> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Object(map) => Some(map),
        other => {
            let mut map = JsonMap::new();
            map.insert("result".to_string(), other);
            Some(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_result_becomes_per_key_metrics() {
        let metrics = result_to_metrics(json!({"accuracy": 0.95, "loss": 0.1})).unwrap();
        assert_eq!(metrics.get("accuracy").unwrap(), &json!(0.95));
        assert_eq!(metrics.get("loss").unwrap(), &json!(0.1));
    }

    #[test]
    fn test_scalar_result_becomes_result_metric() {
        let metrics = result_to_metrics(json!(0.87)).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics.get("result").unwrap(), &json!(0.87));
    }

    #[test]
    fn test_null_result_logs_nothing() {
        assert!(result_to_metrics(serde_json::Value::Null).is_none());
    }

    #[test]
    fn test_options_accumulate_params() {
        let options = TrackOptions::new("run")
            .param("lr", 0.001)
            .param("epochs", 10);
        assert_eq!(options.params.get("lr").unwrap(), &json!(0.001));
        assert_eq!(options.params.get("epochs").unwrap(), &json!(10));
    }
}
