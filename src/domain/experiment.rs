use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// JSON object used for params, metrics and artifacts
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Experiment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    /// Run in progress (default at creation)
    Running,
    /// Run finished successfully
    Completed,
    /// Run aborted with an error
    Failed,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Running => "running",
            ExperimentStatus::Completed => "completed",
            ExperimentStatus::Failed => "failed",
        }
    }

    /// Is this a terminal status for the run?
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExperimentStatus::Completed | ExperimentStatus::Failed
        )
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ExperimentStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "running" => Ok(ExperimentStatus::Running),
            "completed" => Ok(ExperimentStatus::Completed),
            "failed" => Ok(ExperimentStatus::Failed),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// One tracked run, identified by a server-assigned id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: i32,
    pub name: String,
    pub status: ExperimentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: Option<String>,
    pub git_branch: Option<String>,
    pub git_commit: Option<String>,
    pub dataset_version: Option<String>,
    pub description: Option<String>,
    pub params: JsonMap,
    pub metrics: JsonMap,
    pub artifacts: JsonMap,
}

/// Fields accepted when creating an experiment.
///
/// Status, timestamps and the three mappings are server-assigned; the
/// metadata fields here are set once and never re-set by later updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewExperiment {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub git_commit: Option<String>,
    #[serde(default)]
    pub dataset_version: Option<String>,
}

/// Partial update for an experiment.
///
/// `params`/`metrics`/`artifacts` are shallow-merged into the stored
/// mappings (new keys added, existing keys overwritten); `status`
/// replaces the column. An absent field leaves the column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentUpdate {
    #[serde(default)]
    pub params: Option<JsonMap>,
    #[serde(default)]
    pub metrics: Option<JsonMap>,
    #[serde(default)]
    pub artifacts: Option<JsonMap>,
    #[serde(default)]
    pub status: Option<ExperimentStatus>,
}

impl ExperimentUpdate {
    /// Status-only update
    pub fn status(status: ExperimentStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Filter and pagination for listing experiments
#[derive(Debug, Clone, Default)]
pub struct ExperimentFilter {
    pub status: Option<ExperimentStatus>,
    pub user: Option<String>,
    pub skip: i64,
    pub limit: i64,
}

/// Derived summary for a set of compared experiments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub count: usize,
    pub params_keys: Vec<String>,
    pub metrics_keys: Vec<String>,
}

/// Compare result: the matched records plus key unions across them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentComparison {
    pub experiments: Vec<Experiment>,
    pub comparison: ComparisonSummary,
}

impl ExperimentComparison {
    /// Build the summary from the matched records.
    ///
    /// Key unions are sorted so the output is stable regardless of the
    /// order keys were logged in.
    pub fn from_experiments(experiments: Vec<Experiment>) -> Self {
        let mut params_keys = BTreeSet::new();
        let mut metrics_keys = BTreeSet::new();

        for exp in &experiments {
            params_keys.extend(exp.params.keys().cloned());
            metrics_keys.extend(exp.metrics.keys().cloned());
        }

        let comparison = ComparisonSummary {
            count: experiments.len(),
            params_keys: params_keys.into_iter().collect(),
            metrics_keys: metrics_keys.into_iter().collect(),
        };

        Self {
            experiments,
            comparison,
        }
    }
}

/// Shallow-merge `updates` into `base`: new keys added, existing keys
/// overwritten, keys absent from `updates` untouched.
pub fn merge_map(base: &mut JsonMap, updates: JsonMap) {
    for (key, value) in updates {
        base.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: serde_json::Value) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(
            ExperimentStatus::try_from("running").unwrap(),
            ExperimentStatus::Running
        );
        assert_eq!(
            ExperimentStatus::try_from("COMPLETED").unwrap(),
            ExperimentStatus::Completed
        );
        assert_eq!(
            ExperimentStatus::try_from("Failed").unwrap(),
            ExperimentStatus::Failed
        );
        assert!(ExperimentStatus::try_from("paused").is_err());

        for status in [
            ExperimentStatus::Running,
            ExperimentStatus::Completed,
            ExperimentStatus::Failed,
        ] {
            assert_eq!(
                ExperimentStatus::try_from(status.as_str()).unwrap(),
                status
            );
        }
    }

    #[test]
    fn test_status_serde_is_lowercase() {
        assert_eq!(
            serde_json::to_value(ExperimentStatus::Running).unwrap(),
            json!("running")
        );
        let parsed: ExperimentStatus = serde_json::from_value(json!("failed")).unwrap();
        assert_eq!(parsed, ExperimentStatus::Failed);
        assert!(serde_json::from_value::<ExperimentStatus>(json!("bogus")).is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ExperimentStatus::Running.is_terminal());
        assert!(ExperimentStatus::Completed.is_terminal());
        assert!(ExperimentStatus::Failed.is_terminal());
    }

    #[test]
    fn test_merge_map_adds_and_overwrites() {
        let mut base = map(json!({"lr": 0.001, "optimizer": "adam"}));
        merge_map(&mut base, map(json!({"epochs": 100, "lr": 0.01})));

        assert_eq!(base.get("lr").unwrap(), &json!(0.01));
        assert_eq!(base.get("epochs").unwrap(), &json!(100));
        assert_eq!(base.get("optimizer").unwrap(), &json!("adam"));
    }

    #[test]
    fn test_merge_map_empty_is_noop() {
        let mut base = map(json!({"lr": 0.001}));
        merge_map(&mut base, JsonMap::new());
        assert_eq!(base, map(json!({"lr": 0.001})));
    }

    #[test]
    fn test_update_rejects_unknown_fields() {
        let parsed = serde_json::from_value::<ExperimentUpdate>(json!({
            "params": {"lr": 0.1},
            "nonsense": true
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_new_experiment_rejects_unknown_fields() {
        let parsed = serde_json::from_value::<NewExperiment>(json!({
            "name": "run",
            "id": 7
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_comparison_unions_keys_sorted() {
        let now = Utc::now();
        let exp = |id: i32, params: serde_json::Value, metrics: serde_json::Value| Experiment {
            id,
            name: format!("exp-{id}"),
            status: ExperimentStatus::Running,
            created_at: now,
            updated_at: now,
            user: None,
            git_branch: None,
            git_commit: None,
            dataset_version: None,
            description: None,
            params: map(params),
            metrics: map(metrics),
            artifacts: JsonMap::new(),
        };

        let cmp = ExperimentComparison::from_experiments(vec![
            exp(1, json!({"b": 1, "a": 1}), json!({"loss": 0.2})),
            exp(2, json!({"c": 2}), json!({"accuracy": 0.9, "loss": 0.1})),
        ]);

        assert_eq!(cmp.comparison.count, 2);
        assert_eq!(cmp.comparison.params_keys, vec!["a", "b", "c"]);
        assert_eq!(cmp.comparison.metrics_keys, vec!["accuracy", "loss"]);
    }
}
