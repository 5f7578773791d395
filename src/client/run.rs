use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::{info, warn};

use crate::client::rest::{ApiClient, DEFAULT_BASE_URL};
use crate::domain::{merge_map, ExperimentStatus, ExperimentUpdate, JsonMap, NewExperiment};
use crate::error::{Result, TrackerError};

/// Builder for [`TrackedRun`]
#[derive(Debug, Clone)]
pub struct TrackedRunBuilder {
    name: String,
    base_url: String,
    description: Option<String>,
    user: Option<String>,
    dataset_version: Option<String>,
    artifacts_dir: PathBuf,
    auto_git: bool,
}

impl TrackedRunBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            description: None,
            user: None,
            dataset_version: None,
            artifacts_dir: default_artifacts_dir(),
            auto_git: true,
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

    /// Defaults to `$USER`, falling back to "unknown"
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn dataset_version(mut self, version: impl Into<String>) -> Self {
        self.dataset_version = Some(version.into());
        self
    }

    /// Root directory for artifact files.
    ///
    /// Defaults to `$EXPTRACK_ARTIFACTS_DIR`, falling back to `./artifacts`.
    pub fn artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    /// Detect git branch/commit at start (default true)
    pub fn auto_git(mut self, enabled: bool) -> Self {
        self.auto_git = enabled;
        self
    }

    fn new_experiment(&self, git: GitInfo) -> NewExperiment {
        let user = self
            .user
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "unknown".to_string());

        NewExperiment {
            name: self.name.clone(),
            description: self.description.clone(),
            user: Some(user),
            git_branch: git.branch,
            git_commit: git.commit,
            dataset_version: self.dataset_version.clone(),
        }
    }

    /// Create the server-side experiment and return the live handle.
    ///
    /// Any failure here is fatal: no handle exists without a server id.
    pub async fn start(self) -> Result<TrackedRun> {
        let client = ApiClient::new(&self.base_url)?;

        let git = if self.auto_git {
            detect_git_info()
        } else {
            GitInfo::default()
        };

        let experiment = client.create_experiment(&self.new_experiment(git)).await?;
        info!(
            "Created experiment id={} name={}",
            experiment.id, experiment.name
        );

        Ok(TrackedRun {
            client,
            id: experiment.id,
            name: experiment.name,
            artifacts_dir: self.artifacts_dir,
            params: JsonMap::new(),
            metrics: JsonMap::new(),
            artifacts: JsonMap::new(),
        })
    }
}

/// A live tracked run bound to one server-side experiment.
///
/// The local `params`/`metrics`/`artifacts` copies are authoritative:
/// every mutating call pushes the complete local state (never deltas) and
/// relies on the server's shallow merge to reconcile, so a push that
/// failed is healed by the next successful one.
pub struct TrackedRun {
    client: ApiClient,
    id: i32,
    name: String,
    artifacts_dir: PathBuf,
    params: JsonMap,
    metrics: JsonMap,
    artifacts: JsonMap,
}

impl TrackedRun {
    /// Start building a run with the given experiment name
    pub fn builder(name: impl Into<String>) -> TrackedRunBuilder {
        TrackedRunBuilder::new(name)
    }

    /// Server-assigned experiment id
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Merge parameters into local state, then push
    pub async fn log_params(&mut self, params: JsonMap) {
        merge_map(&mut self.params, params);
        self.sync().await;
    }

    /// Single-parameter convenience
    pub async fn log_param(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) {
        let mut map = JsonMap::new();
        map.insert(key.into(), value.into());
        self.log_params(map).await;
    }

    /// Merge metrics into local state, then push
    pub async fn log_metrics(&mut self, metrics: JsonMap) {
        merge_map(&mut self.metrics, metrics);
        self.sync().await;
    }

    /// Single-metric convenience
    pub async fn log_metric(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) {
        let mut map = JsonMap::new();
        map.insert(key.into(), value.into());
        self.log_metrics(map).await;
    }

    /// Serialize a value to `<artifacts_dir>/exp_<id>/<name>.json`, record
    /// the path and push. Local I/O or serialization failure is an error;
    /// the push itself follows the usual reported-not-raised policy.
    pub async fn save_artifact<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        value: &T,
    ) -> Result<PathBuf> {
        let dir = self.experiment_dir();
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{name}.json"));
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, value)?;

        self.record_artifact(name, &path).await;
        info!("Saved artifact {}", path.display());
        Ok(path)
    }

    /// Copy an existing file under the run's artifact directory, record
    /// the copied path and push.
    pub async fn log_file(&mut self, name: &str, source: impl AsRef<Path>) -> Result<PathBuf> {
        let source = source.as_ref();
        if !source.exists() {
            return Err(TrackerError::Validation(format!(
                "file not found: {}",
                source.display()
            )));
        }
        let Some(file_name) = source.file_name() else {
            return Err(TrackerError::Validation(format!(
                "not a file path: {}",
                source.display()
            )));
        };

        let dir = self.experiment_dir();
        std::fs::create_dir_all(&dir)?;

        let dest = dir.join(format!("{}_{}", name, file_name.to_string_lossy()));
        std::fs::copy(source, &dest)?;

        self.record_artifact(name, &dest).await;
        info!("Registered file {}", dest.display());
        Ok(dest)
    }

    /// Send a status-only update; failures are reported, not returned
    pub async fn set_status(&self, status: ExperimentStatus) {
        let update = ExperimentUpdate::status(status);
        if let Err(e) = self.client.update_experiment(self.id, &update).await {
            warn!("Failed to set status on experiment {}: {}", self.id, e);
        }
    }

    /// Finish the run as completed
    pub async fn end(self) {
        self.end_with_status(ExperimentStatus::Completed).await;
    }

    /// Finish the run with an explicit terminal status
    pub async fn end_with_status(self, status: ExperimentStatus) {
        self.set_status(status).await;
        info!("Experiment {} finished: {}", self.id, status);
    }

    /// Push the complete local state; failures are reported, not returned.
    /// Local state stays authoritative, so the next push resends it all.
    pub async fn sync(&self) {
        let update = ExperimentUpdate {
            params: Some(self.params.clone()),
            metrics: Some(self.metrics.clone()),
            artifacts: Some(self.artifacts.clone()),
            status: None,
        };

        if let Err(e) = self.client.update_experiment(self.id, &update).await {
            warn!("Failed to sync experiment {}: {}", self.id, e);
        }
    }

    async fn record_artifact(&mut self, name: &str, path: &Path) {
        self.artifacts.insert(
            name.to_string(),
            serde_json::Value::String(path.display().to_string()),
        );
        self.sync().await;
    }

    fn experiment_dir(&self) -> PathBuf {
        self.artifacts_dir.join(format!("exp_{}", self.id))
    }
}

fn default_artifacts_dir() -> PathBuf {
    std::env::var("EXPTRACK_ARTIFACTS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("artifacts"))
}

#[derive(Debug, Default)]
struct GitInfo {
    branch: Option<String>,
    commit: Option<String>,
}

/// Best-effort detection; no git binary, no repository or empty output
/// all yield no git fields.
fn detect_git_info() -> GitInfo {
    GitInfo {
        branch: git_output(&["rev-parse", "--abbrev-ref", "HEAD"]),
        commit: git_output(&["rev-parse", "HEAD"]),
    }
}

fn git_output(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
}
