use crate::domain::{
    Experiment, ExperimentComparison, ExperimentFilter, ExperimentStatus, ExperimentUpdate,
    NewExperiment,
};
use crate::error::{Result, TrackerError};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info, instrument};

/// PostgreSQL storage for experiment records
#[derive(Clone)]
pub struct ExperimentStore {
    pool: PgPool,
}

impl ExperimentStore {
    /// Create a new store, connecting a fresh pool
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a store from an existing connection pool (zero-cost reuse)
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Ensure the experiments table and its indexes exist.
    ///
    /// Idempotent; run once at startup before serving requests. The JSONB
    /// column defaults give every row its own empty mapping.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS experiments (
                id              SERIAL PRIMARY KEY,
                name            TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'running'
                                CHECK (status IN ('running', 'completed', 'failed')),
                created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                user_name       TEXT,
                git_branch      TEXT,
                git_commit      TEXT,
                dataset_version TEXT,
                description     TEXT,
                params          JSONB NOT NULL DEFAULT '{}'::jsonb,
                metrics         JSONB NOT NULL DEFAULT '{}'::jsonb,
                artifacts       JSONB NOT NULL DEFAULT '{}'::jsonb
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_experiments_name ON experiments (name)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_experiments_created_at ON experiments (created_at)",
        )
        .execute(&self.pool)
        .await?;

        info!("Database schema ready");
        Ok(())
    }

    /// Insert a new experiment; status, timestamps and mappings are
    /// server-assigned.
    #[instrument(skip(self))]
    pub async fn create(&self, new: &NewExperiment) -> Result<Experiment> {
        let row = sqlx::query(
            r#"
            INSERT INTO experiments (name, user_name, git_branch, git_commit,
                                     dataset_version, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, status, created_at, updated_at, user_name,
                      git_branch, git_commit, dataset_version, description,
                      params, metrics, artifacts
            "#,
        )
        .bind(&new.name)
        .bind(&new.user)
        .bind(&new.git_branch)
        .bind(&new.git_commit)
        .bind(&new.dataset_version)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await?;

        let experiment = experiment_from_row(&row);
        debug!("Created experiment id={}", experiment.id);
        Ok(experiment)
    }

    /// List experiments matching the filter, most recent first.
    ///
    /// Absent filter fields mean no restriction; skip/limit apply after
    /// filtering.
    pub async fn list(&self, filter: &ExperimentFilter) -> Result<Vec<Experiment>> {
        // Build dynamic WHERE clauses
        let mut conditions = Vec::new();
        let mut idx = 1u32;

        if filter.status.is_some() {
            conditions.push(format!("status = ${idx}"));
            idx += 1;
        }
        if filter.user.is_some() {
            conditions.push(format!("user_name = ${idx}"));
            idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let offset_idx = idx;
        let limit_idx = idx + 1;
        let sql = format!(
            r#"
            SELECT id, name, status, created_at, updated_at, user_name,
                   git_branch, git_commit, dataset_version, description,
                   params, metrics, artifacts
            FROM experiments
            {where_clause}
            ORDER BY created_at DESC
            OFFSET ${offset_idx} LIMIT ${limit_idx}
            "#,
        );

        let mut query = sqlx::query(&sql);

        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(ref user) = filter.user {
            query = query.bind(user);
        }
        query = query.bind(filter.skip).bind(filter.limit);

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(experiment_from_row).collect())
    }

    /// Get an experiment by id
    pub async fn get(&self, id: i32) -> Result<Experiment> {
        let row = sqlx::query(
            r#"
            SELECT id, name, status, created_at, updated_at, user_name,
                   git_branch, git_commit, dataset_version, description,
                   params, metrics, artifacts
            FROM experiments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| TrackerError::NotFound(format!("Experiment {id} not found")))?;
        Ok(experiment_from_row(&row))
    }

    /// Apply a partial update and return the updated record.
    ///
    /// Mappings are shallow-merged via JSONB `||` (an absent mapping is a
    /// no-op merge with `{}`); status replaces the column when present;
    /// `updated_at` is refreshed on every successful update.
    #[instrument(skip(self, update))]
    pub async fn update(&self, id: i32, update: &ExperimentUpdate) -> Result<Experiment> {
        let params = update.params.clone().map(serde_json::Value::Object);
        let metrics = update.metrics.clone().map(serde_json::Value::Object);
        let artifacts = update.artifacts.clone().map(serde_json::Value::Object);

        let row = sqlx::query(
            r#"
            UPDATE experiments SET
                params     = params    || COALESCE($2, '{}'::jsonb),
                metrics    = metrics   || COALESCE($3, '{}'::jsonb),
                artifacts  = artifacts || COALESCE($4, '{}'::jsonb),
                status     = COALESCE($5, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, status, created_at, updated_at, user_name,
                      git_branch, git_commit, dataset_version, description,
                      params, metrics, artifacts
            "#,
        )
        .bind(id)
        .bind(params)
        .bind(metrics)
        .bind(artifacts)
        .bind(update.status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| TrackerError::NotFound(format!("Experiment {id} not found")))?;
        let experiment = experiment_from_row(&row);
        debug!("Updated experiment id={}", experiment.id);
        Ok(experiment)
    }

    /// Fetch the given ids and derive the comparison summary.
    ///
    /// Missing ids are skipped; matching zero records is NotFound.
    pub async fn compare(&self, ids: &[i32]) -> Result<ExperimentComparison> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, status, created_at, updated_at, user_name,
                   git_branch, git_commit, dataset_version, description,
                   params, metrics, artifacts
            FROM experiments
            WHERE id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(TrackerError::NotFound(format!(
                "No experiments found for ids {ids:?}"
            )));
        }

        let experiments: Vec<Experiment> = rows.iter().map(experiment_from_row).collect();
        Ok(ExperimentComparison::from_experiments(experiments))
    }

    /// Delete an experiment by id
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<()> {
        let result = sqlx::query("DELETE FROM experiments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TrackerError::NotFound(format!("Experiment {id} not found")));
        }

        debug!("Deleted experiment id={}", id);
        Ok(())
    }
}

fn experiment_from_row(row: &PgRow) -> Experiment {
    let status_str: String = row.get("status");

    Experiment {
        id: row.get("id"),
        name: row.get("name"),
        // The CHECK constraint only admits the three known values
        status: ExperimentStatus::try_from(status_str.as_str())
            .unwrap_or(ExperimentStatus::Running),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        user: row.get("user_name"),
        git_branch: row.get("git_branch"),
        git_commit: row.get("git_commit"),
        dataset_version: row.get("dataset_version"),
        description: row.get("description"),
        params: json_object(row, "params"),
        metrics: json_object(row, "metrics"),
        artifacts: json_object(row, "artifacts"),
    }
}

fn json_object(row: &PgRow, column: &str) -> crate::domain::JsonMap {
    row.get::<serde_json::Value, _>(column)
        .as_object()
        .cloned()
        .unwrap_or_default()
}
