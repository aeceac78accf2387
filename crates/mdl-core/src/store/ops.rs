//! Record operations: save (upsert), load, list, state, delete, recovery.

use anyhow::{Context, Result};
use sqlx::Row;

use super::db::{unix_timestamp, OperationStore};
use crate::model::{JobState, QueuedOperation};

/// Listing view of a stored record.
#[derive(Debug, Clone)]
pub struct StoredOperation {
    pub location_key: String,
    pub job_id: String,
    pub series_url: String,
    pub state: JobState,
    pub updated_at: i64,
}

impl OperationStore {
    /// Insert or replace the record for `op.location_key()`.
    ///
    /// Keeps the existing state column unless none exists yet (then `queued`).
    /// Saving the same record twice leaves the store unchanged apart from `updated_at`.
    pub async fn save(&self, op: &QueuedOperation) -> Result<()> {
        let key = op.location_key();
        let json = serde_json::to_string(op).context("serialize operation")?;
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO operations
                (location_key, job_id, series_url, state, record_json, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(location_key) DO UPDATE SET
                job_id = excluded.job_id,
                series_url = excluded.series_url,
                record_json = excluded.record_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&key)
        .bind(&op.job_id)
        .bind(&op.series_url)
        .bind(JobState::Queued.as_str())
        .bind(&json)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("save operation {key}"))?;
        Ok(())
    }

    /// Load the record stored under `location_key`.
    pub async fn load(&self, location_key: &str) -> Result<Option<QueuedOperation>> {
        let row = sqlx::query("SELECT record_json FROM operations WHERE location_key = ?1")
            .bind(location_key)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let json: String = row.get("record_json");
        let op = serde_json::from_str(&json)
            .with_context(|| format!("malformed record for {location_key}"))?;
        Ok(Some(op))
    }

    /// Stored state for `location_key`, if a record exists.
    pub async fn state(&self, location_key: &str) -> Result<Option<JobState>> {
        let row = sqlx::query("SELECT state FROM operations WHERE location_key = ?1")
            .bind(location_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| JobState::from_str(&r.get::<String, _>("state"))))
    }

    /// All records, most recently updated first.
    pub async fn list(&self) -> Result<Vec<StoredOperation>> {
        let rows = sqlx::query(
            r#"
            SELECT location_key, job_id, series_url, state, updated_at
            FROM operations
            ORDER BY updated_at DESC, location_key ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let state: String = row.get("state");
            out.push(StoredOperation {
                location_key: row.get("location_key"),
                job_id: row.get("job_id"),
                series_url: row.get("series_url"),
                state: JobState::from_str(&state),
                updated_at: row.get("updated_at"),
            });
        }
        Ok(out)
    }

    pub async fn set_state(&self, location_key: &str, state: JobState) -> Result<()> {
        sqlx::query("UPDATE operations SET state = ?1, updated_at = ?2 WHERE location_key = ?3")
            .bind(state.as_str())
            .bind(unix_timestamp())
            .bind(location_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove a record. Returns whether one existed.
    pub async fn delete(&self, location_key: &str) -> Result<bool> {
        let res = sqlx::query("DELETE FROM operations WHERE location_key = ?1")
            .bind(location_key)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Reset rows left `running` by a process that exited mid-job to `paused`.
    /// Call once at startup, before any job is started.
    pub async fn recover_running(&self) -> Result<u64> {
        let res = sqlx::query("UPDATE operations SET state = ?1, updated_at = ?2 WHERE state = ?3")
            .bind(JobState::Paused.as_str())
            .bind(unix_timestamp())
            .bind(JobState::Running.as_str())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}
