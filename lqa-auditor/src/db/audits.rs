//! Audit job database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lqa_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::models::{AnalysisMethod, AuditJob, AuditKind, AuditMode, AuditProgress, AuditStatus};
use crate::types::PersistenceStore;
use crate::utils::retry_on_lock;

/// Default bound on lock-contention retries for one write
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// [`PersistenceStore`] backed by the `audits` table
#[derive(Clone)]
pub struct SqliteAuditStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteAuditStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    pub fn with_max_lock_wait_ms(mut self, max_lock_wait_ms: u64) -> Self {
        self.max_lock_wait_ms = max_lock_wait_ms;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Jobs currently in `status`, oldest first
    pub async fn list_by_status(&self, status: AuditStatus) -> Result<Vec<AuditJob>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM audits
            WHERE status = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM audits WHERE audit_id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceStore for SqliteAuditStore {
    async fn save(&self, job: &AuditJob) -> Result<()> {
        // Serialize before touching the database
        let audit_id = job.id.to_string();
        let target = to_json(&job.target, "target")?;
        let result = job.result.as_ref().map(|r| to_json(r, "result")).transpose()?;
        let usage = job.usage.as_ref().map(|u| to_json(u, "usage")).transpose()?;
        let created_at = job.created_at.to_rfc3339();
        let completed_at = job.completed_at.map(|dt| dt.to_rfc3339());
        let analysis_method = job.analysis_method.map(|m| m.as_str());

        retry_on_lock("save_audit", self.max_lock_wait_ms, || async {
            sqlx::query(
                r#"
                INSERT INTO audits (
                    audit_id, kind, mode, status, target,
                    progress_message, progress_step, progress_total,
                    blocked_reason, blocked_screenshot, error_message,
                    result, usage, analysis_method, created_at, completed_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(audit_id) DO UPDATE SET
                    status = excluded.status,
                    target = excluded.target,
                    progress_message = excluded.progress_message,
                    progress_step = excluded.progress_step,
                    progress_total = excluded.progress_total,
                    blocked_reason = excluded.blocked_reason,
                    blocked_screenshot = excluded.blocked_screenshot,
                    error_message = excluded.error_message,
                    result = excluded.result,
                    usage = excluded.usage,
                    analysis_method = excluded.analysis_method,
                    completed_at = excluded.completed_at
                "#,
            )
            .bind(&audit_id)
            .bind(job.kind.as_str())
            .bind(job.mode.as_str())
            .bind(job.status.as_str())
            .bind(&target)
            .bind(&job.progress.message)
            .bind(i64::from(job.progress.step))
            .bind(i64::from(job.progress.total))
            .bind(&job.blocked_reason)
            .bind(&job.blocked_screenshot)
            .bind(&job.error_message)
            .bind(&result)
            .bind(&usage)
            .bind(analysis_method)
            .bind(&created_at)
            .bind(&completed_at)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            Ok(())
        })
        .await
    }

    async fn load(&self, id: Uuid) -> Result<Option<AuditJob>> {
        let row = sqlx::query("SELECT * FROM audits WHERE audit_id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(job_from_row).transpose()
    }
}

fn to_json<T: serde::Serialize>(value: &T, field: &str) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize {field}: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(text: &str, field: &str) -> Result<T> {
    serde_json::from_str(text)
        .map_err(|e| Error::Internal(format!("Failed to deserialize {field}: {e}")))
}

fn parse_time(text: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {field}: {e}")))
}

fn job_from_row(row: &SqliteRow) -> Result<AuditJob> {
    let audit_id: String = row.try_get("audit_id")?;
    let id = Uuid::parse_str(&audit_id)
        .map_err(|e| Error::Internal(format!("Invalid audit_id {audit_id}: {e}")))?;

    let kind: String = row.try_get("kind")?;
    let kind = AuditKind::parse(&kind)
        .ok_or_else(|| Error::Internal(format!("Unknown audit kind: {kind}")))?;

    let mode: String = row.try_get("mode")?;
    let mode = AuditMode::parse(&mode)
        .ok_or_else(|| Error::Internal(format!("Unknown audit mode: {mode}")))?;

    let status: String = row.try_get("status")?;
    let status = AuditStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown audit status: {status}")))?;

    let target: String = row.try_get("target")?;
    let result: Option<String> = row.try_get("result")?;
    let usage: Option<String> = row.try_get("usage")?;
    let analysis_method: Option<String> = row.try_get("analysis_method")?;
    let created_at: String = row.try_get("created_at")?;
    let completed_at: Option<String> = row.try_get("completed_at")?;

    Ok(AuditJob {
        id,
        kind,
        mode,
        target: from_json(&target, "target")?,
        status,
        progress: AuditProgress {
            message: row.try_get("progress_message")?,
            step: row.try_get::<i64, _>("progress_step")? as u32,
            total: row.try_get::<i64, _>("progress_total")? as u32,
        },
        blocked_reason: row.try_get("blocked_reason")?,
        blocked_screenshot: row.try_get("blocked_screenshot")?,
        error_message: row.try_get("error_message")?,
        result: result.as_deref().map(|r| from_json(r, "result")).transpose()?,
        usage: usage.as_deref().map(|u| from_json(u, "usage")).transpose()?,
        analysis_method: analysis_method.as_deref().and_then(AnalysisMethod::parse),
        created_at: parse_time(&created_at, "created_at")?,
        completed_at: completed_at
            .as_deref()
            .map(|t| parse_time(t, "completed_at"))
            .transpose()?,
    })
}
