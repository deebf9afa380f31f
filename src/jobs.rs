//! SQLite-backed [`JobStore`].

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use code_rag_core::jobs::JobStore;
use code_rag_core::models::{JobRecord, JobStatus};

use crate::sqlite_store::parse_timestamp;

pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn put(&self, job: &JobRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, repository, branch, source, status, message, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                message = excluded.message,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&job.id)
        .bind(&job.repository)
        .bind(&job.branch)
        .bind(&job.source)
        .bind(job.status.as_str())
        .bind(&job.message)
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, repository, branch, source, status, message, created_at, updated_at
            FROM jobs WHERE id = ?
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let status: String = row.get("status");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        Ok(Some(JobRecord {
            id: row.get("id"),
            repository: row.get("repository"),
            branch: row.get("branch"),
            source: row.get("source"),
            status: status.parse::<JobStatus>()?,
            message: row.get("message"),
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }
}
