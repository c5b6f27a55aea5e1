//! SQLite-backed job store.
//!
//! Job records live in a small sidecar database, not the destination
//! database: progress updates and terminal transitions must stay visible
//! while the import's data transaction is open, and must survive its
//! rollback.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use import_job::{ImportCounts, ImportJob, JobKind, JobStatus, JobStore, ProgressReporter};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

#[derive(Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    /// Open (creating if needed) the job store at the given file path.
    pub async fn open(path: &str) -> Result<Self> {
        Self::from_url(&format!("sqlite://{path}?mode=rwc")).await
    }

    pub async fn from_url(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .with_context(|| format!("Failed to open job store {url}"))?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS import_jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                filename TEXT NOT NULL,
                status TEXT NOT NULL,
                total_records INTEGER NOT NULL DEFAULT 0,
                processed_records INTEGER NOT NULL DEFAULT 0,
                options TEXT NOT NULL DEFAULT '{}',
                result TEXT,
                error TEXT,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT
            )",
        )
        .execute(&pool)
        .await
        .context("Failed to create import_jobs table")?;
        Ok(SqliteJobStore { pool })
    }

    fn job_from_row(row: &SqliteRow) -> Result<ImportJob> {
        let kind: String = row.get("kind");
        let status: String = row.get("status");
        let options: String = row.get("options");
        let result: Option<String> = row.get("result");
        Ok(ImportJob {
            id: row.get("id"),
            kind: JobKind::from_str(&kind)?,
            filename: row.get("filename"),
            status: JobStatus::from_str(&status)?,
            total_records: row.get("total_records"),
            processed_records: row.get("processed_records"),
            options: serde_json::from_str(&options).unwrap_or(serde_json::Value::Null),
            result: result.as_deref().map(serde_json::from_str).transpose()?,
            error: row.get("error"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        })
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn create(
        &self,
        kind: JobKind,
        filename: &str,
        options: serde_json::Value,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO import_jobs (kind, filename, status, options, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(kind.as_str())
        .bind(filename)
        .bind(JobStatus::Pending.as_str())
        .bind(options.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to create import job")?;
        Ok(result.last_insert_rowid())
    }

    async fn load(&self, id: i64) -> Result<Option<ImportJob>> {
        let row = sqlx::query("SELECT * FROM import_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::job_from_row).transpose()
    }

    async fn mark_processing(&self, id: i64, total_records: i64) -> Result<()> {
        sqlx::query(
            "UPDATE import_jobs SET status = ?, total_records = ?, started_at = ? WHERE id = ?",
        )
        .bind(JobStatus::Processing.as_str())
        .bind(total_records)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_progress(&self, id: i64, processed_records: i64) -> Result<()> {
        sqlx::query("UPDATE import_jobs SET processed_records = ? WHERE id = ?")
            .bind(processed_records)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn complete(&self, id: i64, counts: &ImportCounts) -> Result<()> {
        sqlx::query(
            "UPDATE import_jobs SET status = ?, result = ?, completed_at = ? WHERE id = ?",
        )
        .bind(JobStatus::Completed.as_str())
        .bind(serde_json::to_string(counts)?)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail(&self, id: i64, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE import_jobs SET status = ?, error = ?, completed_at = ? WHERE id = ?",
        )
        .bind(JobStatus::Failed.as_str())
        .bind(error)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn cancel(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE import_jobs SET status = ?, completed_at = ? WHERE id = ?")
            .bind(JobStatus::Cancelled.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ImportJob>> {
        let rows = sqlx::query("SELECT * FROM import_jobs ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::job_from_row).collect()
    }
}

/// Store-backed progress reporter handed down to the orchestrator.
pub struct JobProgress {
    store: SqliteJobStore,
    job_id: i64,
}

impl JobProgress {
    pub fn new(store: SqliteJobStore, job_id: i64) -> Self {
        JobProgress { store, job_id }
    }
}

#[async_trait]
impl ProgressReporter for JobProgress {
    async fn report(&self, processed: i64) -> Result<()> {
        self.store.update_progress(self.job_id, processed).await
    }
}
