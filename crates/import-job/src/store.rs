//! Job storage trait.

use crate::{ImportCounts, ImportJob, JobKind};
use anyhow::Result;
use async_trait::async_trait;

/// Storage backend for job records.
///
/// The orchestrator writes job transitions and progress through this
/// trait on a connection of its own, outside the data transaction, so
/// progress stays visible mid-run and terminal states survive a rollback.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a `Pending` job and return its id.
    async fn create(
        &self,
        kind: JobKind,
        filename: &str,
        options: serde_json::Value,
    ) -> Result<i64>;

    async fn load(&self, id: i64) -> Result<Option<ImportJob>>;

    /// `Pending -> Processing`: record the start time and the total
    /// record count discovered by the parse.
    async fn mark_processing(&self, id: i64, total_records: i64) -> Result<()>;

    async fn update_progress(&self, id: i64, processed_records: i64) -> Result<()>;

    /// Terminal `Completed` with per-entity counts.
    async fn complete(&self, id: i64, counts: &ImportCounts) -> Result<()>;

    /// Terminal `Failed` with the original error message preserved.
    async fn fail(&self, id: i64, error: &str) -> Result<()>;

    /// Terminal `Cancelled`.
    async fn cancel(&self, id: i64) -> Result<()>;

    /// All jobs, newest first.
    async fn list(&self) -> Result<Vec<ImportJob>>;
}

/// No-op store for tests and dry runs.
pub struct NullJobStore;

#[async_trait]
impl JobStore for NullJobStore {
    async fn create(
        &self,
        _kind: JobKind,
        _filename: &str,
        _options: serde_json::Value,
    ) -> Result<i64> {
        Ok(0)
    }

    async fn load(&self, _id: i64) -> Result<Option<ImportJob>> {
        Ok(None)
    }

    async fn mark_processing(&self, _id: i64, _total_records: i64) -> Result<()> {
        Ok(())
    }

    async fn update_progress(&self, _id: i64, _processed_records: i64) -> Result<()> {
        Ok(())
    }

    async fn complete(&self, _id: i64, _counts: &ImportCounts) -> Result<()> {
        Ok(())
    }

    async fn fail(&self, _id: i64, _error: &str) -> Result<()> {
        Ok(())
    }

    async fn cancel(&self, _id: i64) -> Result<()> {
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ImportJob>> {
        Ok(Vec::new())
    }
}
