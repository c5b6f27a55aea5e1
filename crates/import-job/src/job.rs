//! The job record and its derived values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of source produced this job.
///
/// `CsvImport` rows are written by the separate fixed-column feed
/// importer; this pipeline only ever creates `SqlDump` jobs but must be
/// able to list both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    SqlDump,
    CsvImport,
}

impl JobKind {
    pub fn as_str(&self) -> &str {
        match self {
            JobKind::SqlDump => "sql_dump",
            JobKind::CsvImport => "csv_import",
        }
    }

    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "sql_dump" => Ok(JobKind::SqlDump),
            "csv_import" => Ok(JobKind::CsvImport),
            other => anyhow::bail!("Unknown job kind: {other}"),
        }
    }
}

/// Job lifecycle states.
///
/// `Cancelled` is injected externally; the pipeline observes it at phase
/// and batch boundaries and stops promptly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => anyhow::bail!("Unknown job status: {other}"),
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-entity counts persisted as a completed job's `result`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCounts {
    pub organizations: i64,
    pub users: i64,
    pub gateways: i64,
    pub meters: i64,
    pub readings: i64,
    /// Rows dropped for lacking a usable natural key or a resolvable
    /// parent entity. Skips are not failures.
    pub skipped: i64,
}

/// Persisted import job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: i64,
    pub kind: JobKind,
    pub filename: String,
    pub status: JobStatus,
    pub total_records: i64,
    pub processed_records: i64,
    /// Caller-supplied options snapshot, kept for operator diagnosis.
    pub options: serde_json::Value,
    pub result: Option<ImportCounts>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ImportJob {
    /// Percentage complete, rounded. Zero totals report 0 rather than
    /// dividing by zero.
    pub fn percent_complete(&self) -> u8 {
        if self.total_records <= 0 {
            return 0;
        }
        let pct = (self.processed_records as f64 / self.total_records as f64) * 100.0;
        pct.round().clamp(0.0, 100.0) as u8
    }

    /// Elapsed time from `started_at` to `completed_at`, or to now while
    /// still running. `None` before the job has started.
    pub fn duration(&self) -> Option<chrono::Duration> {
        let started = self.started_at?;
        let end = self.completed_at.unwrap_or_else(Utc::now);
        Some(end - started)
    }

    /// Human-readable duration: `"45s"`, `"3m 12s"`, `"2h 5m"`.
    pub fn duration_human(&self) -> String {
        let Some(duration) = self.duration() else {
            return "-".to_string();
        };
        let secs = duration.num_seconds().max(0);
        if secs < 60 {
            format!("{secs}s")
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ImportJob {
        ImportJob {
            id: 1,
            kind: JobKind::SqlDump,
            filename: "legacy.sql".to_string(),
            status: JobStatus::Pending,
            total_records: 0,
            processed_records: 0,
            options: serde_json::json!({}),
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_percent_complete_rounds() {
        let mut j = job();
        j.total_records = 3;
        j.processed_records = 1;
        assert_eq!(j.percent_complete(), 33);
        j.processed_records = 2;
        assert_eq!(j.percent_complete(), 67);
        j.processed_records = 3;
        assert_eq!(j.percent_complete(), 100);
    }

    #[test]
    fn test_percent_complete_zero_total() {
        assert_eq!(job().percent_complete(), 0);
    }

    #[test]
    fn test_duration_human_boundaries() {
        let mut j = job();
        let start = Utc::now();
        j.started_at = Some(start);

        j.completed_at = Some(start + chrono::Duration::seconds(59));
        assert_eq!(j.duration_human(), "59s");

        j.completed_at = Some(start + chrono::Duration::seconds(60));
        assert_eq!(j.duration_human(), "1m 0s");

        j.completed_at = Some(start + chrono::Duration::seconds(3599));
        assert_eq!(j.duration_human(), "59m 59s");

        j.completed_at = Some(start + chrono::Duration::seconds(3600));
        assert_eq!(j.duration_human(), "1h 0m");

        j.completed_at = Some(start + chrono::Duration::seconds(7500));
        assert_eq!(j.duration_human(), "2h 5m");
    }

    #[test]
    fn test_duration_before_start() {
        assert_eq!(job().duration_human(), "-");
        assert!(job().duration().is_none());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(JobStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(JobStatus::from_str("bogus").is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_counts_serde_round_trip() {
        let counts = ImportCounts {
            organizations: 1,
            users: 2,
            gateways: 3,
            meters: 4,
            readings: 5,
            skipped: 6,
        };
        let json = serde_json::to_string(&counts).unwrap();
        let back: ImportCounts = serde_json::from_str(&json).unwrap();
        assert_eq!(back, counts);
    }
}
