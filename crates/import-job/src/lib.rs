//! Import job records for meter-sync
//!
//! An [`ImportJob`] is the persisted state machine a long-running import
//! updates as it works: created `Pending`, moved to `Processing` when the
//! orchestrator starts, and terminated in exactly one of `Completed`,
//! `Failed` or `Cancelled`. External callers read progress and derived
//! values (percentage, human-readable duration) from the job record; they
//! never mutate it.
//!
//! Storage is abstracted behind the [`JobStore`] trait so the same job
//! logic works against the CLI's sidecar SQLite store and against the
//! no-op [`NullJobStore`] used in tests and dry runs.

mod job;
mod progress;
mod store;

pub use job::{ImportCounts, ImportJob, JobKind, JobStatus};
pub use progress::{NullProgress, ProgressReporter};
pub use store::{JobStore, NullJobStore};
