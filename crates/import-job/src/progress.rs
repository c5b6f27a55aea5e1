//! Progress reporting.
//!
//! The orchestrator owns an explicit reporter it invokes at defined
//! checkpoints - per phase for the small entity phases, every N rows for
//! the high-volume readings phase. The cadence is a parameter of the
//! caller, not hidden shared state.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ProgressReporter: Send + Sync {
    /// Record that `processed` records have been handled so far.
    async fn report(&self, processed: i64) -> Result<()>;
}

/// Reporter that discards progress, for tests.
pub struct NullProgress;

#[async_trait]
impl ProgressReporter for NullProgress {
    async fn report(&self, _processed: i64) -> Result<()> {
        Ok(())
    }
}
