//! MeterSync Library
//!
//! A library for migrating a legacy meter-telemetry database - exported as
//! a hand-edited SQL dump text file - into the normalized schema used by
//! the new EMS application.
//!
//! # Features
//!
//! - Dump recovery: typed rows are reconstructed from `INSERT INTO`
//!   statements without trusting the dump to be well-formed
//! - Five-phase import: organizations, users, gateways, meters and
//!   telemetry readings applied in dependency order
//! - Atomicity: all five phases run inside one transaction; any failure
//!   rolls the whole import back
//! - Idempotent reruns: master-data entities are matched by natural key
//!   (organization code, user email, gateway serial, meter identity)
//! - Resumable progress: a persisted job record tracks counts, status and
//!   duration while the import runs
//!
//! # CLI Usage
//!
//! ```bash
//! # Import a dump into the destination database
//! meter-sync import --file legacy.sql \
//!   --database-url "sqlite://ems.db?mode=rwc"
//!
//! # Pre-screen a dump without touching the database
//! meter-sync inspect --file legacy.sql --sample 3
//!
//! # List past and running import jobs
//! meter-sync jobs
//! ```

use clap::Parser;

pub mod entities;
pub mod import;
pub mod jobs;
pub mod mapping;
pub mod schema;
pub mod testing;

pub use import::{run_import, ImportConfig, ImportOutcome, LegacyTables};

// Re-export the dump parsing crate for convenience
pub use meter_sync_sqldump_source as sqldump;

/// Destination database options.
#[derive(Parser, Clone)]
pub struct TargetOpts {
    /// Destination database URL
    #[arg(
        long,
        default_value = "sqlite://meter-sync.db?mode=rwc",
        env = "METER_SYNC_DATABASE_URL"
    )]
    pub database_url: String,

    /// Sidecar database file holding import job records
    #[arg(long, default_value = ".meter-sync-jobs.db", env = "METER_SYNC_JOBS_DB")]
    pub jobs_db: String,

    /// Progress/cancellation cadence for the readings phase, in rows
    #[arg(long, default_value = "100")]
    pub batch_size: usize,

    /// Dry run mode - run every phase, then roll back instead of committing
    #[arg(long)]
    pub dry_run: bool,
}

/// Legacy dump options: where each entity's rows live in the dump.
#[derive(Parser, Clone)]
pub struct SourceOpts {
    /// Legacy table holding organizations/sites
    #[arg(long, default_value = "sites")]
    pub sites_table: String,

    /// Legacy table holding users
    #[arg(long, default_value = "users")]
    pub users_table: String,

    /// Legacy table holding gateways (RTUs)
    #[arg(long, default_value = "rtus")]
    pub gateways_table: String,

    /// Legacy table holding meter definitions
    #[arg(long, default_value = "meters")]
    pub meters_table: String,

    /// Legacy table holding telemetry readings
    #[arg(long, default_value = "readings")]
    pub readings_table: String,

    /// Organization code assigned to gateways without a resolvable site
    #[arg(long, default_value = "UNASSIGNED")]
    pub default_org_code: String,

    /// Keep the dump file after the import instead of deleting it
    #[arg(long)]
    pub keep_dump: bool,
}

impl From<&SourceOpts> for LegacyTables {
    fn from(opts: &SourceOpts) -> Self {
        LegacyTables {
            sites: opts.sites_table.clone(),
            users: opts.users_table.clone(),
            gateways: opts.gateways_table.clone(),
            meters: opts.meters_table.clone(),
            readings: opts.readings_table.clone(),
        }
    }
}
