//! Import orchestration for legacy dump files.

mod full_import;

pub use full_import::{run_import, ImportOutcome};

use std::path::PathBuf;

/// Names of the legacy tables each entity phase reads from.
#[derive(Debug, Clone)]
pub struct LegacyTables {
    pub sites: String,
    pub users: String,
    pub gateways: String,
    pub meters: String,
    pub readings: String,
}

impl Default for LegacyTables {
    fn default() -> Self {
        LegacyTables {
            sites: "sites".to_string(),
            users: "users".to_string(),
            gateways: "rtus".to_string(),
            meters: "meters".to_string(),
            readings: "readings".to_string(),
        }
    }
}

/// Configuration for one import run.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub dump_path: PathBuf,
    pub tables: LegacyTables,
    /// Organization code for gateways without a resolvable site.
    pub default_org_code: String,
    /// Progress/cancellation cadence for the readings phase, in rows.
    pub batch_size: usize,
    /// Run every phase, then roll back instead of committing.
    pub dry_run: bool,
    /// Keep the dump file after the import instead of deleting it.
    pub keep_dump: bool,
}

impl ImportConfig {
    pub fn new(dump_path: impl Into<PathBuf>) -> Self {
        ImportConfig {
            dump_path: dump_path.into(),
            tables: LegacyTables::default(),
            default_org_code: "UNASSIGNED".to_string(),
            batch_size: 100,
            dry_run: false,
            keep_dump: false,
        }
    }
}
