//! Command-line interface for meter-sync
//!
//! # Usage Examples
//!
//! ```bash
//! # Import a legacy dump into the destination database
//! meter-sync import --file legacy.sql \
//!   --database-url "sqlite://ems.db?mode=rwc" \
//!   --default-org-code UNASSIGNED
//!
//! # Pre-screen a dump: table names, row counts, sample rows
//! meter-sync inspect --file legacy.sql --sample 3
//!
//! # List import jobs with status, progress and duration
//! meter-sync jobs
//! ```
//!
//! A running import can be cancelled with Ctrl-C: the in-flight
//! transaction is rolled back and the job is marked cancelled rather than
//! failed.

use anyhow::Context;
use clap::{Parser, Subcommand};
use import_job::{JobKind, JobStore};
use meter_sync::jobs::{JobProgress, SqliteJobStore};
use meter_sync::{schema, ImportConfig, ImportOutcome, SourceOpts, TargetOpts};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "meter-sync")]
#[command(about = "A tool for migrating legacy meter-telemetry SQL dumps into the new EMS schema")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a legacy SQL dump into the destination database
    Import {
        /// Path to the dump file
        #[arg(long, value_name = "FILE")]
        file: PathBuf,

        /// Legacy dump options
        #[command(flatten)]
        from_opts: SourceOpts,

        /// Destination database options
        #[command(flatten)]
        to_opts: TargetOpts,
    },

    /// Parse a dump and report its tables without touching the database
    Inspect {
        /// Path to the dump file
        #[arg(long, value_name = "FILE")]
        file: PathBuf,

        /// Number of sample rows to print per table
        #[arg(long, default_value = "5")]
        sample: usize,
    },

    /// List import jobs
    Jobs {
        /// Sidecar database file holding import job records
        #[arg(long, default_value = ".meter-sync-jobs.db", env = "METER_SYNC_JOBS_DB")]
        jobs_db: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            file,
            from_opts,
            to_opts,
        } => run_import_command(file, from_opts, to_opts).await?,
        Commands::Inspect { file, sample } => run_inspect(file, sample)?,
        Commands::Jobs { jobs_db } => run_jobs(jobs_db).await?,
    }

    Ok(())
}

async fn run_import_command(
    file: PathBuf,
    from_opts: SourceOpts,
    to_opts: TargetOpts,
) -> anyhow::Result<()> {
    let pool = schema::connect(&to_opts.database_url).await?;
    schema::init_schema(&pool).await?;

    let job_store = SqliteJobStore::open(&to_opts.jobs_db).await?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.display().to_string());
    let options = serde_json::json!({
        "batch_size": to_opts.batch_size,
        "dry_run": to_opts.dry_run,
        "default_org_code": from_opts.default_org_code,
    });
    let job_id = job_store.create(JobKind::SqlDump, &filename, options).await?;
    tracing::info!("Created import job {job_id} for {filename}");

    // Ctrl-C requests cancellation; the orchestrator observes it at phase
    // and batch boundaries and rolls back.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Cancellation requested, stopping at the next boundary");
            signal_cancel.cancel();
        }
    });

    let config = ImportConfig {
        dump_path: file,
        tables: (&from_opts).into(),
        default_org_code: from_opts.default_org_code.clone(),
        batch_size: to_opts.batch_size,
        dry_run: to_opts.dry_run,
        keep_dump: from_opts.keep_dump,
    };
    let progress = JobProgress::new(job_store.clone(), job_id);

    match meter_sync::run_import(&pool, &job_store, job_id, &progress, &config, &cancel).await? {
        ImportOutcome::Completed(counts) => {
            println!(
                "Imported: organizations={} users={} gateways={} meters={} readings={} (skipped {})",
                counts.organizations,
                counts.users,
                counts.gateways,
                counts.meters,
                counts.readings,
                counts.skipped
            );
        }
        ImportOutcome::Cancelled => {
            println!("Import cancelled; no data was written");
        }
    }

    Ok(())
}

fn run_inspect(file: PathBuf, sample: usize) -> anyhow::Result<()> {
    let store = meter_sync::sqldump::parse(&file)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    if store.skipped_statements() > 0 {
        println!(
            "Warning: {} malformed INSERT statements were skipped",
            store.skipped_statements()
        );
    }

    for table in store.table_names() {
        println!("{} ({} rows)", table, store.row_count(table));
        for row in store.sample_of(table, sample) {
            let mut fields: Vec<String> = row
                .iter()
                .map(|(column, value)| format!("{column}={value}"))
                .collect();
            fields.sort();
            println!("  {}", fields.join(", "));
        }
    }

    Ok(())
}

async fn run_jobs(jobs_db: String) -> anyhow::Result<()> {
    let store = SqliteJobStore::open(&jobs_db).await?;
    let jobs = store.list().await?;

    if jobs.is_empty() {
        println!("No import jobs recorded");
        return Ok(());
    }

    for job in jobs {
        let outcome = match (&job.result, &job.error) {
            (Some(counts), _) => format!(
                "organizations={} users={} gateways={} meters={} readings={}",
                counts.organizations,
                counts.users,
                counts.gateways,
                counts.meters,
                counts.readings
            ),
            (None, Some(error)) => error.clone(),
            (None, None) => String::new(),
        };
        println!(
            "#{} {} {} {}% {} {} {}",
            job.id,
            job.kind.as_str(),
            job.status,
            job.percent_complete(),
            job.duration_human(),
            job.filename,
            outcome
        );
    }

    Ok(())
}
