//! The five-phase import body.
//!
//! Phases run in strict dependency order - organizations, users,
//! gateways, meters, readings - inside one transaction. Any failure rolls
//! the whole body back: a partial import would leave meters referencing
//! gateways that no longer exist, and all-or-nothing is easier to reason
//! about than partial-commit recovery.

use crate::import::ImportConfig;
use crate::{entities, mapping};
use anyhow::{Context, Result};
use import_job::{ImportCounts, JobStore, ProgressReporter};
use meter_sync_sqldump_source::DumpStore;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Terminal result of an import run.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    Completed(ImportCounts),
    Cancelled,
}

enum PhaseEnd {
    Done,
    Cancelled,
}

/// Run one import job end to end: parse the dump, validate it, apply the
/// five phases transactionally, persist the job's terminal state, and
/// dispose of the dump file.
///
/// Job transitions and progress go through `job_store`/`progress` on
/// their own connection so they survive a rollback of the data
/// transaction.
pub async fn run_import(
    pool: &SqlitePool,
    job_store: &dyn JobStore,
    job_id: i64,
    progress: &dyn ProgressReporter,
    config: &ImportConfig,
    cancel: &CancellationToken,
) -> Result<ImportOutcome> {
    info!("Starting dump import from {}", config.dump_path.display());

    if config.dry_run {
        info!("Running in dry-run mode - no data will be committed");
    }

    let store = match meter_sync_sqldump_source::parse(&config.dump_path) {
        Ok(store) => store,
        Err(e) => {
            job_store.fail(job_id, &format!("{e:#}")).await?;
            return Err(e);
        }
    };

    if let Err(e) = validate_required_tables(&store, config) {
        job_store.fail(job_id, &format!("{e:#}")).await?;
        dispose_dump(config);
        return Err(e);
    }

    let tables = &config.tables;
    let total: i64 = [
        &tables.sites,
        &tables.users,
        &tables.gateways,
        &tables.meters,
        &tables.readings,
    ]
    .iter()
    .map(|t| store.row_count(t) as i64)
    .sum();

    job_store.mark_processing(job_id, total).await?;
    info!(
        "Parsed dump: {} tables, {} source rows ({} malformed statements skipped)",
        store.table_names().len(),
        total,
        store.skipped_statements()
    );

    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin destination transaction")?;
    let mut phases = Phases {
        store: &store,
        config,
        progress,
        cancel,
        counts: ImportCounts::default(),
        processed: 0,
        meter_ids: HashMap::new(),
        meter_names: HashMap::new(),
    };

    match phases.apply(&mut tx).await {
        Ok(PhaseEnd::Done) => {
            let counts = phases.counts;
            if config.dry_run {
                tx.rollback().await?;
                info!("Dry-run complete, transaction rolled back: {counts:?}");
            } else {
                tx.commit().await.context("Failed to commit import")?;
                dispose_dump(config);
            }
            job_store.complete(job_id, &counts).await?;
            info!(
                "Import completed: {} organizations, {} users, {} gateways, {} meters, {} readings ({} rows skipped)",
                counts.organizations,
                counts.users,
                counts.gateways,
                counts.meters,
                counts.readings,
                counts.skipped
            );
            Ok(ImportOutcome::Completed(counts))
        }
        Ok(PhaseEnd::Cancelled) => {
            tx.rollback().await?;
            job_store.cancel(job_id).await?;
            // The dump is kept on cancellation so the operator can re-run.
            warn!("Import cancelled, transaction rolled back");
            Ok(ImportOutcome::Cancelled)
        }
        Err(e) => {
            tx.rollback().await?;
            job_store.fail(job_id, &format!("{e:#}")).await?;
            dispose_dump(config);
            Err(e.context("Import failed, transaction rolled back"))
        }
    }
}

/// A dump without sites, users and meter definitions is not a valid
/// legacy export; refuse it before opening the transaction. The
/// telemetry table is optional - a dump may carry only master data.
fn validate_required_tables(store: &DumpStore, config: &ImportConfig) -> Result<()> {
    let tables = &config.tables;
    for required in [&tables.sites, &tables.users, &tables.meters] {
        if !store.has_rows(required) {
            anyhow::bail!(
                "Dump is not a valid legacy export: expected table '{required}' but found 0 rows"
            );
        }
    }
    Ok(())
}

/// The dump has been fully consumed and may contain sensitive legacy
/// data; it is deleted on success and on failure.
fn dispose_dump(config: &ImportConfig) {
    if config.keep_dump || config.dry_run {
        return;
    }
    if let Err(e) = std::fs::remove_file(&config.dump_path) {
        warn!(
            "Failed to delete dump file {}: {e}",
            config.dump_path.display()
        );
    }
}

/// State threaded through the five phases of one run.
struct Phases<'a> {
    store: &'a DumpStore,
    config: &'a ImportConfig,
    progress: &'a dyn ProgressReporter,
    cancel: &'a CancellationToken,
    counts: ImportCounts,
    processed: i64,
    /// Legacy meter id → destination meter id, built by phase 4.
    meter_ids: HashMap<i64, i64>,
    /// Legacy meter name → destination meter id, the fallback key.
    meter_names: HashMap<String, i64>,
}

impl Phases<'_> {
    async fn apply(&mut self, tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>) -> Result<PhaseEnd> {
        let conn: &mut SqliteConnection = tx;

        // Explicit bootstrap for the fallback organization, instead of
        // materializing it on demand inside the phase loops.
        let default_org_id = entities::find_or_create_organization(
            conn,
            &self.config.default_org_code,
            "Unassigned",
        )
        .await?;

        self.import_organizations(conn).await?;
        if self.cancel.is_cancelled() {
            return Ok(PhaseEnd::Cancelled);
        }

        self.import_users(conn).await?;
        if self.cancel.is_cancelled() {
            return Ok(PhaseEnd::Cancelled);
        }

        self.import_gateways(conn, default_org_id).await?;
        if self.cancel.is_cancelled() {
            return Ok(PhaseEnd::Cancelled);
        }

        self.import_meters(conn, default_org_id).await?;
        if self.cancel.is_cancelled() {
            return Ok(PhaseEnd::Cancelled);
        }

        self.import_readings(conn).await
    }

    async fn import_organizations(&mut self, conn: &mut SqliteConnection) -> Result<()> {
        for row in self.store.rows_of(&self.config.tables.sites) {
            self.processed += 1;
            match mapping::organization_from_row(&row) {
                Some(draft) => {
                    entities::find_or_create_organization(conn, &draft.code, &draft.name).await?;
                    self.counts.organizations += 1;
                }
                None => {
                    debug!("Site row without code or name, skipped");
                    self.counts.skipped += 1;
                }
            }
        }
        info!("Imported {} organizations", self.counts.organizations);
        self.progress.report(self.processed).await
    }

    async fn import_users(&mut self, conn: &mut SqliteConnection) -> Result<()> {
        for row in self.store.rows_of(&self.config.tables.users) {
            self.processed += 1;
            match mapping::user_from_row(&row) {
                Some(draft) => {
                    entities::find_or_create_user(
                        conn,
                        &draft.email,
                        &draft.name,
                        draft.is_admin,
                        mapping::PLACEHOLDER_PASSWORD,
                    )
                    .await?;
                    self.counts.users += 1;
                }
                None => {
                    debug!("User row without a username, skipped");
                    self.counts.skipped += 1;
                }
            }
        }
        info!("Imported {} users", self.counts.users);
        self.progress.report(self.processed).await
    }

    async fn import_gateways(
        &mut self,
        conn: &mut SqliteConnection,
        default_org_id: i64,
    ) -> Result<()> {
        for row in self.store.rows_of(&self.config.tables.gateways) {
            self.processed += 1;
            match mapping::gateway_from_row(&row) {
                Some(draft) => {
                    let org_id = match &draft.site_code {
                        Some(code) => entities::organization_id_by_code(conn, code)
                            .await?
                            .unwrap_or(default_org_id),
                        None => default_org_id,
                    };
                    entities::upsert_gateway(conn, &draft, org_id).await?;
                    self.counts.gateways += 1;
                }
                None => {
                    debug!("Gateway row missing serial, mac or ip, skipped");
                    self.counts.skipped += 1;
                }
            }
        }
        info!("Imported {} gateways", self.counts.gateways);
        self.progress.report(self.processed).await
    }

    async fn import_meters(
        &mut self,
        conn: &mut SqliteConnection,
        default_org_id: i64,
    ) -> Result<()> {
        for row in self.store.rows_of(&self.config.tables.meters) {
            self.processed += 1;
            let Some(draft) = mapping::meter_from_row(&row) else {
                debug!("Meter row without a name, skipped");
                self.counts.skipped += 1;
                continue;
            };

            let gateway_id = match &draft.gateway_serial {
                Some(serial) => entities::find_gateway_by_serial(conn, serial).await?,
                None => None,
            };
            // A meter cannot exist without its gateway.
            let Some(gateway_id) = gateway_id else {
                debug!(
                    "Meter '{}' references unknown gateway {:?}, skipped",
                    draft.name, draft.gateway_serial
                );
                self.counts.skipped += 1;
                continue;
            };

            let org_id = match &draft.site_code {
                Some(code) => entities::find_or_create_organization(conn, code, code).await?,
                None => default_org_id,
            };
            let config_id = match &draft.config_file {
                Some(filename) => Some(entities::find_or_create_config(conn, filename).await?),
                None => None,
            };

            let meter_id =
                entities::upsert_meter(conn, &draft, org_id, gateway_id, config_id).await?;
            self.counts.meters += 1;
            if let Some(legacy_id) = draft.legacy_id {
                self.meter_ids.insert(legacy_id, meter_id);
            }
            self.meter_names.insert(draft.name.clone(), meter_id);
        }
        info!("Imported {} meters", self.counts.meters);
        self.progress.report(self.processed).await
    }

    /// The readings phase dominates run time, so cancellation is observed
    /// and progress reported at batch boundaries rather than per row.
    async fn import_readings(
        &mut self,
        conn: &mut SqliteConnection,
    ) -> Result<PhaseEnd> {
        let batch_size = self.config.batch_size.max(1);
        for (i, row) in self
            .store
            .rows_of(&self.config.tables.readings)
            .iter()
            .enumerate()
        {
            self.processed += 1;
            match mapping::reading_from_row(row) {
                Some(draft) => {
                    let meter_id = draft
                        .legacy_meter_id
                        .and_then(|id| self.meter_ids.get(&id))
                        .or_else(|| {
                            draft
                                .meter_name
                                .as_deref()
                                .and_then(|name| self.meter_names.get(name))
                        })
                        .copied();
                    match meter_id {
                        Some(meter_id) => {
                            entities::insert_reading(
                                conn,
                                meter_id,
                                draft.recorded_at,
                                &draft.values,
                            )
                            .await?;
                            self.counts.readings += 1;
                        }
                        None => {
                            debug!("Reading references an unresolvable meter, skipped");
                            self.counts.skipped += 1;
                        }
                    }
                }
                None => {
                    debug!("Reading with sentinel timestamp, skipped");
                    self.counts.skipped += 1;
                }
            }

            if (i + 1) % batch_size == 0 {
                if self.cancel.is_cancelled() {
                    return Ok(PhaseEnd::Cancelled);
                }
                self.progress.report(self.processed).await?;
            }
        }
        info!("Imported {} readings", self.counts.readings);
        self.progress.report(self.processed).await?;
        Ok(PhaseEnd::Done)
    }
}
