//! Destination schema bootstrap.
//!
//! Entity tables are created idempotently on startup. The readings
//! table's measurement columns are generated from the mapping rule table
//! so the schema and the field mapping share one source of truth.

use crate::mapping::{Coerce, READING_FIELDS};
use anyhow::{Context, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// Connect to the destination database.
///
/// A single connection is enough: phases are strictly ordered and the
/// whole import body is one transaction.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(database_url)
        .await
        .with_context(|| format!("Failed to connect to destination database {database_url}"))?;
    Ok(pool)
}

const ENTITY_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS organizations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        is_admin INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS gateways (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        serial TEXT NOT NULL UNIQUE,
        mac_address TEXT NOT NULL,
        ip_address TEXT NOT NULL,
        firmware TEXT,
        organization_id INTEGER NOT NULL REFERENCES organizations(id)
    )",
    "CREATE TABLE IF NOT EXISTS meter_configs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        filename TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS meters (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        model TEXT,
        multiplier REAL NOT NULL DEFAULT 1.0,
        organization_id INTEGER NOT NULL REFERENCES organizations(id),
        gateway_id INTEGER NOT NULL REFERENCES gateways(id),
        config_id INTEGER REFERENCES meter_configs(id),
        UNIQUE(name, organization_id, gateway_id)
    )",
];

/// Build the readings DDL from the measurement rule table.
fn readings_ddl() -> String {
    let mut columns = String::new();
    for rule in READING_FIELDS {
        let sql_type = match rule.coerce {
            Coerce::Required => "REAL NOT NULL",
            Coerce::Optional => "REAL",
            Coerce::Timestamp | Coerce::Text => "TEXT",
        };
        columns.push_str(&format!(",\n        {} {}", rule.column, sql_type));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS readings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        meter_id INTEGER NOT NULL REFERENCES meters(id),
        recorded_at TEXT NOT NULL{columns}
    )"
    )
}

/// Create all destination tables if they do not exist yet.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for ddl in ENTITY_TABLES {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .context("Failed to create destination table")?;
    }
    sqlx::query(&readings_ddl())
        .execute(pool)
        .await
        .context("Failed to create readings table")?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_readings_meter_time
         ON readings(meter_id, recorded_at)",
    )
    .execute(pool)
    .await
    .context("Failed to create readings index")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readings_ddl_covers_every_rule() {
        let ddl = readings_ddl();
        for rule in READING_FIELDS {
            assert!(ddl.contains(rule.column), "missing column {}", rule.column);
        }
        assert!(ddl.contains("recorded_at TEXT NOT NULL"));
    }

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let pool = connect("sqlite::memory:").await.unwrap();
        init_schema(&pool).await.unwrap();
        init_schema(&pool).await.unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
                .fetch_one(&pool)
                .await
                .unwrap();
        // organizations, users, gateways, meter_configs, meters, readings
        // (sqlite_sequence appears once AUTOINCREMENT tables exist).
        assert!(count >= 6);
    }
}
