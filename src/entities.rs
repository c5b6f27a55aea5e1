//! Destination entity writes, keyed by natural key.
//!
//! Every function takes the transaction's connection, so all writes of an
//! import are part of one atomic body. Master data is matched by natural
//! key - organization code, user email, gateway serial, meter
//! (name, organization, gateway) - while readings are append-only.

use crate::mapping::{FieldValue, GatewayDraft, MeterDraft, READING_FIELDS};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use std::sync::OnceLock;

/// Find an organization by code, creating it when absent. Existing rows
/// are never updated so reruns cannot clobber manual edits.
pub async fn find_or_create_organization(
    conn: &mut SqliteConnection,
    code: &str,
    name: &str,
) -> Result<i64> {
    if let Some(id) = organization_id_by_code(conn, code).await? {
        return Ok(id);
    }
    let result = sqlx::query("INSERT INTO organizations (code, name) VALUES (?, ?)")
        .bind(code)
        .bind(name)
        .execute(&mut *conn)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn organization_id_by_code(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<i64>> {
    let row = sqlx::query("SELECT id FROM organizations WHERE code = ?")
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|r| r.get(0)))
}

/// Find a user by email, creating it when absent. Like organizations,
/// existing users are never updated.
pub async fn find_or_create_user(
    conn: &mut SqliteConnection,
    email: &str,
    name: &str,
    is_admin: bool,
    password_hash: &str,
) -> Result<i64> {
    let existing = sqlx::query("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(row) = existing {
        return Ok(row.get(0));
    }
    let result = sqlx::query(
        "INSERT INTO users (email, name, password_hash, is_admin) VALUES (?, ?, ?, ?)",
    )
    .bind(email)
    .bind(name)
    .bind(password_hash)
    .bind(is_admin)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Update-or-create a gateway by serial number.
pub async fn upsert_gateway(
    conn: &mut SqliteConnection,
    draft: &GatewayDraft,
    organization_id: i64,
) -> Result<i64> {
    let existing = find_gateway_by_serial(conn, &draft.serial).await?;
    match existing {
        Some(id) => {
            sqlx::query(
                "UPDATE gateways
                 SET mac_address = ?, ip_address = ?, firmware = ?, organization_id = ?
                 WHERE id = ?",
            )
            .bind(&draft.mac_address)
            .bind(&draft.ip_address)
            .bind(&draft.firmware)
            .bind(organization_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;
            Ok(id)
        }
        None => {
            let result = sqlx::query(
                "INSERT INTO gateways (serial, mac_address, ip_address, firmware, organization_id)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&draft.serial)
            .bind(&draft.mac_address)
            .bind(&draft.ip_address)
            .bind(&draft.firmware)
            .bind(organization_id)
            .execute(&mut *conn)
            .await?;
            Ok(result.last_insert_rowid())
        }
    }
}

pub async fn find_gateway_by_serial(
    conn: &mut SqliteConnection,
    serial: &str,
) -> Result<Option<i64>> {
    let row = sqlx::query("SELECT id FROM gateways WHERE serial = ?")
        .bind(serial)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|r| r.get(0)))
}

/// Find a configuration-file entity by filename, creating it when absent.
pub async fn find_or_create_config(conn: &mut SqliteConnection, filename: &str) -> Result<i64> {
    let existing = sqlx::query("SELECT id FROM meter_configs WHERE filename = ?")
        .bind(filename)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(row) = existing {
        return Ok(row.get(0));
    }
    let result = sqlx::query("INSERT INTO meter_configs (filename) VALUES (?)")
        .bind(filename)
        .execute(&mut *conn)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Update-or-create a meter by (name, organization, gateway).
pub async fn upsert_meter(
    conn: &mut SqliteConnection,
    draft: &MeterDraft,
    organization_id: i64,
    gateway_id: i64,
    config_id: Option<i64>,
) -> Result<i64> {
    let existing = sqlx::query(
        "SELECT id FROM meters WHERE name = ? AND organization_id = ? AND gateway_id = ?",
    )
    .bind(&draft.name)
    .bind(organization_id)
    .bind(gateway_id)
    .fetch_optional(&mut *conn)
    .await?;

    match existing {
        Some(row) => {
            let id: i64 = row.get(0);
            sqlx::query("UPDATE meters SET model = ?, multiplier = ?, config_id = ? WHERE id = ?")
                .bind(&draft.model)
                .bind(draft.multiplier)
                .bind(config_id)
                .bind(id)
                .execute(&mut *conn)
                .await?;
            Ok(id)
        }
        None => {
            let result = sqlx::query(
                "INSERT INTO meters (name, model, multiplier, organization_id, gateway_id, config_id)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&draft.name)
            .bind(&draft.model)
            .bind(draft.multiplier)
            .bind(organization_id)
            .bind(gateway_id)
            .bind(config_id)
            .execute(&mut *conn)
            .await?;
            Ok(result.last_insert_rowid())
        }
    }
}

/// The INSERT statement for readings, generated once from the rule table.
fn reading_insert_sql() -> &'static str {
    static SQL: OnceLock<String> = OnceLock::new();
    SQL.get_or_init(|| {
        let columns: Vec<&str> = READING_FIELDS.iter().map(|r| r.column).collect();
        let placeholders = vec!["?"; columns.len() + 2].join(", ");
        format!(
            "INSERT INTO readings (meter_id, recorded_at, {}) VALUES ({})",
            columns.join(", "),
            placeholders
        )
    })
}

/// Append one reading. Readings are never upserted; duplicate rows are
/// accepted here and deduplication belongs to the live ingestion path.
pub async fn insert_reading(
    conn: &mut SqliteConnection,
    meter_id: i64,
    recorded_at: DateTime<Utc>,
    values: &[FieldValue],
) -> Result<()> {
    let mut query = sqlx::query(reading_insert_sql())
        .bind(meter_id)
        .bind(recorded_at);
    for value in values {
        query = match value {
            FieldValue::Num(f) => query.bind(*f),
            FieldValue::OptNum(f) => query.bind(*f),
            FieldValue::OptTime(t) => query.bind(*t),
            FieldValue::OptText(s) => query.bind(s.clone()),
        };
    }
    query.execute(&mut *conn).await?;
    Ok(())
}
