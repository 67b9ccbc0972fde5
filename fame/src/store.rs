//! `fame_logs` persistence.

use crate::model::FameLog;
use atlas_core::{Error, Result};
use atlas_postgres::{Tx, db_error};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

/// Schema statements, applied at startup.
pub const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS fame_logs (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL,
        character_id BIGINT NOT NULL,
        target_id BIGINT NOT NULL,
        amount SMALLINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_fame_logs_tenant_character
        ON fame_logs (tenant_id, character_id, created_at)
    ",
];

const COLUMNS: &str = "id, tenant_id, character_id, target_id, amount, created_at";

fn from_row(row: &PgRow) -> Result<FameLog> {
    let id = |column: &str| -> Result<u32> {
        let raw: i64 = row.try_get(column).map_err(db_error)?;
        u32::try_from(raw).map_err(|_| Error::Unexpected(format!("{column} {raw} out of range")))
    };
    let amount: i16 = row.try_get("amount").map_err(db_error)?;
    Ok(FameLog {
        id: row.try_get("id").map_err(db_error)?,
        tenant_id: row.try_get("tenant_id").map_err(db_error)?,
        character_id: id("character_id")?,
        target_id: id("target_id")?,
        amount: i8::try_from(amount).map_err(|_| Error::Unexpected(format!("amount {amount} out of range")))?,
        created_at: row.try_get("created_at").map_err(db_error)?,
    })
}

/// Fame given by `character_id` at or after `since`, newest first.
///
/// # Errors
///
/// Database failures.
pub async fn given_since(tx: &mut Tx, tenant_id: Uuid, character_id: u32, since: DateTime<Utc>) -> Result<Vec<FameLog>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM fame_logs
         WHERE tenant_id = $1 AND character_id = $2 AND created_at >= $3
         ORDER BY created_at DESC"
    ))
    .bind(tenant_id)
    .bind(i64::from(character_id))
    .bind(since)
    .fetch_all(&mut **tx)
    .await
    .map_err(db_error)?;
    rows.iter().map(from_row).collect()
}

/// Insert `log`.
///
/// # Errors
///
/// Database failures.
pub async fn insert(tx: &mut Tx, log: &FameLog) -> Result<()> {
    sqlx::query(&format!("INSERT INTO fame_logs ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"))
        .bind(log.id)
        .bind(log.tenant_id)
        .bind(i64::from(log.character_id))
        .bind(i64::from(log.target_id))
        .bind(i16::from(log.amount))
        .bind(log.created_at)
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;
    Ok(())
}

/// Delete every log given or received by `character_id`.
///
/// # Errors
///
/// Database failures.
pub async fn delete_by_character(tx: &mut Tx, tenant_id: Uuid, character_id: u32) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM fame_logs WHERE tenant_id = $1 AND (character_id = $2 OR target_id = $2)",
    )
    .bind(tenant_id)
    .bind(i64::from(character_id))
    .execute(&mut **tx)
    .await
    .map_err(db_error)?;
    Ok(result.rows_affected())
}
