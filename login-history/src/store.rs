//! `login_history` persistence.

use crate::model::{Attempt, LoginEntry};
use atlas_core::{Error, Result};
use atlas_postgres::{Tx, db_error};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Schema statements, applied at startup.
pub const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS login_history (
        id BIGSERIAL PRIMARY KEY,
        tenant_id UUID NOT NULL,
        account_id BIGINT NOT NULL,
        account_name TEXT NOT NULL,
        ip_address TEXT NOT NULL,
        hwid TEXT NOT NULL,
        success BOOLEAN NOT NULL,
        failure_reason TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_login_history_tenant_account ON login_history (tenant_id, account_id)",
    "CREATE INDEX IF NOT EXISTS idx_login_history_tenant_ip ON login_history (tenant_id, ip_address)",
    "CREATE INDEX IF NOT EXISTS idx_login_history_tenant_hwid ON login_history (tenant_id, hwid)",
    "CREATE INDEX IF NOT EXISTS idx_login_history_created_at ON login_history (created_at)",
];

const COLUMNS: &str = "id, tenant_id, account_id, account_name, ip_address, hwid, success, failure_reason, created_at";

fn from_row(row: &PgRow) -> Result<LoginEntry> {
    let account_id: i64 = row.try_get("account_id").map_err(db_error)?;
    Ok(LoginEntry {
        id: row.try_get("id").map_err(db_error)?,
        tenant_id: row.try_get("tenant_id").map_err(db_error)?,
        account_id: u32::try_from(account_id)
            .map_err(|_| Error::Unexpected(format!("account id {account_id} out of range")))?,
        account_name: row.try_get("account_name").map_err(db_error)?,
        ip_address: row.try_get("ip_address").map_err(db_error)?,
        hwid: row.try_get("hwid").map_err(db_error)?,
        success: row.try_get("success").map_err(db_error)?,
        failure_reason: row.try_get("failure_reason").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
    })
}

/// Append an attempt.
///
/// # Errors
///
/// Database failures.
pub async fn insert(tx: &mut Tx, tenant_id: Uuid, attempt: &Attempt, at: DateTime<Utc>) -> Result<LoginEntry> {
    let row = sqlx::query(&format!(
        "INSERT INTO login_history
            (tenant_id, account_id, account_name, ip_address, hwid, success, failure_reason, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(i64::from(attempt.account_id))
    .bind(&attempt.account_name)
    .bind(&attempt.ip_address)
    .bind(&attempt.hwid)
    .bind(attempt.success)
    .bind(&attempt.failure_reason)
    .bind(at)
    .fetch_one(&mut **tx)
    .await
    .map_err(db_error)?;
    from_row(&row)
}

/// Column an entry lookup filters on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Every entry of the tenant
    All,
    /// One account
    Account(u32),
    /// One remote address
    Ip(String),
    /// One hardware id
    Hwid(String),
}

/// Entries of `tenant_id` matching `filter`, newest first.
///
/// # Errors
///
/// Database failures.
pub async fn find(tx: &mut Tx, tenant_id: Uuid, filter: &Filter) -> Result<Vec<LoginEntry>> {
    let condition = match filter {
        Filter::All => "",
        Filter::Account(_) => "AND account_id = $2",
        Filter::Ip(_) => "AND ip_address = $2",
        Filter::Hwid(_) => "AND hwid = $2",
    };
    let sql = format!(
        "SELECT {COLUMNS} FROM login_history WHERE tenant_id = $1 {condition} ORDER BY created_at DESC, id DESC"
    );
    let query = sqlx::query(&sql).bind(tenant_id);
    let query = match filter {
        Filter::All => query,
        Filter::Account(account_id) => query.bind(i64::from(*account_id)),
        Filter::Ip(ip) => query.bind(ip.clone()),
        Filter::Hwid(hwid) => query.bind(hwid.clone()),
    };
    let rows = query.fetch_all(&mut **tx).await.map_err(db_error)?;
    rows.iter().map(from_row).collect()
}

/// Delete entries of every tenant created before `cutoff`.
///
/// # Errors
///
/// Database failures.
pub async fn purge_before(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM login_history WHERE created_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await
        .map_err(db_error)?;
    Ok(result.rows_affected())
}
