//! `cash_wallets` persistence. Every query filters on `tenant_id`.

use crate::wallet::model::Wallet;
use atlas_core::{Error, Result};
use atlas_postgres::{Tx, db_error};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

/// Schema statements, applied at startup.
pub const SCHEMA: &[&str] = &[r"
    CREATE TABLE IF NOT EXISTS cash_wallets (
        id SERIAL PRIMARY KEY,
        tenant_id UUID NOT NULL,
        account_id BIGINT NOT NULL,
        credit BIGINT NOT NULL CHECK (credit >= 0),
        points BIGINT NOT NULL CHECK (points >= 0),
        prepaid BIGINT NOT NULL CHECK (prepaid >= 0),
        UNIQUE (tenant_id, account_id)
    )
    "];

const COLUMNS: &str = "id, tenant_id, account_id, credit, points, prepaid";

fn from_row(row: &PgRow) -> Result<Wallet> {
    let unsigned = |column: &str| -> Result<u32> {
        let raw: i64 = row.try_get(column).map_err(db_error)?;
        u32::try_from(raw).map_err(|_| Error::Unexpected(format!("{column} {raw} out of range")))
    };
    let id: i32 = row.try_get("id").map_err(db_error)?;
    Ok(Wallet {
        id: u32::try_from(id).map_err(|_| Error::Unexpected(format!("wallet id {id} out of range")))?,
        tenant_id: row.try_get("tenant_id").map_err(db_error)?,
        account_id: unsigned("account_id")?,
        credit: unsigned("credit")?,
        points: unsigned("points")?,
        prepaid: unsigned("prepaid")?,
    })
}

/// Wallet of `account_id`. `for_update` locks the row until the
/// transaction ends.
///
/// # Errors
///
/// Database failures.
pub async fn by_account(tx: &mut Tx, tenant_id: Uuid, account_id: u32, for_update: bool) -> Result<Option<Wallet>> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM cash_wallets WHERE tenant_id = $1 AND account_id = $2{lock}"
    ))
    .bind(tenant_id)
    .bind(i64::from(account_id))
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_error)?;
    row.as_ref().map(from_row).transpose()
}

/// Insert a wallet for `account_id`.
///
/// # Errors
///
/// [`Error::Conflict`] when the account already has one, other database
/// failures.
pub async fn insert(tx: &mut Tx, tenant_id: Uuid, account_id: u32, credit: u32, points: u32, prepaid: u32) -> Result<Wallet> {
    let row = sqlx::query(&format!(
        "INSERT INTO cash_wallets (tenant_id, account_id, credit, points, prepaid)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(i64::from(account_id))
    .bind(i64::from(credit))
    .bind(i64::from(points))
    .bind(i64::from(prepaid))
    .fetch_one(&mut **tx)
    .await
    .map_err(db_error)?;
    from_row(&row)
}

/// Replace the balances of `account_id`, returning the updated row.
///
/// # Errors
///
/// Database failures.
pub async fn update(tx: &mut Tx, tenant_id: Uuid, account_id: u32, credit: u32, points: u32, prepaid: u32) -> Result<Option<Wallet>> {
    let row = sqlx::query(&format!(
        "UPDATE cash_wallets SET credit = $3, points = $4, prepaid = $5
         WHERE tenant_id = $1 AND account_id = $2
         RETURNING {COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(i64::from(account_id))
    .bind(i64::from(credit))
    .bind(i64::from(points))
    .bind(i64::from(prepaid))
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_error)?;
    row.as_ref().map(from_row).transpose()
}

/// Delete the wallet of `account_id`, returning it.
///
/// # Errors
///
/// Database failures.
pub async fn delete(tx: &mut Tx, tenant_id: Uuid, account_id: u32) -> Result<Option<Wallet>> {
    let row = sqlx::query(&format!(
        "DELETE FROM cash_wallets WHERE tenant_id = $1 AND account_id = $2 RETURNING {COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(i64::from(account_id))
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_error)?;
    row.as_ref().map(from_row).transpose()
}
