//! `cash_assets` persistence.
//!
//! Every query filters on `tenant_id` except the cash id existence check
//! and the due-tenant scan, both of which span tenants.

use crate::model::{Asset, NewAsset};
use atlas_core::tenant::Tenant;
use atlas_core::{Error, Result};
use atlas_postgres::{Tx, db_error};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Schema statements, applied at startup.
pub const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS cash_assets (
        id SERIAL PRIMARY KEY,
        tenant_id UUID NOT NULL,
        tenant TEXT NOT NULL,
        compartment_id UUID NOT NULL,
        cash_id BIGINT NOT NULL UNIQUE,
        template_id BIGINT NOT NULL,
        commodity_id BIGINT NOT NULL,
        quantity BIGINT NOT NULL,
        flag INTEGER NOT NULL,
        purchased_by BIGINT NOT NULL,
        expiration TIMESTAMPTZ
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_cash_assets_tenant_compartment
        ON cash_assets (tenant_id, compartment_id)
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_cash_assets_expiration
        ON cash_assets (expiration) WHERE expiration IS NOT NULL
    ",
];

const COLUMNS: &str =
    "id, tenant_id, compartment_id, cash_id, template_id, commodity_id, quantity, flag, purchased_by, expiration";

fn from_row(row: &PgRow) -> Result<Asset> {
    let unsigned = |column: &str| -> Result<u32> {
        let raw: i64 = row.try_get(column).map_err(db_error)?;
        u32::try_from(raw).map_err(|_| Error::Unexpected(format!("{column} {raw} out of range")))
    };
    let id: i32 = row.try_get("id").map_err(db_error)?;
    let flag: i32 = row.try_get("flag").map_err(db_error)?;
    Ok(Asset {
        id: u32::try_from(id).map_err(|_| Error::Unexpected(format!("asset id {id} out of range")))?,
        tenant_id: row.try_get("tenant_id").map_err(db_error)?,
        compartment_id: row.try_get("compartment_id").map_err(db_error)?,
        cash_id: row.try_get("cash_id").map_err(db_error)?,
        template_id: unsigned("template_id")?,
        commodity_id: unsigned("commodity_id")?,
        quantity: unsigned("quantity")?,
        flag: u16::try_from(flag).map_err(|_| Error::Unexpected(format!("flag {flag} out of range")))?,
        purchased_by: unsigned("purchased_by")?,
        expiration: row.try_get("expiration").map_err(db_error)?,
    })
}

fn row_id(id: u32) -> Result<i32> {
    i32::try_from(id).map_err(|_| Error::not_found("asset", id))
}

/// Whether any tenant holds `cash_id`.
///
/// # Errors
///
/// Database failures.
pub async fn cash_id_exists(tx: &mut Tx, cash_id: i64) -> Result<bool> {
    let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM cash_assets WHERE cash_id = $1)")
        .bind(cash_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(db_error)?;
    row.try_get(0).map_err(db_error)
}

/// Insert an asset for `tenant`.
///
/// # Errors
///
/// [`Error::Conflict`] when `cash_id` is taken, other database failures.
pub async fn insert(
    tx: &mut Tx,
    tenant: &Tenant,
    asset: &NewAsset,
    cash_id: i64,
    expiration: Option<DateTime<Utc>>,
) -> Result<Asset> {
    let row = sqlx::query(&format!(
        "INSERT INTO cash_assets
            (tenant_id, tenant, compartment_id, cash_id, template_id, commodity_id, quantity, flag, purchased_by, expiration)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING {COLUMNS}"
    ))
    .bind(tenant.id())
    .bind(tenant.key())
    .bind(asset.compartment_id)
    .bind(cash_id)
    .bind(i64::from(asset.template_id))
    .bind(i64::from(asset.commodity_id))
    .bind(i64::from(asset.quantity))
    .bind(i32::from(asset.flag))
    .bind(i64::from(asset.purchased_by))
    .bind(expiration)
    .fetch_one(&mut **tx)
    .await
    .map_err(db_error)?;
    from_row(&row)
}

/// Asset `id`.
///
/// # Errors
///
/// Database failures.
pub async fn by_id(tx: &mut Tx, tenant_id: Uuid, id: u32) -> Result<Option<Asset>> {
    let row = sqlx::query(&format!("SELECT {COLUMNS} FROM cash_assets WHERE tenant_id = $1 AND id = $2"))
        .bind(tenant_id)
        .bind(row_id(id)?)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error)?;
    row.as_ref().map(from_row).transpose()
}

/// Asset carrying `cash_id` in `tenant_id`.
///
/// # Errors
///
/// Database failures.
pub async fn by_cash_id(tx: &mut Tx, tenant_id: Uuid, cash_id: i64) -> Result<Option<Asset>> {
    let row = sqlx::query(&format!("SELECT {COLUMNS} FROM cash_assets WHERE tenant_id = $1 AND cash_id = $2"))
        .bind(tenant_id)
        .bind(cash_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error)?;
    row.as_ref().map(from_row).transpose()
}

/// Assets in `compartment_id`, oldest first.
///
/// # Errors
///
/// Database failures.
pub async fn by_compartment(tx: &mut Tx, tenant_id: Uuid, compartment_id: Uuid) -> Result<Vec<Asset>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM cash_assets WHERE tenant_id = $1 AND compartment_id = $2 ORDER BY id"
    ))
    .bind(tenant_id)
    .bind(compartment_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(db_error)?;
    rows.iter().map(from_row).collect()
}

/// Assets of `tenant_id` whose expiration is at or before `now`.
///
/// # Errors
///
/// Database failures.
pub async fn due(tx: &mut Tx, tenant_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Asset>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM cash_assets
         WHERE tenant_id = $1 AND expiration IS NOT NULL AND expiration <= $2
         ORDER BY expiration, id"
    ))
    .bind(tenant_id)
    .bind(now)
    .fetch_all(&mut **tx)
    .await
    .map_err(db_error)?;
    rows.iter().map(from_row).collect()
}

/// Keys of every tenant holding an asset due at `now`.
///
/// # Errors
///
/// Database failures.
pub async fn due_tenants(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<String>> {
    let rows = sqlx::query(
        "SELECT DISTINCT tenant FROM cash_assets WHERE expiration IS NOT NULL AND expiration <= $1",
    )
    .bind(now)
    .fetch_all(pool)
    .await
    .map_err(db_error)?;
    rows.iter().map(|row| row.try_get("tenant").map_err(db_error)).collect()
}

/// Column change applied by [`update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// New stack size
    Quantity(u32),
    /// New flag bits
    Flag(u16),
    /// New compartment
    Compartment(Uuid),
}

/// Apply `change` to asset `id`, returning the updated row.
///
/// # Errors
///
/// Database failures.
pub async fn update(tx: &mut Tx, tenant_id: Uuid, id: u32, change: Change) -> Result<Option<Asset>> {
    let column = match change {
        Change::Quantity(_) => "quantity",
        Change::Flag(_) => "flag",
        Change::Compartment(_) => "compartment_id",
    };
    let sql = format!("UPDATE cash_assets SET {column} = $3 WHERE tenant_id = $1 AND id = $2 RETURNING {COLUMNS}");
    let query = sqlx::query(&sql).bind(tenant_id).bind(row_id(id)?);
    let query = match change {
        Change::Quantity(quantity) => query.bind(i64::from(quantity)),
        Change::Flag(flag) => query.bind(i32::from(flag)),
        Change::Compartment(compartment_id) => query.bind(compartment_id),
    };
    let row = query.fetch_optional(&mut **tx).await.map_err(db_error)?;
    row.as_ref().map(from_row).transpose()
}

/// Delete asset `id`, returning it.
///
/// # Errors
///
/// Database failures.
pub async fn delete(tx: &mut Tx, tenant_id: Uuid, id: u32) -> Result<Option<Asset>> {
    let row = sqlx::query(&format!("DELETE FROM cash_assets WHERE tenant_id = $1 AND id = $2 RETURNING {COLUMNS}"))
        .bind(tenant_id)
        .bind(row_id(id)?)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error)?;
    row.as_ref().map(from_row).transpose()
}
