//! `PostgreSQL` support for Atlas services.
//!
//! This crate provides:
//!
//! - pool construction from configuration
//! - inline schema application (each store owns its `CREATE TABLE` statements)
//! - [`execute_transaction`], the transactional half of the outbox pattern
//! - mapping from `sqlx` errors onto the shared error taxonomy
//!
//! # Example
//!
//! ```ignore
//! use atlas_core::emit::emit;
//! use atlas_postgres::execute_transaction;
//!
//! let asset = emit(&*producer, &ctx, |mut buffer| async move {
//!     let result = execute_transaction(&ctx, &pool, |mut tx| {
//!         let buffer = &mut buffer;
//!         async move {
//!             let result = store.insert(&mut tx, &asset).await;
//!             if result.is_ok() {
//!                 buffer.put_json(topic, key, event);
//!             }
//!             (tx, result)
//!         }
//!     })
//!     .await;
//!     (buffer, result)
//! })
//! .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use atlas_core::Context;
use atlas_core::error::{Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::future::Future;
use std::time::Duration;

/// An open transaction.
pub type Tx = Transaction<'static, Postgres>;

/// Pool settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Connection URL
    pub url: String,
    /// Upper bound on open connections
    pub max_connections: u32,
    /// Connections kept open when idle
    pub min_connections: u32,
    /// How long to wait for a free connection
    pub acquire_timeout: Duration,
}

impl PoolConfig {
    /// Defaults for `url`: 10 connections max, 2 idle, 5s acquire timeout.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Open a pool.
///
/// # Errors
///
/// Returns [`Error::Downstream`] if the database is unreachable.
pub async fn connect(config: &PoolConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await
        .map_err(|e| Error::downstream("postgres", format!("Failed to connect: {e}")))?;

    tracing::info!(
        max_connections = config.max_connections,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}

/// Run idempotent schema statements in order.
///
/// # Errors
///
/// Returns [`Error::Downstream`] on the first failing statement.
pub async fn apply_schema(pool: &PgPool, statements: &[&str]) -> Result<()> {
    let mut conn = pool.acquire().await.map_err(db_error)?;
    for statement in statements {
        sqlx::query(statement)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
    }
    Ok(())
}

/// Run `f` inside a transaction.
///
/// `f` receives the transaction by value and returns it with its result.
/// The transaction commits on `Ok` and rolls back on `Err`. If `ctx` is
/// cancelled or expires first, the in-flight transaction is dropped, which
/// rolls it back.
///
/// # Errors
///
/// The error returned by `f`, a begin/commit failure, or
/// [`Error::Cancelled`].
pub async fn execute_transaction<T, F, Fut>(ctx: &Context, pool: &PgPool, f: F) -> Result<T>
where
    F: FnOnce(Tx) -> Fut,
    Fut: Future<Output = (Tx, Result<T>)>,
{
    ctx.run(async {
        let tx = pool.begin().await.map_err(db_error)?;
        let (tx, result) = f(tx).await;
        match result {
            Ok(value) => {
                tx.commit().await.map_err(db_error)?;
                metrics::counter!("atlas_transactions_total", "outcome" => "commit").increment(1);
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                metrics::counter!("atlas_transactions_total", "outcome" => "rollback").increment(1);
                tracing::debug!(error = %e, "transaction rolled back");
                Err(e)
            }
        }
    })
    .await
}

/// Serialize concurrent transactions on `key` until commit or rollback.
///
/// # Errors
///
/// Returns [`Error::Downstream`] if the lock query fails.
pub async fn advisory_lock(tx: &mut Tx, key: i64) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(key)
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;
    Ok(())
}

/// Stable 64-bit advisory lock key for `parts` (FNV-1a).
#[must_use]
pub fn lock_key(parts: &[&str]) -> i64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET;
    for part in parts {
        for byte in part.bytes().chain(std::iter::once(0)) {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(PRIME);
        }
    }
    i64::from_ne_bytes(hash.to_ne_bytes())
}

/// Map a `sqlx` error onto the shared taxonomy.
///
/// - `RowNotFound` becomes [`Error::NotFound`]
/// - unique violations (`23505`) become [`Error::Conflict`]
/// - everything else is [`Error::Downstream`]
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn db_error(e: sqlx::Error) -> Error {
    match &e {
        sqlx::Error::RowNotFound => Error::not_found("row", "query"),
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            Error::Conflict(db.message().to_string())
        }
        _ => Error::downstream("postgres", &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_keys_are_stable_and_distinct() {
        let a = lock_key(&["fame", "tenant", "100"]);
        assert_eq!(a, lock_key(&["fame", "tenant", "100"]));
        assert_ne!(a, lock_key(&["fame", "tenant", "101"]));
        // separators keep adjacent parts from merging
        assert_ne!(lock_key(&["ab", "c"]), lock_key(&["a", "bc"]));
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(db_error(sqlx::Error::RowNotFound), Error::NotFound { .. }));
        assert!(matches!(
            db_error(sqlx::Error::PoolTimedOut),
            Error::Downstream { service: "postgres", .. }
        ));
    }
}
