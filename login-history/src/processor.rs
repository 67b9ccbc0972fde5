//! Login history operations.

use crate::model::{Attempt, DEFAULT_RETENTION_DAYS, LoginEntry};
use crate::store::{self, Filter};
use atlas_core::environment::Clock;
use atlas_core::{Context, Error, Result};
use atlas_postgres::execute_transaction;
use chrono::Duration;
use sqlx::PgPool;
use std::sync::Arc;

/// Login history processor.
#[derive(Clone)]
pub struct LoginHistoryProcessor {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    retention_days: u32,
}

impl std::fmt::Debug for LoginHistoryProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginHistoryProcessor")
            .field("retention_days", &self.retention_days)
            .finish_non_exhaustive()
    }
}

impl LoginHistoryProcessor {
    /// Processor over `pool` keeping [`DEFAULT_RETENTION_DAYS`] of history.
    #[must_use]
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            clock,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    /// Keep `days` of history instead.
    #[must_use]
    pub const fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Record a login attempt for the caller's tenant.
    ///
    /// # Errors
    ///
    /// `INVALID_LOGIN` validation when a failed attempt has no reason,
    /// database failures.
    pub async fn record(&self, ctx: &Context, attempt: Attempt) -> Result<LoginEntry> {
        if !attempt.success && attempt.failure_reason.is_empty() {
            return Err(Error::validation("INVALID_LOGIN", "failed attempts need a reason"));
        }
        let tenant_id = ctx.tenant().id();
        let now = self.clock.now();
        let entry = execute_transaction(ctx, &self.pool, |mut tx| async move {
            let result = store::insert(&mut tx, tenant_id, &attempt, now).await;
            (tx, result)
        })
        .await?;
        tracing::debug!(account_id = entry.account_id, success = entry.success, "login recorded");
        Ok(entry)
    }

    async fn find(&self, ctx: &Context, filter: Filter) -> Result<Vec<LoginEntry>> {
        let tenant_id = ctx.tenant().id();
        execute_transaction(ctx, &self.pool, |mut tx| async move {
            let result = store::find(&mut tx, tenant_id, &filter).await;
            (tx, result)
        })
        .await
    }

    /// Every entry of the caller's tenant, newest first.
    ///
    /// # Errors
    ///
    /// Database failures.
    pub async fn get_by_tenant(&self, ctx: &Context) -> Result<Vec<LoginEntry>> {
        self.find(ctx, Filter::All).await
    }

    /// Entries of `account_id`.
    ///
    /// # Errors
    ///
    /// Database failures.
    pub async fn get_by_account(&self, ctx: &Context, account_id: u32) -> Result<Vec<LoginEntry>> {
        self.find(ctx, Filter::Account(account_id)).await
    }

    /// Entries from `ip_address`.
    ///
    /// # Errors
    ///
    /// Database failures.
    pub async fn get_by_ip(&self, ctx: &Context, ip_address: &str) -> Result<Vec<LoginEntry>> {
        self.find(ctx, Filter::Ip(ip_address.to_string())).await
    }

    /// Entries from hardware `hwid`.
    ///
    /// # Errors
    ///
    /// Database failures.
    pub async fn get_by_hwid(&self, ctx: &Context, hwid: &str) -> Result<Vec<LoginEntry>> {
        self.find(ctx, Filter::Hwid(hwid.to_string())).await
    }

    /// Delete entries older than the retention window across every tenant.
    ///
    /// Runs without a tenant: it is housekeeping, never a request.
    ///
    /// # Errors
    ///
    /// Database failures.
    pub async fn purge(&self) -> Result<u64> {
        let cutoff = self.clock.now() - Duration::days(i64::from(self.retention_days));
        let purged = store::purge_before(&self.pool, cutoff).await?;
        tracing::info!(purged, %cutoff, "login history purged");
        Ok(purged)
    }
}
