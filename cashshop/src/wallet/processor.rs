//! Wallet operations.

use crate::wallet::events::{
    BalanceBody, DeletedBody, EVENT_TOPIC_WALLET_STATUS, STATUS_CREATED, STATUS_DELETED, STATUS_UPDATED,
    StatusEvent,
};
use crate::wallet::model::{Currency, Wallet};
use crate::wallet::store;
use atlas_core::emit::emit;
use atlas_core::producer::Producer;
use atlas_core::{Context, Error, MessageBuffer, Result, topic};
use atlas_postgres::execute_transaction;
use serde::Serialize;
use sqlx::PgPool;

/// Wallet processor.
#[derive(Clone)]
pub struct WalletProcessor {
    pool: PgPool,
    status_topic: String,
}

impl std::fmt::Debug for WalletProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletProcessor")
            .field("status_topic", &self.status_topic)
            .finish_non_exhaustive()
    }
}

impl WalletProcessor {
    /// Processor over `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            status_topic: topic::resolve(EVENT_TOPIC_WALLET_STATUS),
        }
    }

    /// Status topic.
    #[must_use]
    pub fn status_topic(&self) -> &str {
        &self.status_topic
    }

    /// Wallet of `account_id`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], database failures.
    pub async fn get_by_account(&self, ctx: &Context, account_id: u32) -> Result<Wallet> {
        let tenant_id = ctx.tenant().id();
        execute_transaction(ctx, &self.pool, |mut tx| async move {
            let result = store::by_account(&mut tx, tenant_id, account_id, false).await;
            (tx, result)
        })
        .await?
        .ok_or_else(|| Error::not_found("wallet", account_id))
    }

    /// Open a wallet for `account_id` and stage `CREATED`.
    ///
    /// # Errors
    ///
    /// [`Error::Conflict`] when the account already has a wallet, database
    /// failures.
    pub async fn create(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        account_id: u32,
        credit: u32,
        points: u32,
        prepaid: u32,
    ) -> Result<Wallet> {
        let tenant_id = ctx.tenant().id();
        let wallet = execute_transaction(ctx, &self.pool, |mut tx| async move {
            let result = store::insert(&mut tx, tenant_id, account_id, credit, points, prepaid).await;
            (tx, result)
        })
        .await?;
        tracing::debug!(account_id, credit, points, prepaid, "wallet created");
        self.stage(buffer, account_id, STATUS_CREATED, BalanceBody::from(&wallet));
        Ok(wallet)
    }

    /// Replace the balances of `account_id` and stage `UPDATED`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], database failures.
    pub async fn update(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        account_id: u32,
        credit: u32,
        points: u32,
        prepaid: u32,
    ) -> Result<Wallet> {
        let tenant_id = ctx.tenant().id();
        let wallet = execute_transaction(ctx, &self.pool, |mut tx| async move {
            let result = store::update(&mut tx, tenant_id, account_id, credit, points, prepaid).await;
            (tx, result)
        })
        .await?
        .ok_or_else(|| Error::not_found("wallet", account_id))?;
        tracing::debug!(account_id, credit, points, prepaid, "wallet updated");
        self.stage(buffer, account_id, STATUS_UPDATED, BalanceBody::from(&wallet));
        Ok(wallet)
    }

    /// Add `amount` to one balance of `account_id` and stage `UPDATED`.
    /// The row stays locked between read and write.
    ///
    /// # Errors
    ///
    /// `INVALID_CURRENCY_TYPE` or `INSUFFICIENT_BALANCE` validation,
    /// [`Error::NotFound`], database failures.
    pub async fn adjust_currency(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        account_id: u32,
        currency_type: u32,
        amount: i32,
    ) -> Result<Wallet> {
        let currency = Currency::try_from(currency_type)?;
        let tenant_id = ctx.tenant().id();
        let wallet = execute_transaction(ctx, &self.pool, |mut tx| async move {
            let result = async {
                let wallet = store::by_account(&mut tx, tenant_id, account_id, true)
                    .await?
                    .ok_or_else(|| Error::not_found("wallet", account_id))?;
                let next = wallet.adjusted(currency, amount)?;
                store::update(&mut tx, tenant_id, account_id, next.credit, next.points, next.prepaid)
                    .await?
                    .ok_or_else(|| Error::not_found("wallet", account_id))
            }
            .await;
            (tx, result)
        })
        .await
        .inspect_err(|e| {
            if e.code() == "INSUFFICIENT_BALANCE" {
                tracing::warn!(account_id, %currency, amount, "insufficient balance");
            }
        })?;
        tracing::debug!(account_id, %currency, amount, balance = wallet.balance(currency), "currency adjusted");
        self.stage(buffer, account_id, STATUS_UPDATED, BalanceBody::from(&wallet));
        Ok(wallet)
    }

    /// Close the wallet of `account_id` and stage `DELETED`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], database failures.
    pub async fn delete(&self, ctx: &Context, buffer: &mut MessageBuffer, account_id: u32) -> Result<Wallet> {
        let tenant_id = ctx.tenant().id();
        let wallet = execute_transaction(ctx, &self.pool, |mut tx| async move {
            let result = store::delete(&mut tx, tenant_id, account_id).await;
            (tx, result)
        })
        .await?
        .ok_or_else(|| Error::not_found("wallet", account_id))?;
        tracing::info!(account_id, "wallet deleted");
        self.stage(buffer, account_id, STATUS_DELETED, DeletedBody {});
        Ok(wallet)
    }

    /// [`create`](Self::create) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`create`](Self::create).
    pub async fn create_and_emit(
        &self,
        producer: &dyn Producer,
        ctx: &Context,
        account_id: u32,
        credit: u32,
        points: u32,
        prepaid: u32,
    ) -> Result<Wallet> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self.create(ctx, &mut buffer, account_id, credit, points, prepaid).await;
            (buffer, result)
        })
        .await
    }

    /// [`update`](Self::update) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update).
    pub async fn update_and_emit(
        &self,
        producer: &dyn Producer,
        ctx: &Context,
        account_id: u32,
        credit: u32,
        points: u32,
        prepaid: u32,
    ) -> Result<Wallet> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self.update(ctx, &mut buffer, account_id, credit, points, prepaid).await;
            (buffer, result)
        })
        .await
    }

    /// [`adjust_currency`](Self::adjust_currency) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`adjust_currency`](Self::adjust_currency).
    pub async fn adjust_currency_and_emit(
        &self,
        producer: &dyn Producer,
        ctx: &Context,
        account_id: u32,
        currency_type: u32,
        amount: i32,
    ) -> Result<Wallet> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self
                .adjust_currency(ctx, &mut buffer, account_id, currency_type, amount)
                .await;
            (buffer, result)
        })
        .await
    }

    /// [`delete`](Self::delete) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`delete`](Self::delete).
    pub async fn delete_and_emit(&self, producer: &dyn Producer, ctx: &Context, account_id: u32) -> Result<Wallet> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self.delete(ctx, &mut buffer, account_id).await;
            (buffer, result)
        })
        .await
    }

    fn stage<B>(&self, buffer: &mut MessageBuffer, account_id: u32, kind: &str, body: B)
    where
        B: Serialize + Send + Sync + 'static,
    {
        buffer.put_json(
            self.status_topic.clone(),
            account_id,
            StatusEvent {
                account_id,
                kind: kind.to_string(),
                body,
            },
        );
    }
}
