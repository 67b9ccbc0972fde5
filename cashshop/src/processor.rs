//! Cash asset operations.

use crate::commodity::CommodityCatalog;
use crate::events::{
    AssetBody, DeletedBody, EVENT_TOPIC_CASH_ASSET_STATUS, ExpiredBody, QuantityBody, STATUS_ACCEPTED,
    STATUS_CREATED, STATUS_DELETED, STATUS_EXPIRED, STATUS_MOVED, STATUS_QUANTITY_CHANGED, STATUS_RELEASED,
    STATUS_UPDATED, StatusEvent, TransferBody,
};
use crate::model::{Asset, DEFAULT_PERIOD, HourlyExpirations, NewAsset, expiration};
use crate::store::{self, Change};
use atlas_core::emit::emit;
use atlas_core::environment::Clock;
use atlas_core::producer::Producer;
use atlas_core::tenant::Tenant;
use atlas_core::{Context, Error, MessageBuffer, Result, topic};
use atlas_postgres::execute_transaction;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Draws before cash id generation gives up.
const CASH_ID_ATTEMPTS: usize = 16;

fn random_cash_id() -> i64 {
    rand::thread_rng().gen_range(1..=i64::MAX)
}

/// Cash asset processor.
#[derive(Clone)]
pub struct CashAssetProcessor {
    pool: PgPool,
    catalog: Arc<dyn CommodityCatalog>,
    hourly: Arc<HourlyExpirations>,
    clock: Arc<dyn Clock>,
    status_topic: String,
}

impl std::fmt::Debug for CashAssetProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CashAssetProcessor")
            .field("hourly", &self.hourly)
            .field("status_topic", &self.status_topic)
            .finish_non_exhaustive()
    }
}

impl CashAssetProcessor {
    /// Processor over `pool`, resolving periods through `catalog`.
    #[must_use]
    pub fn new(
        pool: PgPool,
        catalog: Arc<dyn CommodityCatalog>,
        hourly: HourlyExpirations,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            catalog,
            hourly: Arc::new(hourly),
            clock,
            status_topic: topic::resolve(EVENT_TOPIC_CASH_ASSET_STATUS),
        }
    }

    /// Status topic.
    #[must_use]
    pub fn status_topic(&self) -> &str {
        &self.status_topic
    }

    /// Asset `id`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], database failures.
    pub async fn get_by_id(&self, ctx: &Context, id: u32) -> Result<Asset> {
        let tenant_id = ctx.tenant().id();
        execute_transaction(ctx, &self.pool, |mut tx| async move {
            let result = store::by_id(&mut tx, tenant_id, id).await;
            (tx, result)
        })
        .await?
        .ok_or_else(|| Error::not_found("asset", id))
    }

    /// Assets held in `compartment_id`.
    ///
    /// # Errors
    ///
    /// Database failures.
    pub async fn get_by_compartment(&self, ctx: &Context, compartment_id: Uuid) -> Result<Vec<Asset>> {
        let tenant_id = ctx.tenant().id();
        execute_transaction(ctx, &self.pool, |mut tx| async move {
            let result = store::by_compartment(&mut tx, tenant_id, compartment_id).await;
            (tx, result)
        })
        .await
    }

    /// Expiration of a new asset of `template_id` bought as `commodity_id`.
    ///
    /// Commodity lookup failures fall back to [`DEFAULT_PERIOD`].
    async fn expiration_for(&self, ctx: &Context, template_id: u32, commodity_id: u32) -> Option<DateTime<Utc>> {
        let period = if commodity_id == 0 {
            DEFAULT_PERIOD
        } else {
            match self.catalog.period(ctx, commodity_id).await {
                Ok(Some(period)) => period,
                Ok(None) => {
                    tracing::warn!(commodity_id, "unknown commodity, using default period");
                    DEFAULT_PERIOD
                }
                Err(e) => {
                    tracing::warn!(commodity_id, error = %e, "commodity lookup failed, using default period");
                    DEFAULT_PERIOD
                }
            }
        };
        let hours = self.hourly.hours(ctx.tenant().id(), template_id);
        expiration(period, hours, self.clock.now())
    }

    async fn insert(&self, ctx: &Context, asset: NewAsset, cash_id: Option<i64>) -> Result<(Asset, bool)> {
        if asset.quantity == 0 {
            return Err(Error::validation("INVALID_QUANTITY", "asset quantity must be positive"));
        }
        let expiration = self.expiration_for(ctx, asset.template_id, asset.commodity_id).await;
        let tenant = ctx.tenant().clone();

        execute_transaction(ctx, &self.pool, |mut tx| async move {
            let result = async {
                if let Some(cash_id) = cash_id {
                    if let Some(existing) = store::by_cash_id(&mut tx, tenant.id(), cash_id).await? {
                        return Ok((existing, false));
                    }
                    if store::cash_id_exists(&mut tx, cash_id).await? {
                        return Err(Error::Conflict(format!("cash id {cash_id} belongs to another tenant")));
                    }
                    let created = store::insert(&mut tx, &tenant, &asset, cash_id, expiration).await?;
                    return Ok((created, true));
                }
                for _ in 0..CASH_ID_ATTEMPTS {
                    let candidate = random_cash_id();
                    if !store::cash_id_exists(&mut tx, candidate).await? {
                        let created = store::insert(&mut tx, &tenant, &asset, candidate, expiration).await?;
                        return Ok((created, true));
                    }
                }
                Err(Error::Conflict("no free cash id".into()))
            }
            .await;
            (tx, result)
        })
        .await
    }

    /// Create an asset with a fresh cash id and stage `CREATED`.
    ///
    /// # Errors
    ///
    /// `INVALID_QUANTITY` validation, [`Error::Conflict`] if no free cash
    /// id is drawn, database failures.
    pub async fn create(&self, ctx: &Context, buffer: &mut MessageBuffer, asset: NewAsset) -> Result<Asset> {
        let (asset, _) = self.insert(ctx, asset, None).await?;
        tracing::info!(asset_id = asset.id, cash_id = asset.cash_id, template_id = asset.template_id, "cash asset created");
        self.stage(buffer, &asset, STATUS_CREATED, AssetBody::from(&asset));
        Ok(asset)
    }

    /// Asset carrying `cash_id`, created if the tenant has none. `CREATED`
    /// is only staged for a new asset.
    ///
    /// # Errors
    ///
    /// [`Error::Conflict`] when another tenant holds `cash_id`, plus those
    /// of [`create`](Self::create).
    pub async fn create_with_cash_id(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        asset: NewAsset,
        cash_id: i64,
    ) -> Result<Asset> {
        let (asset, created) = self.insert(ctx, asset, Some(cash_id)).await?;
        if created {
            tracing::info!(asset_id = asset.id, cash_id, "cash asset created with existing cash id");
            self.stage(buffer, &asset, STATUS_CREATED, AssetBody::from(&asset));
        }
        Ok(asset)
    }

    async fn change(&self, ctx: &Context, id: u32, change: Change) -> Result<Asset> {
        let tenant_id = ctx.tenant().id();
        execute_transaction(ctx, &self.pool, |mut tx| async move {
            let result = store::update(&mut tx, tenant_id, id, change).await;
            (tx, result)
        })
        .await?
        .ok_or_else(|| Error::not_found("asset", id))
    }

    /// Set the stack size of asset `id`.
    ///
    /// # Errors
    ///
    /// `INVALID_QUANTITY` validation, [`Error::NotFound`], database failures.
    pub async fn update_quantity(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        id: u32,
        quantity: u32,
    ) -> Result<Asset> {
        if quantity == 0 {
            return Err(Error::validation("INVALID_QUANTITY", "asset quantity must be positive"));
        }
        let asset = self.change(ctx, id, Change::Quantity(quantity)).await?;
        self.stage(buffer, &asset, STATUS_QUANTITY_CHANGED, QuantityBody { quantity });
        Ok(asset)
    }

    /// Replace the flag bits of asset `id`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], database failures.
    pub async fn update_flag(&self, ctx: &Context, buffer: &mut MessageBuffer, id: u32, flag: u16) -> Result<Asset> {
        let asset = self.change(ctx, id, Change::Flag(flag)).await?;
        self.stage(buffer, &asset, STATUS_UPDATED, AssetBody::from(&asset));
        Ok(asset)
    }

    /// Move asset `id` to `compartment_id`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], database failures.
    pub async fn move_to(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        id: u32,
        compartment_id: Uuid,
    ) -> Result<Asset> {
        let asset = self.change(ctx, id, Change::Compartment(compartment_id)).await?;
        self.stage(buffer, &asset, STATUS_MOVED, AssetBody::from(&asset));
        Ok(asset)
    }

    async fn remove(&self, ctx: &Context, id: u32) -> Result<Asset> {
        let tenant_id = ctx.tenant().id();
        execute_transaction(ctx, &self.pool, |mut tx| async move {
            let result = store::delete(&mut tx, tenant_id, id).await;
            (tx, result)
        })
        .await?
        .ok_or_else(|| Error::not_found("asset", id))
    }

    /// Delete asset `id`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], database failures.
    pub async fn delete(&self, ctx: &Context, buffer: &mut MessageBuffer, id: u32) -> Result<Asset> {
        let asset = self.remove(ctx, id).await?;
        tracing::info!(asset_id = id, "cash asset deleted");
        self.stage(buffer, &asset, STATUS_DELETED, DeletedBody {});
        Ok(asset)
    }

    /// Move an item from a character's inventory into the cash shop,
    /// keeping its cash id when it has one.
    ///
    /// # Errors
    ///
    /// See [`create_with_cash_id`](Self::create_with_cash_id).
    pub async fn accept(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        transaction_id: Uuid,
        character_id: u32,
        asset: NewAsset,
        cash_id: i64,
    ) -> Result<Asset> {
        let asset = if cash_id == 0 {
            self.create(ctx, buffer, asset).await?
        } else {
            self.create_with_cash_id(ctx, buffer, asset, cash_id).await?
        };
        self.stage(
            buffer,
            &asset,
            STATUS_ACCEPTED,
            TransferBody {
                transaction_id,
                character_id,
            },
        );
        Ok(asset)
    }

    /// Take asset `id` out of the cash shop into a character's inventory.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], database failures.
    pub async fn release(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        transaction_id: Uuid,
        character_id: u32,
        id: u32,
    ) -> Result<Asset> {
        let asset = self.remove(ctx, id).await?;
        tracing::info!(asset_id = id, character_id, "cash asset released");
        self.stage(
            buffer,
            &asset,
            STATUS_RELEASED,
            TransferBody {
                transaction_id,
                character_id,
            },
        );
        Ok(asset)
    }

    /// Expire asset `id`.
    ///
    /// A non-zero `replace_item_id` grants a replacement asset of that
    /// template in the same compartment; failing to create it is logged
    /// and does not fail the expiry.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], database failures.
    pub async fn expire(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        id: u32,
        replace_item_id: u32,
        replace_message: &str,
    ) -> Result<Asset> {
        let asset = self.remove(ctx, id).await?;
        tracing::info!(asset_id = id, template_id = asset.template_id, "cash asset expired");
        self.stage(
            buffer,
            &asset,
            STATUS_EXPIRED,
            ExpiredBody {
                replace_item_id,
                replace_message: replace_message.to_string(),
            },
        );

        if replace_item_id > 0 {
            let replacement = NewAsset {
                compartment_id: asset.compartment_id,
                template_id: replace_item_id,
                commodity_id: 0,
                quantity: 1,
                purchased_by: 0,
                flag: 0,
            };
            if let Err(e) = self.create(ctx, buffer, replacement).await {
                tracing::error!(asset_id = id, replace_item_id, error = %e, "replacement asset not created");
            }
        }
        Ok(asset)
    }

    /// Expire every asset of the caller's tenant that is due now.
    /// Permanent assets are never selected.
    ///
    /// # Errors
    ///
    /// Database failures while listing due assets.
    pub async fn expire_due(&self, ctx: &Context, buffer: &mut MessageBuffer) -> Result<usize> {
        let tenant_id = ctx.tenant().id();
        let now = self.clock.now();
        let due = execute_transaction(ctx, &self.pool, |mut tx| async move {
            let result = store::due(&mut tx, tenant_id, now).await;
            (tx, result)
        })
        .await?;

        let mut expired = 0;
        for asset in due {
            match self.expire(ctx, buffer, asset.id, 0, "").await {
                Ok(_) => expired += 1,
                Err(Error::NotFound { .. }) => {}
                Err(e) => tracing::warn!(asset_id = asset.id, error = %e, "cash asset expiry failed"),
            }
        }
        Ok(expired)
    }

    /// Tenants holding at least one due asset.
    ///
    /// # Errors
    ///
    /// Database failures.
    pub async fn due_tenants(&self) -> Result<Vec<Tenant>> {
        let keys = store::due_tenants(&self.pool, self.clock.now()).await?;
        Ok(keys
            .iter()
            .filter_map(|key| match key.parse::<Tenant>() {
                Ok(tenant) => Some(tenant),
                Err(e) => {
                    tracing::warn!(tenant = %key, error = %e, "skipping unparsable tenant key");
                    None
                }
            })
            .collect())
    }

    /// [`create`](Self::create) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`create`](Self::create).
    pub async fn create_and_emit(&self, producer: &dyn Producer, ctx: &Context, asset: NewAsset) -> Result<Asset> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self.create(ctx, &mut buffer, asset).await;
            (buffer, result)
        })
        .await
    }

    /// [`update_quantity`](Self::update_quantity) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`update_quantity`](Self::update_quantity).
    pub async fn update_quantity_and_emit(
        &self,
        producer: &dyn Producer,
        ctx: &Context,
        id: u32,
        quantity: u32,
    ) -> Result<Asset> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self.update_quantity(ctx, &mut buffer, id, quantity).await;
            (buffer, result)
        })
        .await
    }

    /// [`delete`](Self::delete) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`delete`](Self::delete).
    pub async fn delete_and_emit(&self, producer: &dyn Producer, ctx: &Context, id: u32) -> Result<Asset> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self.delete(ctx, &mut buffer, id).await;
            (buffer, result)
        })
        .await
    }

    /// [`accept`](Self::accept) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`accept`](Self::accept).
    pub async fn accept_and_emit(
        &self,
        producer: &dyn Producer,
        ctx: &Context,
        transaction_id: Uuid,
        character_id: u32,
        asset: NewAsset,
        cash_id: i64,
    ) -> Result<Asset> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self
                .accept(ctx, &mut buffer, transaction_id, character_id, asset, cash_id)
                .await;
            (buffer, result)
        })
        .await
    }

    /// [`release`](Self::release) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`release`](Self::release).
    pub async fn release_and_emit(
        &self,
        producer: &dyn Producer,
        ctx: &Context,
        transaction_id: Uuid,
        character_id: u32,
        id: u32,
    ) -> Result<Asset> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self.release(ctx, &mut buffer, transaction_id, character_id, id).await;
            (buffer, result)
        })
        .await
    }

    /// [`expire`](Self::expire) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`expire`](Self::expire).
    pub async fn expire_and_emit(
        &self,
        producer: &dyn Producer,
        ctx: &Context,
        id: u32,
        replace_item_id: u32,
        replace_message: &str,
    ) -> Result<Asset> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self.expire(ctx, &mut buffer, id, replace_item_id, replace_message).await;
            (buffer, result)
        })
        .await
    }

    /// [`expire_due`](Self::expire_due) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`expire_due`](Self::expire_due).
    pub async fn expire_due_and_emit(&self, producer: &dyn Producer, ctx: &Context) -> Result<usize> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self.expire_due(ctx, &mut buffer).await;
            (buffer, result)
        })
        .await
    }

    fn stage<B>(&self, buffer: &mut MessageBuffer, asset: &Asset, kind: &str, body: B)
    where
        B: Serialize + Send + Sync + 'static,
    {
        buffer.put_json(
            self.status_topic.clone(),
            asset.id,
            StatusEvent {
                asset_id: asset.id,
                compartment_id: asset.compartment_id,
                cash_id: asset.cash_id,
                template_id: asset.template_id,
                kind: kind.to_string(),
                body,
            },
        );
    }
}
