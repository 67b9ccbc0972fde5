//! Cash-shop asset and wallet routes.
//!
//! - `POST /cash-shop/assets`
//! - `GET | PATCH | DELETE /cash-shop/assets/:assetId`
//! - `GET /cash-shop/compartments/:compartmentId/assets`
//! - `GET | POST | PATCH | DELETE /accounts/:accountId/wallet`

use atlas_cashshop::rest::{CreateRequest, RestModel, UpdateRequest, transform};
use atlas_cashshop::wallet::rest::{self as wallet_rest, BalanceRequest};
use atlas_cashshop::{CashAssetProcessor, WalletProcessor};
use atlas_core::producer::Producer;
use atlas_web::{TenantContext, WebResult};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
struct CashShopApi {
    processor: CashAssetProcessor,
    producer: Arc<dyn Producer>,
}

/// Cash asset routes over `processor`, emitting through `producer`.
pub fn router(processor: CashAssetProcessor, producer: Arc<dyn Producer>) -> Router {
    Router::new()
        .route("/cash-shop/assets", post(create))
        .route(
            "/cash-shop/assets/:asset_id",
            get(by_id).patch(update).delete(remove),
        )
        .route("/cash-shop/compartments/:compartment_id/assets", get(by_compartment))
        .with_state(CashShopApi { processor, producer })
}

async fn create(
    State(api): State<CashShopApi>,
    TenantContext(ctx): TenantContext,
    Json(request): Json<CreateRequest>,
) -> WebResult<(StatusCode, Json<RestModel>)> {
    let asset = api
        .processor
        .create_and_emit(api.producer.as_ref(), &ctx, request.into())
        .await?;
    Ok((StatusCode::CREATED, Json(transform(&asset))))
}

async fn by_id(
    State(api): State<CashShopApi>,
    TenantContext(ctx): TenantContext,
    Path(asset_id): Path<u32>,
) -> WebResult<Json<RestModel>> {
    let asset = api.processor.get_by_id(&ctx, asset_id).await?;
    Ok(Json(transform(&asset)))
}

async fn update(
    State(api): State<CashShopApi>,
    TenantContext(ctx): TenantContext,
    Path(asset_id): Path<u32>,
    Json(request): Json<UpdateRequest>,
) -> WebResult<Json<RestModel>> {
    let asset = api
        .processor
        .update_quantity_and_emit(api.producer.as_ref(), &ctx, asset_id, request.quantity)
        .await?;
    Ok(Json(transform(&asset)))
}

async fn remove(
    State(api): State<CashShopApi>,
    TenantContext(ctx): TenantContext,
    Path(asset_id): Path<u32>,
) -> WebResult<StatusCode> {
    api.processor
        .delete_and_emit(api.producer.as_ref(), &ctx, asset_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn by_compartment(
    State(api): State<CashShopApi>,
    TenantContext(ctx): TenantContext,
    Path(compartment_id): Path<Uuid>,
) -> WebResult<Json<Vec<RestModel>>> {
    let assets = api.processor.get_by_compartment(&ctx, compartment_id).await?;
    Ok(Json(assets.iter().map(transform).collect()))
}

#[derive(Clone)]
struct WalletApi {
    processor: WalletProcessor,
    producer: Arc<dyn Producer>,
}

/// Wallet routes over `processor`, emitting through `producer`.
pub fn wallet_router(processor: WalletProcessor, producer: Arc<dyn Producer>) -> Router {
    Router::new()
        .route(
            "/accounts/:account_id/wallet",
            get(wallet_by_account)
                .post(create_wallet)
                .patch(update_wallet)
                .delete(remove_wallet),
        )
        .with_state(WalletApi { processor, producer })
}

async fn wallet_by_account(
    State(api): State<WalletApi>,
    TenantContext(ctx): TenantContext,
    Path(account_id): Path<u32>,
) -> WebResult<Json<wallet_rest::RestModel>> {
    let wallet = api.processor.get_by_account(&ctx, account_id).await?;
    Ok(Json(wallet_rest::transform(&wallet)))
}

async fn create_wallet(
    State(api): State<WalletApi>,
    TenantContext(ctx): TenantContext,
    Path(account_id): Path<u32>,
    Json(request): Json<BalanceRequest>,
) -> WebResult<(StatusCode, Json<wallet_rest::RestModel>)> {
    let wallet = api
        .processor
        .create_and_emit(
            api.producer.as_ref(),
            &ctx,
            account_id,
            request.credit,
            request.points,
            request.prepaid,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(wallet_rest::transform(&wallet))))
}

async fn update_wallet(
    State(api): State<WalletApi>,
    TenantContext(ctx): TenantContext,
    Path(account_id): Path<u32>,
    Json(request): Json<BalanceRequest>,
) -> WebResult<Json<wallet_rest::RestModel>> {
    let wallet = api
        .processor
        .update_and_emit(
            api.producer.as_ref(),
            &ctx,
            account_id,
            request.credit,
            request.points,
            request.prepaid,
        )
        .await?;
    Ok(Json(wallet_rest::transform(&wallet)))
}

async fn remove_wallet(
    State(api): State<WalletApi>,
    TenantContext(ctx): TenantContext,
    Path(account_id): Path<u32>,
) -> WebResult<StatusCode> {
    api.processor
        .delete_and_emit(api.producer.as_ref(), &ctx, account_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
