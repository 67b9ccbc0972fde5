//! Messenger routes.
//!
//! - `GET /messengers[?memberId=]`
//! - `POST /messengers`
//! - `GET /messengers/:messengerId`
//! - `POST /messengers/:messengerId/members` (join)
//! - `DELETE /messengers/:messengerId/members/:characterId` (leave)

use super::{MemberFilter, none_when_missing};
use atlas_core::producer::Producer;
use atlas_messengers::MessengerProcessor;
use atlas_messengers::rest::{CreateRequest, MemberRequest, RestModel, transform};
use atlas_web::{TenantContext, WebResult};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
struct MessengerApi {
    processor: MessengerProcessor,
    producer: Arc<dyn Producer>,
}

/// Messenger routes over `processor`, emitting through `producer`.
pub fn router(processor: MessengerProcessor, producer: Arc<dyn Producer>) -> Router {
    Router::new()
        .route("/messengers", get(list).post(create))
        .route("/messengers/:messenger_id", get(by_id))
        .route("/messengers/:messenger_id/members", post(join))
        .route("/messengers/:messenger_id/members/:character_id", delete(leave))
        .with_state(MessengerApi { processor, producer })
}

async fn list(
    State(api): State<MessengerApi>,
    TenantContext(ctx): TenantContext,
    Query(filter): Query<MemberFilter>,
) -> WebResult<Json<Vec<RestModel>>> {
    let messengers = match filter.member_id {
        Some(character_id) => none_when_missing(api.processor.get_by_member(&ctx, character_id).await)?
            .into_iter()
            .collect(),
        None => api.processor.get_all(&ctx).await?,
    };
    Ok(Json(messengers.iter().map(transform).collect()))
}

async fn by_id(
    State(api): State<MessengerApi>,
    TenantContext(ctx): TenantContext,
    Path(messenger_id): Path<u32>,
) -> WebResult<Json<RestModel>> {
    let messenger = api.processor.get_by_id(&ctx, messenger_id).await?;
    Ok(Json(transform(&messenger)))
}

async fn create(
    State(api): State<MessengerApi>,
    TenantContext(ctx): TenantContext,
    Json(request): Json<CreateRequest>,
) -> WebResult<(StatusCode, Json<RestModel>)> {
    let messenger = api
        .processor
        .create_and_emit(api.producer.as_ref(), &ctx, Uuid::new_v4(), request.world_id, request.character_id)
        .await?;
    Ok((StatusCode::CREATED, Json(transform(&messenger))))
}

async fn join(
    State(api): State<MessengerApi>,
    TenantContext(ctx): TenantContext,
    Path(messenger_id): Path<u32>,
    Json(request): Json<MemberRequest>,
) -> WebResult<Json<RestModel>> {
    let messenger = api
        .processor
        .join_and_emit(
            api.producer.as_ref(),
            &ctx,
            Uuid::new_v4(),
            request.world_id,
            messenger_id,
            request.character_id,
        )
        .await?;
    Ok(Json(transform(&messenger)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorldQuery {
    #[serde(default)]
    world_id: u8,
}

async fn leave(
    State(api): State<MessengerApi>,
    TenantContext(ctx): TenantContext,
    Path((messenger_id, character_id)): Path<(u32, u32)>,
    Query(query): Query<WorldQuery>,
) -> WebResult<Json<RestModel>> {
    let messenger = api
        .processor
        .leave_and_emit(api.producer.as_ref(), &ctx, Uuid::new_v4(), query.world_id, messenger_id, character_id)
        .await?;
    Ok(Json(transform(&messenger)))
}
