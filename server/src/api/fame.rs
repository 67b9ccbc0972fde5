//! Fame routes.
//!
//! - `GET /characters/:characterId/fame`: fame given within the last month
//! - `POST /characters/:characterId/fame`: give fame

use atlas_core::producer::Producer;
use atlas_fame::rest::{ChangeRequest, RestModel, transform};
use atlas_fame::{FameProcessor, Field};
use atlas_web::{TenantContext, WebResult};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
struct FameApi {
    processor: FameProcessor,
    producer: Arc<dyn Producer>,
}

/// Fame routes over `processor`, emitting through `producer`.
pub fn router(processor: FameProcessor, producer: Arc<dyn Producer>) -> Router {
    Router::new()
        .route("/characters/:character_id/fame", get(given).post(change))
        .with_state(FameApi { processor, producer })
}

async fn given(
    State(api): State<FameApi>,
    TenantContext(ctx): TenantContext,
    Path(character_id): Path<u32>,
) -> WebResult<Json<Vec<RestModel>>> {
    let logs = api.processor.by_character_last_month(&ctx, character_id).await?;
    Ok(Json(logs.iter().map(transform).collect()))
}

async fn change(
    State(api): State<FameApi>,
    TenantContext(ctx): TenantContext,
    Path(character_id): Path<u32>,
    Json(request): Json<ChangeRequest>,
) -> WebResult<(StatusCode, Json<RestModel>)> {
    let field = Field {
        world_id: request.world_id,
        channel_id: request.channel_id,
        map_id: 0,
    };
    let log = api
        .processor
        .request_change_and_emit(
            api.producer.as_ref(),
            &ctx,
            Uuid::new_v4(),
            field,
            character_id,
            request.target_id,
            request.amount,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(transform(&log))))
}
