//! Buff routes.
//!
//! - `GET /characters/:characterId/buffs`

use atlas_buffs::BuffProcessor;
use atlas_buffs::rest::{RestModel, transform};
use atlas_web::{TenantContext, WebResult};
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

/// Buff routes over `processor`.
pub fn router(processor: BuffProcessor) -> Router {
    Router::new()
        .route("/characters/:character_id/buffs", get(by_character))
        .with_state(processor)
}

async fn by_character(
    State(processor): State<BuffProcessor>,
    TenantContext(ctx): TenantContext,
    Path(character_id): Path<u32>,
) -> WebResult<Json<RestModel>> {
    let character = processor.get(&ctx, character_id).await?;
    Ok(Json(transform(&character)))
}
