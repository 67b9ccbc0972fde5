//! Party routes.
//!
//! - `GET /parties[?memberId=]`
//! - `POST /parties`
//! - `GET /parties/:partyId`
//! - `PATCH /parties/:partyId` (change leader)
//! - `POST /parties/:partyId/members` (join)
//! - `DELETE /parties/:partyId/members/:characterId[?actorId=]` (leave or expel)

use super::{MemberFilter, none_when_missing};
use atlas_core::producer::Producer;
use atlas_parties::PartyProcessor;
use atlas_parties::rest::{CreateRequest, MemberRequest, RestModel, UpdateRequest, transform};
use atlas_web::{TenantContext, WebResult};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Clone)]
struct PartyApi {
    processor: PartyProcessor,
    producer: Arc<dyn Producer>,
}

/// Party routes over `processor`, emitting through `producer`.
pub fn router(processor: PartyProcessor, producer: Arc<dyn Producer>) -> Router {
    Router::new()
        .route("/parties", get(list).post(create))
        .route("/parties/:party_id", get(by_id).patch(change_leader))
        .route("/parties/:party_id/members", post(join))
        .route("/parties/:party_id/members/:character_id", delete(remove_member))
        .with_state(PartyApi { processor, producer })
}

async fn list(
    State(api): State<PartyApi>,
    TenantContext(ctx): TenantContext,
    Query(filter): Query<MemberFilter>,
) -> WebResult<Json<Vec<RestModel>>> {
    let parties = match filter.member_id {
        Some(character_id) => none_when_missing(api.processor.get_by_member(&ctx, character_id).await)?
            .into_iter()
            .collect(),
        None => api.processor.get_all(&ctx).await?,
    };
    Ok(Json(parties.iter().map(transform).collect()))
}

async fn by_id(
    State(api): State<PartyApi>,
    TenantContext(ctx): TenantContext,
    Path(party_id): Path<u32>,
) -> WebResult<Json<RestModel>> {
    let party = api.processor.get_by_id(&ctx, party_id).await?;
    Ok(Json(transform(&party)))
}

async fn create(
    State(api): State<PartyApi>,
    TenantContext(ctx): TenantContext,
    Json(request): Json<CreateRequest>,
) -> WebResult<(StatusCode, Json<RestModel>)> {
    let party = api
        .processor
        .create_and_emit(api.producer.as_ref(), &ctx, request.world_id, request.leader_id)
        .await?;
    Ok((StatusCode::CREATED, Json(transform(&party))))
}

async fn change_leader(
    State(api): State<PartyApi>,
    TenantContext(ctx): TenantContext,
    Path(party_id): Path<u32>,
    Json(request): Json<UpdateRequest>,
) -> WebResult<Json<RestModel>> {
    let party = api
        .processor
        .change_leader_and_emit(api.producer.as_ref(), &ctx, party_id, request.actor_id, request.leader_id)
        .await?;
    Ok(Json(transform(&party)))
}

async fn join(
    State(api): State<PartyApi>,
    TenantContext(ctx): TenantContext,
    Path(party_id): Path<u32>,
    Json(request): Json<MemberRequest>,
) -> WebResult<Json<RestModel>> {
    let party = api
        .processor
        .join_and_emit(api.producer.as_ref(), &ctx, party_id, request.character_id)
        .await?;
    Ok(Json(transform(&party)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActorQuery {
    actor_id: Option<u32>,
}

async fn remove_member(
    State(api): State<PartyApi>,
    TenantContext(ctx): TenantContext,
    Path((party_id, character_id)): Path<(u32, u32)>,
    Query(query): Query<ActorQuery>,
) -> WebResult<Json<RestModel>> {
    let producer = api.producer.as_ref();
    let party = match query.actor_id {
        Some(actor_id) if actor_id != character_id => {
            api.processor
                .expel_and_emit(producer, &ctx, party_id, actor_id, character_id)
                .await?
        }
        _ => {
            api.processor
                .leave_and_emit(producer, &ctx, party_id, character_id)
                .await?
        }
    };
    Ok(Json(transform(&party)))
}
