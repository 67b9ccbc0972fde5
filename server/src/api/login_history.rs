//! Login history routes.
//!
//! - `GET /login-history[?accountId= | ?ip= | ?hwid=]`

use atlas_login_history::LoginHistoryProcessor;
use atlas_login_history::rest::{HistoryQuery, RestModel, transform};
use atlas_web::{TenantContext, WebResult};
use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

/// Login history routes over `processor`.
pub fn router(processor: LoginHistoryProcessor) -> Router {
    Router::new()
        .route("/login-history", get(search))
        .with_state(processor)
}

async fn search(
    State(processor): State<LoginHistoryProcessor>,
    TenantContext(ctx): TenantContext,
    Query(query): Query<HistoryQuery>,
) -> WebResult<Json<Vec<RestModel>>> {
    let entries = match query {
        HistoryQuery {
            account_id: Some(account_id),
            ..
        } => processor.get_by_account(&ctx, account_id).await?,
        HistoryQuery { ip: Some(ip), .. } => processor.get_by_ip(&ctx, &ip).await?,
        HistoryQuery { hwid: Some(hwid), .. } => processor.get_by_hwid(&ctx, &hwid).await?,
        HistoryQuery { .. } => processor.get_by_tenant(&ctx).await?,
    };
    Ok(Json(entries.iter().map(transform).collect()))
}
