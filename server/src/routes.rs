//! Router assembly.

use crate::api;
use crate::services::Services;
use atlas_runtime::metrics::MetricsServer;
use atlas_web::correlation_id_layer;
use atlas_web::handlers::health_check;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Public router: `/health` plus every domain under `/api`.
pub fn build_router(services: Services) -> Router {
    let Services {
        producer,
        parties,
        messengers,
        buffs,
        fame,
        cash_assets,
        wallets,
        login_history,
    } = services;

    let api_routes = Router::new()
        .merge(api::parties::router(parties, producer.clone()))
        .merge(api::messengers::router(messengers, producer.clone()))
        .merge(api::buffs::router(buffs))
        .merge(api::fame::router(fame, producer.clone()))
        .merge(api::cashshop::router(cash_assets, producer.clone()))
        .merge(api::cashshop::wallet_router(wallets, producer))
        .merge(api::login_history::router(login_history));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
}

/// Scrape router serving `/metrics`.
pub fn metrics_router(metrics: Arc<MetricsServer>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics)
}

async fn render_metrics(State(metrics): State<Arc<MetricsServer>>) -> (StatusCode, String) {
    match metrics.render() {
        Some(body) => (StatusCode::OK, body),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed".to_string()),
    }
}
