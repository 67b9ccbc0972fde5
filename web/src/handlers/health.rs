//! Liveness endpoint.

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

/// Body of `GET /health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Health {
    /// Always `ok` while the process serves requests
    pub status: &'static str,
}

/// `GET /health`. Does not check Postgres, Redis or Kafka.
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<Health>) {
    (StatusCode::OK, Json(Health { status: "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let (status, Json(body)) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
    }
}
