//! Request extractors.
//!
//! - [`TenantContext`]: the caller's tenant, from the tenant headers
//! - [`CorrelationId`]: the request correlation id, generated when absent

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use atlas_core::envelope::rest::{MAJOR_VERSION, MINOR_VERSION, REGION, TENANT_ID};
use atlas_core::tenant::Tenant;
use atlas_core::{Context, Error};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use uuid::Uuid;

/// Tenant-scoped context for the request.
///
/// Rejects with `400 MISSING_TENANT` when a header is absent and with
/// `422 INVALID_TENANT` when one is malformed.
///
/// ```ignore
/// async fn handler(TenantContext(ctx): TenantContext) -> WebResult<Json<Vec<RestModel>>> {
///     let parties = state.parties.get_all(&ctx).await?;
///     Ok(Json(parties.iter().map(transform).collect()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TenantContext(pub Context);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, Error> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(Error::MissingTenant)
}

fn invalid(name: &str, value: &str) -> Error {
    Error::validation("INVALID_TENANT", format!("invalid {name} header '{value}'"))
}

/// Tenant named by the request headers.
///
/// # Errors
///
/// [`Error::MissingTenant`] or `INVALID_TENANT` validation.
pub fn tenant_from_headers(headers: &HeaderMap) -> Result<Tenant, Error> {
    let id = header(headers, TENANT_ID)?;
    let region = header(headers, REGION)?;
    let major = header(headers, MAJOR_VERSION)?;
    let minor = header(headers, MINOR_VERSION)?;

    Tenant::create(
        Uuid::parse_str(id).map_err(|_| invalid(TENANT_ID, id))?,
        region,
        major.parse().map_err(|_| invalid(MAJOR_VERSION, major))?,
        minor.parse().map_err(|_| invalid(MINOR_VERSION, minor))?,
    )
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant = tenant_from_headers(&parts.headers)?;
        Ok(Self(Context::new(tenant)))
    }
}

/// Correlation id of the request.
///
/// Taken from the correlation middleware when installed, otherwise from the
/// `X-Correlation-ID` header, otherwise freshly generated.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = parts.extensions.get::<Uuid>().copied().unwrap_or_else(|| {
            parts
                .headers
                .get(CORRELATION_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| Uuid::parse_str(s).ok())
                .unwrap_or_else(Uuid::new_v4)
        });
        Ok(Self(correlation_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).expect("Valid request").into_parts().0
    }

    #[tokio::test]
    async fn builds_context_from_tenant_headers() {
        let id = Uuid::new_v4().to_string();
        let mut parts = parts(&[
            (TENANT_ID, id.as_str()),
            (REGION, "GMS"),
            (MAJOR_VERSION, "83"),
            (MINOR_VERSION, "1"),
        ]);

        let TenantContext(ctx) = TenantContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.tenant().id().to_string(), id);
        assert_eq!(ctx.tenant().region(), "GMS");
        assert_eq!(ctx.tenant().major_version(), 83);
        assert_eq!(ctx.tenant().minor_version(), 1);
    }

    #[tokio::test]
    async fn missing_header_is_a_bad_request() {
        let mut parts = parts(&[(REGION, "GMS"), (MAJOR_VERSION, "83"), (MINOR_VERSION, "1")]);
        let err = TenantContext::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "MISSING_TENANT");
    }

    #[tokio::test]
    async fn malformed_header_is_rejected() {
        let id = Uuid::new_v4().to_string();
        let mut parts = parts(&[
            (TENANT_ID, id.as_str()),
            (REGION, "GMS"),
            (MAJOR_VERSION, "eighty-three"),
            (MINOR_VERSION, "1"),
        ]);
        let err = TenantContext::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_TENANT");
    }

    #[tokio::test]
    async fn correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let mut parts = parts(&[(CORRELATION_ID_HEADER, uuid.to_string().as_str())]);
        let CorrelationId(found) = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(found, uuid);
    }

    #[tokio::test]
    async fn correlation_id_generated_when_absent() {
        let mut parts = parts(&[]);
        let CorrelationId(found) = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_ne!(found, Uuid::nil());
    }
}
