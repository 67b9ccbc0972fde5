//! Kafka envelope conventions shared by producers and consumers.
//!
//! - key: big-endian `u32` entity id, so every event about one entity lands
//!   on one partition
//! - headers: tenant identity plus a `traceparent` span
//! - value: JSON with a `type` discriminator and a `body` (defined per domain)

use crate::context::{Context, SpanContext};
use crate::error::{Error, Result};
use crate::tenant::Tenant;
use uuid::Uuid;

/// Tenant id header.
pub const TENANT_ID: &str = "tenantId";
/// Region header.
pub const REGION: &str = "region";
/// Major version header.
pub const MAJOR_VERSION: &str = "majorVersion";
/// Minor version header.
pub const MINOR_VERSION: &str = "minorVersion";
/// Span header.
pub const TRACEPARENT: &str = "traceparent";

/// Encode an entity id as a partition key.
#[must_use]
pub fn entity_key(id: u32) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

/// Decode a partition key produced by [`entity_key`].
#[must_use]
pub fn parse_entity_key(key: &[u8]) -> Option<u32> {
    <[u8; 4]>::try_from(key).ok().map(u32::from_be_bytes)
}

/// Ordered header list attached to every produced record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Empty header list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Tenant and span headers for `ctx`.
    #[must_use]
    pub fn from_context(ctx: &Context) -> Self {
        let tenant = ctx.tenant();
        Self(vec![
            (TENANT_ID.into(), tenant.id().to_string()),
            (REGION.into(), tenant.region().to_string()),
            (MAJOR_VERSION.into(), tenant.major_version().to_string()),
            (MINOR_VERSION.into(), tenant.minor_version().to_string()),
            (TRACEPARENT.into(), ctx.span().to_header()),
        ])
    }

    /// Append a header.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// First value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All headers in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Rebuild the producer's [`Context`] from consumed headers.
///
/// The consumer continues the producer's trace with a child span, or starts
/// a new trace when the header is absent or malformed.
///
/// # Errors
///
/// [`Error::MissingTenant`] if any tenant header is missing or malformed.
pub fn context_from_headers(headers: &Headers) -> Result<Context> {
    let id = headers
        .get(TENANT_ID)
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or(Error::MissingTenant)?;
    let region = headers.get(REGION).ok_or(Error::MissingTenant)?;
    let major = headers
        .get(MAJOR_VERSION)
        .and_then(|v| v.parse().ok())
        .ok_or(Error::MissingTenant)?;
    let minor = headers
        .get(MINOR_VERSION)
        .and_then(|v| v.parse().ok())
        .ok_or(Error::MissingTenant)?;
    let tenant = Tenant::create(id, region, major, minor).map_err(|_| Error::MissingTenant)?;

    let span = headers
        .get(TRACEPARENT)
        .and_then(SpanContext::parse)
        .map_or_else(SpanContext::root, |s| s.child());

    Ok(Context::new(tenant).with_span(span))
}

/// Tenant headers on REST requests between services.
pub mod rest {
    use crate::context::Context;

    /// Tenant id header.
    pub const TENANT_ID: &str = "TENANT_ID";
    /// Region header.
    pub const REGION: &str = "REGION";
    /// Major version header.
    pub const MAJOR_VERSION: &str = "MAJOR_VERSION";
    /// Minor version header.
    pub const MINOR_VERSION: &str = "MINOR_VERSION";

    /// Header pairs identifying the caller's tenant.
    #[must_use]
    pub fn tenant_headers(ctx: &Context) -> [(&'static str, String); 4] {
        let tenant = ctx.tenant();
        [
            (TENANT_ID, tenant.id().to_string()),
            (REGION, tenant.region().to_string()),
            (MAJOR_VERSION, tenant.major_version().to_string()),
            (MINOR_VERSION, tenant.minor_version().to_string()),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn key_is_big_endian() {
        assert_eq!(entity_key(1), vec![0, 0, 0, 1]);
        assert_eq!(entity_key(0x0102_0304), vec![1, 2, 3, 4]);
        assert_eq!(parse_entity_key(&entity_key(1_000_000_000)), Some(1_000_000_000));
        assert_eq!(parse_entity_key(&[1, 2]), None);
    }

    #[test]
    fn headers_rebuild_context() {
        let tenant = Tenant::create(Uuid::new_v4(), "GMS", 83, 1).unwrap();
        let ctx = Context::new(tenant.clone());
        let headers = Headers::from_context(&ctx);

        let rebuilt = context_from_headers(&headers).unwrap();
        assert_eq!(rebuilt.tenant(), &tenant);
        assert_eq!(rebuilt.span().trace_id(), ctx.span().trace_id());
    }

    #[test]
    fn missing_tenant_is_reported() {
        let mut headers = Headers::new();
        headers.insert(REGION, "GMS");
        assert_eq!(context_from_headers(&headers).unwrap_err(), Error::MissingTenant);
    }

    #[test]
    fn malformed_span_starts_new_trace() {
        let tenant = Tenant::create(Uuid::new_v4(), "GMS", 83, 1).unwrap();
        let mut headers: Headers = Headers::from_context(&Context::new(tenant))
            .iter()
            .filter(|(n, _)| *n != TRACEPARENT)
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        headers.insert(TRACEPARENT, "nonsense");
        assert!(context_from_headers(&headers).is_ok());
    }
}
