//! Commodity periods from the data service.

use atlas_core::envelope::rest::tenant_headers;
use atlas_core::{Context, Error, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;
use uuid::Uuid;

/// Future returned by [`CommodityCatalog::period`].
pub type CatalogFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<u32>>> + Send + 'a>>;

/// Source of commodity periods.
pub trait CommodityCatalog: Send + Sync {
    /// Period in days of commodity `id`, `None` if it does not exist.
    fn period<'a>(&'a self, ctx: &'a Context, id: u32) -> CatalogFuture<'a>;
}

#[derive(Deserialize)]
struct Document {
    data: Resource,
}

#[derive(Deserialize)]
struct Resource {
    attributes: Attributes,
}

#[derive(Deserialize)]
struct Attributes {
    period: u32,
}

/// [`CommodityCatalog`] over `GET {base}/data/commodities/{id}`.
#[derive(Debug, Clone)]
pub struct HttpCommodityCatalog {
    client: Client,
    base_url: String,
}

impl HttpCommodityCatalog {
    /// Catalog reading from `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, ctx: &Context, id: u32) -> Result<Option<u32>> {
        let mut request = self.client.get(format!("{}/data/commodities/{id}", self.base_url));
        for (name, value) in tenant_headers(ctx) {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::downstream("commodity", e))?;

        match response.status() {
            StatusCode::OK => {
                let document: Document = response
                    .json()
                    .await
                    .map_err(|e| Error::downstream("commodity", e))?;
                Ok(Some(document.data.attributes.period))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(Error::downstream("commodity", format!("unexpected status {status}"))),
        }
    }
}

impl CommodityCatalog for HttpCommodityCatalog {
    fn period<'a>(&'a self, ctx: &'a Context, id: u32) -> CatalogFuture<'a> {
        Box::pin(self.fetch(ctx, id))
    }
}

/// In-memory [`CommodityCatalog`], scoped by tenant id.
#[derive(Debug, Default)]
pub struct MemoryCommodityCatalog {
    periods: RwLock<HashMap<(Uuid, u32), u32>>,
}

impl MemoryCommodityCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register commodity `id` with `period` days for the tenant of `ctx`.
    ///
    /// # Errors
    ///
    /// [`Error::Unexpected`] if the lock is poisoned.
    pub fn insert(&self, ctx: &Context, id: u32, period: u32) -> Result<()> {
        self.periods
            .write()
            .map_err(|_| Error::Unexpected("commodity catalog poisoned".into()))?
            .insert((ctx.tenant().id(), id), period);
        Ok(())
    }
}

impl CommodityCatalog for MemoryCommodityCatalog {
    fn period<'a>(&'a self, ctx: &'a Context, id: u32) -> CatalogFuture<'a> {
        let found = self
            .periods
            .read()
            .map_err(|_| Error::Unexpected("commodity catalog poisoned".into()))
            .map(|periods| periods.get(&(ctx.tenant().id(), id)).copied());
        Box::pin(async move { found })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use atlas_testing::test_context;

    #[tokio::test]
    async fn memory_catalog_is_tenant_scoped() {
        let catalog = MemoryCommodityCatalog::new();
        let (a, b) = (test_context(), test_context());
        catalog.insert(&a, 10_000_001, 0).unwrap();

        assert_eq!(catalog.period(&a, 10_000_001).await.unwrap(), Some(0));
        assert_eq!(catalog.period(&b, 10_000_001).await.unwrap(), None);
    }

    #[test]
    fn parses_commodity_document() {
        let document: Document = serde_json::from_value(serde_json::json!({
            "data": {"type": "commodities", "id": "10000001", "attributes": {"itemId": 5211048, "period": 1, "price": 2400}}
        }))
        .unwrap();
        assert_eq!(document.data.attributes.period, 1);
    }
}
