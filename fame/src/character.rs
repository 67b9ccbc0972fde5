//! Character lookups against the character service.

use atlas_core::envelope::rest::tenant_headers;
use atlas_core::{Context, Error, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;
use uuid::Uuid;

/// The parts of a character fame validation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterInfo {
    /// Character id
    pub id: u32,
    /// Display name
    pub name: String,
    /// Level
    pub level: u8,
}

/// Future returned by [`CharacterDirectory::find`].
pub type DirectoryFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<CharacterInfo>>> + Send + 'a>>;

/// Source of character data.
pub trait CharacterDirectory: Send + Sync {
    /// Character `id` in the caller's tenant, `None` if it does not exist.
    fn find<'a>(&'a self, ctx: &'a Context, id: u32) -> DirectoryFuture<'a>;
}

#[derive(Deserialize)]
struct Document {
    data: Resource,
}

#[derive(Deserialize)]
struct Resource {
    id: String,
    attributes: Attributes,
}

#[derive(Deserialize)]
struct Attributes {
    name: String,
    level: u8,
}

/// [`CharacterDirectory`] over the character service's JSON:API resource.
#[derive(Debug, Clone)]
pub struct HttpCharacterDirectory {
    client: Client,
    base_url: String,
}

impl HttpCharacterDirectory {
    /// Directory reading from `base_url` (e.g. `http://character:8080/api`).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, ctx: &Context, id: u32) -> Result<Option<CharacterInfo>> {
        let mut request = self.client.get(format!("{}/characters/{id}", self.base_url));
        for (name, value) in tenant_headers(ctx) {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::downstream("character", e))?;

        match response.status() {
            StatusCode::OK => {
                let document: Document = response
                    .json()
                    .await
                    .map_err(|e| Error::downstream("character", e))?;
                let id = document
                    .data
                    .id
                    .parse()
                    .map_err(|_| Error::downstream("character", format!("bad id {}", document.data.id)))?;
                Ok(Some(CharacterInfo {
                    id,
                    name: document.data.attributes.name,
                    level: document.data.attributes.level,
                }))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(Error::downstream("character", format!("unexpected status {status}"))),
        }
    }
}

impl CharacterDirectory for HttpCharacterDirectory {
    fn find<'a>(&'a self, ctx: &'a Context, id: u32) -> DirectoryFuture<'a> {
        Box::pin(self.fetch(ctx, id))
    }
}

/// In-memory [`CharacterDirectory`], scoped by tenant id.
#[derive(Debug, Default)]
pub struct MemoryCharacterDirectory {
    characters: RwLock<HashMap<(Uuid, u32), CharacterInfo>>,
}

impl MemoryCharacterDirectory {
    /// Empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `character` for the tenant of `ctx`.
    ///
    /// # Errors
    ///
    /// [`Error::Unexpected`] if the lock is poisoned.
    pub fn insert(&self, ctx: &Context, character: CharacterInfo) -> Result<()> {
        self.characters
            .write()
            .map_err(|_| Error::Unexpected("character directory poisoned".into()))?
            .insert((ctx.tenant().id(), character.id), character);
        Ok(())
    }
}

impl CharacterDirectory for MemoryCharacterDirectory {
    fn find<'a>(&'a self, ctx: &'a Context, id: u32) -> DirectoryFuture<'a> {
        let found = self
            .characters
            .read()
            .map_err(|_| Error::Unexpected("character directory poisoned".into()))
            .map(|characters| characters.get(&(ctx.tenant().id(), id)).cloned());
        Box::pin(async move { found })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use atlas_testing::test_context;

    #[tokio::test]
    async fn memory_directory_is_tenant_scoped() {
        let directory = MemoryCharacterDirectory::new();
        let (a, b) = (test_context(), test_context());
        directory
            .insert(&a, CharacterInfo { id: 1, name: "Atlas".into(), level: 30 })
            .unwrap();

        assert_eq!(directory.find(&a, 1).await.unwrap().unwrap().level, 30);
        assert!(directory.find(&b, 1).await.unwrap().is_none());
    }

    #[test]
    fn parses_json_api_document() {
        let document: Document = serde_json::from_value(serde_json::json!({
            "data": {"type": "characters", "id": "100", "attributes": {"name": "Giver", "level": 20, "fame": 3}}
        }))
        .unwrap();
        assert_eq!(document.data.id, "100");
        assert_eq!(document.data.attributes.level, 20);
    }
}
