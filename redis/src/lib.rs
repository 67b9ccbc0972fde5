//! Redis registry backend.
//!
//! State that must survive restarts (parties, messengers) lives in Redis.
//!
//! # Key layout
//!
//! - `atlas:<ns>:<tenantKey>:<id>` → JSON entity
//! - `atlas:<ns>:<tenantKey>:_keys` (Set) → primary keys of the tenant
//! - `atlas:<ns>:<tenantKey>:idx:<index>:<foreign>` (Set) → primary keys
//! - `atlas:<ns>:id-gen:<tenantKey>` → `INCR` counter
//! - `atlas:<ns>:_tenants` (Set) → tenant keys that have written
//!
//! Single writes rely on command atomicity; the entry and its key-set
//! membership are written in one `MULTI` pipeline. Read-modify-write across
//! processes is last-writer-wins.
//!
//! # Example
//!
//! ```no_run
//! use atlas_redis::RedisBackend;
//!
//! # async fn example() -> atlas_core::Result<()> {
//! let backend = RedisBackend::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

use atlas_core::Tenant;
use atlas_core::error::{Error, Result};
use atlas_core::registry::{BackendFuture, RegistryBackend, sort_keys};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};

/// Registry backend over a Redis connection manager.
#[derive(Clone)]
pub struct RedisBackend {
    conn_manager: ConnectionManager,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend").finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Connect to `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Downstream`] if the client cannot be created or the
    /// first connection fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| Error::downstream("redis", format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            Error::downstream("redis", format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::info!("Connected registry backend to Redis");
        Ok(Self { conn_manager })
    }

    /// Backend over an existing connection manager.
    #[must_use]
    pub const fn from_manager(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    fn entry_key(ns: &str, tenant: &Tenant, id: &str) -> String {
        format!("atlas:{ns}:{}:{id}", tenant.key())
    }

    fn keys_key(ns: &str, tenant: &Tenant) -> String {
        format!("atlas:{ns}:{}:_keys", tenant.key())
    }

    fn index_key(ns: &str, tenant: &Tenant, index: &str, foreign: &str) -> String {
        format!("atlas:{ns}:{}:idx:{index}:{foreign}", tenant.key())
    }

    fn counter_key(ns: &str, tenant: &Tenant) -> String {
        format!("atlas:{ns}:id-gen:{}", tenant.key())
    }

    fn tenants_key(ns: &str) -> String {
        format!("atlas:{ns}:_tenants")
    }
}

fn downstream(e: &RedisError) -> Error {
    Error::downstream("redis", e)
}

impl RegistryBackend for RedisBackend {
    fn get<'a>(&'a self, ns: &'a str, tenant: &'a Tenant, id: &'a str) -> BackendFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            conn.get::<_, Option<Vec<u8>>>(Self::entry_key(ns, tenant, id))
                .await
                .map_err(|e| downstream(&e))
        })
    }

    fn put<'a>(&'a self, ns: &'a str, tenant: &'a Tenant, id: &'a str, value: Vec<u8>) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let _: () = redis::pipe()
                .atomic()
                .set(Self::entry_key(ns, tenant, id), value)
                .ignore()
                .sadd(Self::keys_key(ns, tenant), id)
                .ignore()
                .sadd(Self::tenants_key(ns), tenant.key())
                .ignore()
                .query_async(&mut conn)
                .await
                .map_err(|e| downstream(&e))?;
            Ok(())
        })
    }

    fn remove<'a>(&'a self, ns: &'a str, tenant: &'a Tenant, id: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let _: () = redis::pipe()
                .atomic()
                .del(Self::entry_key(ns, tenant, id))
                .ignore()
                .srem(Self::keys_key(ns, tenant), id)
                .ignore()
                .query_async(&mut conn)
                .await
                .map_err(|e| downstream(&e))?;
            Ok(())
        })
    }

    fn values<'a>(&'a self, ns: &'a str, tenant: &'a Tenant) -> BackendFuture<'a, Vec<Vec<u8>>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let mut ids: Vec<String> = conn
                .smembers(Self::keys_key(ns, tenant))
                .await
                .map_err(|e| downstream(&e))?;
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            sort_keys(&mut ids);

            let keys: Vec<String> = ids.iter().map(|id| Self::entry_key(ns, tenant, id)).collect();
            let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
                .arg(&keys)
                .query_async(&mut conn)
                .await
                .map_err(|e| downstream(&e))?;

            // key-set members whose entry vanished between the two reads are skipped
            Ok(values.into_iter().flatten().collect())
        })
    }

    fn next_id<'a>(&'a self, ns: &'a str, tenant: &'a Tenant) -> BackendFuture<'a, u64> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            conn.incr::<_, _, u64>(Self::counter_key(ns, tenant), 1_u64)
                .await
                .map_err(|e| downstream(&e))
        })
    }

    fn index_add<'a>(
        &'a self,
        ns: &'a str,
        tenant: &'a Tenant,
        index: &'a str,
        foreign: &'a str,
        id: &'a str,
    ) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let _: () = conn
                .sadd(Self::index_key(ns, tenant, index, foreign), id)
                .await
                .map_err(|e| downstream(&e))?;
            Ok(())
        })
    }

    fn index_remove<'a>(
        &'a self,
        ns: &'a str,
        tenant: &'a Tenant,
        index: &'a str,
        foreign: &'a str,
        id: &'a str,
    ) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let _: () = conn
                .srem(Self::index_key(ns, tenant, index, foreign), id)
                .await
                .map_err(|e| downstream(&e))?;
            Ok(())
        })
    }

    fn index_members<'a>(
        &'a self,
        ns: &'a str,
        tenant: &'a Tenant,
        index: &'a str,
        foreign: &'a str,
    ) -> BackendFuture<'a, Vec<String>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let mut members: Vec<String> = conn
                .smembers(Self::index_key(ns, tenant, index, foreign))
                .await
                .map_err(|e| downstream(&e))?;
            sort_keys(&mut members);
            Ok(members)
        })
    }

    fn tenants<'a>(&'a self, ns: &'a str) -> BackendFuture<'a, Vec<Tenant>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let keys: Vec<String> = conn
                .smembers(Self::tenants_key(ns))
                .await
                .map_err(|e| downstream(&e))?;
            Ok(keys
                .iter()
                .filter_map(|k| match k.parse::<Tenant>() {
                    Ok(t) => Some(t),
                    Err(e) => {
                        tracing::warn!(namespace = ns, key = %k, error = %e, "skipping malformed tenant key");
                        None
                    }
                })
                .collect())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use atlas_core::registry::TenantRegistry;
    use atlas_testing::test_context;
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Room {
        id: u32,
        members: Vec<u32>,
    }

    async fn backend() -> RedisBackend {
        RedisBackend::new("redis://127.0.0.1:6379").await.unwrap()
    }

    #[test]
    fn key_layout() {
        let tenant = atlas_testing::test_tenant();
        let t = tenant.key();
        assert_eq!(RedisBackend::entry_key("party", &tenant, "7"), format!("atlas:party:{t}:7"));
        assert_eq!(RedisBackend::counter_key("party", &tenant), format!("atlas:party:id-gen:{t}"));
        assert_eq!(
            RedisBackend::index_key("party", &tenant, "character", "3"),
            format!("atlas:party:{t}:idx:character:3")
        );
        assert_eq!(RedisBackend::tenants_key("party"), "atlas:party:_tenants");
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn registry_round_trip_and_isolation() {
        let registry: TenantRegistry<u32, Room> = TenantRegistry::builder(Arc::new(backend().await), "room-test")
            .id_base(1_000_000_000)
            .index("member", |r: &Room| r.members.iter().map(u32::to_string).collect())
            .build();
        let (a, b) = (test_context(), test_context());

        let room = registry.create(&a, |id| Room { id, members: vec![1, 2] }).await.unwrap();
        assert_eq!(room.id, 1_000_000_000);
        assert_eq!(registry.get(&a, &room.id).await.unwrap(), room);
        assert_eq!(registry.lookup(&a, "member", 2).await.unwrap(), room.id);

        assert!(registry.get(&b, &room.id).await.is_err());
        assert!(registry.get_all(&b).await.unwrap().is_empty());
        assert!(registry.lookup(&b, "member", 2).await.is_err());

        registry.remove(&a, &room.id).await.unwrap();
        assert!(registry.lookup_all(&a, "member", 1).await.unwrap().is_empty());
        assert!(registry.get_all(&a).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn counter_survives_new_connections() {
        let ctx = test_context();
        let first = backend().await.next_id("room-test", ctx.tenant()).await.unwrap();
        let second = backend().await.next_id("room-test", ctx.tenant()).await.unwrap();
        assert!(second > first);
    }
}
