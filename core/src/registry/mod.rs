//! Tenant-keyed registries.
//!
//! A [`TenantRegistry`] is a typed, tenant-scoped key/value store with
//! optional secondary indexes and monotonic id allocation. Storage is
//! delegated to a byte-level [`RegistryBackend`]: [`MemoryBackend`] for
//! ephemeral state and the Redis backend (in `atlas-redis`) for state that
//! must survive restarts.
//!
//! Writers to one tenant are serialized by an in-process lock owned by the
//! registry. Backends only need single-command atomicity.
//!
//! ```rust,ignore
//! let parties: TenantRegistry<u32, Party> = TenantRegistry::builder(backend, "party")
//!     .id_base(1_000_000_000)
//!     .index("character", |p: &Party| p.members().iter().map(u32::to_string).collect())
//!     .invariant(|p: &Party| p.check_capacity())
//!     .build();
//!
//! let party = parties.create(&ctx, |id| Party::new(id, world, leader)).await?;
//! let party_id = parties.lookup(&ctx, "character", leader).await?;
//! ```

mod id;
mod memory;

pub use id::allocate;
pub use memory::MemoryBackend;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::tenant::Tenant;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Boxed future returned by backend operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Byte-level storage under a registry.
///
/// Every call is scoped by namespace and tenant. Implementations must never
/// return data written under a different tenant.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures so registries can hold `Arc<dyn RegistryBackend>`.
pub trait RegistryBackend: Send + Sync {
    /// Read one entry.
    fn get<'a>(&'a self, ns: &'a str, tenant: &'a Tenant, id: &'a str)
    -> BackendFuture<'a, Option<Vec<u8>>>;

    /// Write one entry and record the tenant as active in `ns`.
    fn put<'a>(
        &'a self,
        ns: &'a str,
        tenant: &'a Tenant,
        id: &'a str,
        value: Vec<u8>,
    ) -> BackendFuture<'a, ()>;

    /// Delete one entry. Missing entries are not an error.
    fn remove<'a>(&'a self, ns: &'a str, tenant: &'a Tenant, id: &'a str) -> BackendFuture<'a, ()>;

    /// Every entry of the tenant.
    fn values<'a>(&'a self, ns: &'a str, tenant: &'a Tenant) -> BackendFuture<'a, Vec<Vec<u8>>>;

    /// Advance the tenant's counter and return the new value (first call
    /// returns 1).
    fn next_id<'a>(&'a self, ns: &'a str, tenant: &'a Tenant) -> BackendFuture<'a, u64>;

    /// Add `id` under `index`/`foreign`.
    fn index_add<'a>(
        &'a self,
        ns: &'a str,
        tenant: &'a Tenant,
        index: &'a str,
        foreign: &'a str,
        id: &'a str,
    ) -> BackendFuture<'a, ()>;

    /// Remove `id` from `index`/`foreign`.
    fn index_remove<'a>(
        &'a self,
        ns: &'a str,
        tenant: &'a Tenant,
        index: &'a str,
        foreign: &'a str,
        id: &'a str,
    ) -> BackendFuture<'a, ()>;

    /// Primary keys listed under `index`/`foreign`, ordered by [`sort_keys`].
    fn index_members<'a>(
        &'a self,
        ns: &'a str,
        tenant: &'a Tenant,
        index: &'a str,
        foreign: &'a str,
    ) -> BackendFuture<'a, Vec<String>>;

    /// Tenants that have written to `ns`.
    fn tenants<'a>(&'a self, ns: &'a str) -> BackendFuture<'a, Vec<Tenant>>;
}

/// Derives the foreign keys an entity is listed under.
pub type IndexFn<V> = Arc<dyn Fn(&V) -> Vec<String> + Send + Sync>;

/// Registry-level invariant checked before every write.
pub type InvariantFn<V> = Arc<dyn Fn(&V) -> Result<()> + Send + Sync>;

/// A pure transformation applied by [`TenantRegistry::update`].
pub type Transformer<V> = Box<dyn FnOnce(V) -> V + Send>;

type WriterLocks = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// Builder for [`TenantRegistry`].
#[must_use]
pub struct RegistryBuilder<K, V> {
    backend: Arc<dyn RegistryBackend>,
    namespace: &'static str,
    id_base: u32,
    indexes: Vec<(&'static str, IndexFn<V>)>,
    invariants: Vec<InvariantFn<V>>,
    _key: PhantomData<fn() -> K>,
}

impl<K, V> RegistryBuilder<K, V> {
    /// First id handed out by [`TenantRegistry::create`]. Defaults to 1.
    pub const fn id_base(mut self, base: u32) -> Self {
        self.id_base = base;
        self
    }

    /// Register a secondary index.
    pub fn index<F>(mut self, name: &'static str, keys: F) -> Self
    where
        F: Fn(&V) -> Vec<String> + Send + Sync + 'static,
    {
        self.indexes.push((name, Arc::new(keys)));
        self
    }

    /// Register an invariant.
    pub fn invariant<F>(mut self, check: F) -> Self
    where
        F: Fn(&V) -> Result<()> + Send + Sync + 'static,
    {
        self.invariants.push(Arc::new(check));
        self
    }

    /// Finish the registry.
    pub fn build(self) -> TenantRegistry<K, V> {
        TenantRegistry {
            backend: self.backend,
            namespace: self.namespace,
            id_base: self.id_base,
            indexes: Arc::new(self.indexes),
            invariants: Arc::new(self.invariants),
            writers: Arc::default(),
            _key: PhantomData,
        }
    }
}

/// Typed, tenant-scoped store.
///
/// Getters return owned snapshots; mutating one never affects stored state.
pub struct TenantRegistry<K, V> {
    backend: Arc<dyn RegistryBackend>,
    namespace: &'static str,
    id_base: u32,
    indexes: Arc<Vec<(&'static str, IndexFn<V>)>>,
    invariants: Arc<Vec<InvariantFn<V>>>,
    writers: WriterLocks,
    _key: PhantomData<fn() -> K>,
}

impl<K, V> Clone for TenantRegistry<K, V> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            namespace: self.namespace,
            id_base: self.id_base,
            indexes: Arc::clone(&self.indexes),
            invariants: Arc::clone(&self.invariants),
            writers: Arc::clone(&self.writers),
            _key: PhantomData,
        }
    }
}

impl<K, V> std::fmt::Debug for TenantRegistry<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantRegistry")
            .field("namespace", &self.namespace)
            .field("id_base", &self.id_base)
            .field("indexes", &self.indexes.iter().map(|(n, _)| *n).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<K, V> TenantRegistry<K, V>
where
    K: Display + FromStr + Clone + Send + Sync,
    V: Serialize + DeserializeOwned + Send + Sync,
{
    /// Start building a registry for `namespace`.
    pub fn builder(backend: Arc<dyn RegistryBackend>, namespace: &'static str) -> RegistryBuilder<K, V> {
        RegistryBuilder {
            backend,
            namespace,
            id_base: 1,
            indexes: Vec::new(),
            invariants: Vec::new(),
            _key: PhantomData,
        }
    }

    /// Namespace constant.
    #[must_use]
    pub const fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// Allocate an id, build the entity from `seed` and store it.
    ///
    /// # Errors
    ///
    /// Invariant failures from the seeded value, id exhaustion, backend
    /// failures or cancellation.
    pub async fn create<F>(&self, ctx: &Context, seed: F) -> Result<V>
    where
        K: From<u32>,
        F: FnOnce(K) -> V + Send,
    {
        self.record("create");
        ctx.run(async {
            let _guard = self.writer(ctx.tenant()).await?;
            let counter = self.backend.next_id(self.namespace, ctx.tenant()).await?;
            let id = K::from(allocate(self.id_base, counter)?);
            let value = seed(id.clone());
            self.validate(&value)?;
            self.write(ctx.tenant(), &id, None, &value).await?;
            tracing::debug!(namespace = self.namespace, id = %id, "registry entry created");
            Ok(value)
        })
        .await
    }

    /// Entry by primary key.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the caller's tenant has no such entry.
    pub async fn get(&self, ctx: &Context, id: &K) -> Result<V> {
        self.find(ctx, id)
            .await?
            .ok_or_else(|| Error::not_found(self.namespace, id))
    }

    /// Entry by primary key, if present.
    ///
    /// # Errors
    ///
    /// Backend failures or cancellation.
    pub async fn find(&self, ctx: &Context, id: &K) -> Result<Option<V>> {
        self.record("get");
        ctx.run(self.read(ctx.tenant(), id)).await
    }

    /// Every entry of the caller's tenant.
    ///
    /// # Errors
    ///
    /// Backend failures or cancellation.
    pub async fn get_all(&self, ctx: &Context) -> Result<Vec<V>> {
        self.record("get_all");
        ctx.run(async {
            let raw = self.backend.values(self.namespace, ctx.tenant()).await?;
            raw.iter()
                .map(|bytes| serde_json::from_slice(bytes).map_err(Error::from))
                .collect()
        })
        .await
    }

    /// Upsert.
    ///
    /// # Errors
    ///
    /// Invariant failures, backend failures or cancellation.
    pub async fn put(&self, ctx: &Context, id: &K, value: V) -> Result<V> {
        self.record("put");
        ctx.run(async {
            self.validate(&value)?;
            let _guard = self.writer(ctx.tenant()).await?;
            let old = self.read(ctx.tenant(), id).await?;
            self.write(ctx.tenant(), id, old.as_ref(), &value).await?;
            Ok(value)
        })
        .await
    }

    /// Apply `transformers` in order, validate and write back.
    ///
    /// On invariant violation nothing is written.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], the violated invariant's error, backend failures
    /// or cancellation.
    pub async fn update(&self, ctx: &Context, id: &K, transformers: Vec<Transformer<V>>) -> Result<V> {
        self.try_update(ctx, id, move |value| {
            Ok(transformers.into_iter().fold(value, |v, t| t(v)))
        })
        .await
    }

    /// Like [`update`](Self::update) with a fallible transformer.
    ///
    /// A transformer error aborts the write and is returned as-is.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], the transformer's error, invariant violations,
    /// backend failures or cancellation.
    pub async fn try_update<F>(&self, ctx: &Context, id: &K, transform: F) -> Result<V>
    where
        F: FnOnce(V) -> Result<V> + Send,
    {
        self.record("update");
        ctx.run(async {
            let _guard = self.writer(ctx.tenant()).await?;
            let current = self
                .read(ctx.tenant(), id)
                .await?
                .ok_or_else(|| Error::not_found(self.namespace, id))?;
            let old_keys = self.index_keys(&current);
            let next = transform(current)?;
            self.validate(&next)?;
            self.write_with_keys(ctx.tenant(), id, old_keys, &next).await?;
            Ok(next)
        })
        .await
    }

    /// Read-modify-write that also covers the absent case, under one writer
    /// lock. `transform` receives `None` when nothing is stored yet.
    ///
    /// # Errors
    ///
    /// The transformer's error, invariant violations, backend failures or
    /// cancellation.
    pub async fn upsert<F>(&self, ctx: &Context, id: &K, transform: F) -> Result<V>
    where
        F: FnOnce(Option<V>) -> Result<V> + Send,
    {
        self.record("upsert");
        ctx.run(async {
            let _guard = self.writer(ctx.tenant()).await?;
            let current = self.read(ctx.tenant(), id).await?;
            let old_keys = current.as_ref().map(|v| self.index_keys(v)).unwrap_or_default();
            let next = transform(current)?;
            self.validate(&next)?;
            self.write_with_keys(ctx.tenant(), id, old_keys, &next).await?;
            Ok(next)
        })
        .await
    }

    /// Idempotent delete. Returns the removed entry.
    ///
    /// # Errors
    ///
    /// Backend failures or cancellation.
    pub async fn remove(&self, ctx: &Context, id: &K) -> Result<Option<V>> {
        self.record("remove");
        ctx.run(async {
            let _guard = self.writer(ctx.tenant()).await?;
            let Some(current) = self.read(ctx.tenant(), id).await? else {
                return Ok(None);
            };
            let key = id.to_string();
            self.backend.remove(self.namespace, ctx.tenant(), &key).await?;
            for (index, foreign) in self.index_keys(&current) {
                self.backend
                    .index_remove(self.namespace, ctx.tenant(), index, &foreign, &key)
                    .await?;
            }
            tracing::debug!(namespace = self.namespace, id = %id, "registry entry removed");
            Ok(Some(current))
        })
        .await
    }

    /// The single primary key under `index`/`foreign`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if nothing is indexed there.
    pub async fn lookup(&self, ctx: &Context, index: &str, foreign: impl Display + Send) -> Result<K> {
        let foreign = foreign.to_string();
        self.lookup_all(ctx, index, &foreign)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(self.namespace, format!("{index}={foreign}")))
    }

    /// Every primary key under `index`/`foreign`.
    ///
    /// # Errors
    ///
    /// Backend failures or cancellation.
    pub async fn lookup_all(&self, ctx: &Context, index: &str, foreign: impl Display + Send) -> Result<Vec<K>> {
        self.record("lookup");
        let foreign = foreign.to_string();
        ctx.run(async {
            let members = self
                .backend
                .index_members(self.namespace, ctx.tenant(), index, &foreign)
                .await?;
            members.iter().map(|m| parse_key(m)).collect()
        })
        .await
    }

    /// Tenants that have written to this namespace.
    ///
    /// # Errors
    ///
    /// Backend failures.
    pub async fn tenants(&self) -> Result<Vec<Tenant>> {
        self.backend.tenants(self.namespace).await
    }

    async fn read(&self, tenant: &Tenant, id: &K) -> Result<Option<V>> {
        let key = id.to_string();
        match self.backend.get(self.namespace, tenant, &key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn write(&self, tenant: &Tenant, id: &K, old: Option<&V>, new: &V) -> Result<()> {
        let old_keys = old.map(|v| self.index_keys(v)).unwrap_or_default();
        self.write_with_keys(tenant, id, old_keys, new).await
    }

    async fn write_with_keys(
        &self,
        tenant: &Tenant,
        id: &K,
        old_keys: BTreeSet<(&'static str, String)>,
        new: &V,
    ) -> Result<()> {
        let key = id.to_string();
        let bytes = serde_json::to_vec(new)?;
        self.backend.put(self.namespace, tenant, &key, bytes).await?;

        let new_keys = self.index_keys(new);
        for (index, foreign) in old_keys.difference(&new_keys) {
            self.backend
                .index_remove(self.namespace, tenant, index, foreign, &key)
                .await?;
        }
        for (index, foreign) in new_keys.difference(&old_keys) {
            self.backend
                .index_add(self.namespace, tenant, index, foreign, &key)
                .await?;
        }
        Ok(())
    }

    fn index_keys(&self, value: &V) -> BTreeSet<(&'static str, String)> {
        self.indexes
            .iter()
            .flat_map(|(name, keys)| keys(value).into_iter().map(move |k| (*name, k)))
            .collect()
    }

    fn validate(&self, value: &V) -> Result<()> {
        self.invariants.iter().try_for_each(|check| check(value))
    }

    async fn writer(&self, tenant: &Tenant) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut writers = self
                .writers
                .lock()
                .map_err(|_| Error::Unexpected("registry writer table poisoned".into()))?;
            Arc::clone(writers.entry(tenant.key()).or_default())
        };
        Ok(lock.lock_owned().await)
    }

    fn record(&self, op: &'static str) {
        metrics::counter!("atlas_registry_ops_total", "namespace" => self.namespace, "op" => op)
            .increment(1);
    }
}

/// Order primary keys numerically when they are numbers.
///
/// Shorter keys sort first, so decimal ids compare by value.
pub fn sort_keys(keys: &mut [String]) {
    keys.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
}

fn parse_key<K: FromStr>(raw: &str) -> Result<K> {
    raw.parse()
        .map_err(|_| Error::Unexpected(format!("malformed registry key '{raw}'")))
}
