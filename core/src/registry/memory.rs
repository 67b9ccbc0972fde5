//! In-process registry backend.

use super::{BackendFuture, RegistryBackend};
use crate::error::{Error, Result};
use crate::tenant::Tenant;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Slot {
    entries: BTreeMap<String, Vec<u8>>,
    indexes: HashMap<(String, String), BTreeSet<String>>,
    counter: u64,
}

type SlotKey = (String, String);

/// Registry backend held in process memory.
///
/// Each `(namespace, tenant)` pair owns an independent `RwLock`-guarded slot.
/// Locks are never held across an await point: every operation completes
/// synchronously and returns a ready future.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slots: RwLock<HashMap<SlotKey, Arc<RwLock<Slot>>>>,
    tenants: RwLock<HashMap<String, Vec<Tenant>>>,
}

impl MemoryBackend {
    /// Empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, ns: &str, tenant: &Tenant) -> Result<Option<Arc<RwLock<Slot>>>> {
        let slots = self.slots.read().map_err(|_| poisoned())?;
        Ok(slots.get(&(ns.to_string(), tenant.key())).cloned())
    }

    fn slot_or_create(&self, ns: &str, tenant: &Tenant) -> Result<Arc<RwLock<Slot>>> {
        if let Some(slot) = self.slot(ns, tenant)? {
            return Ok(slot);
        }
        let mut slots = self.slots.write().map_err(|_| poisoned())?;
        let slot = slots
            .entry((ns.to_string(), tenant.key()))
            .or_default()
            .clone();
        drop(slots);

        let mut tenants = self.tenants.write().map_err(|_| poisoned())?;
        let known = tenants.entry(ns.to_string()).or_default();
        if !known.contains(tenant) {
            known.push(tenant.clone());
        }
        Ok(slot)
    }

    fn read<T>(&self, ns: &str, tenant: &Tenant, default: T, f: impl FnOnce(&Slot) -> T) -> Result<T> {
        match self.slot(ns, tenant)? {
            Some(slot) => {
                let guard = slot.read().map_err(|_| poisoned())?;
                Ok(f(&guard))
            }
            None => Ok(default),
        }
    }

    fn write<T>(&self, ns: &str, tenant: &Tenant, f: impl FnOnce(&mut Slot) -> T) -> Result<T> {
        let slot = self.slot_or_create(ns, tenant)?;
        let mut guard = slot.write().map_err(|_| poisoned())?;
        Ok(f(&mut guard))
    }
}

fn poisoned() -> Error {
    Error::Unexpected("memory registry lock poisoned".into())
}

fn ready<'a, T: Send + 'a>(result: Result<T>) -> BackendFuture<'a, T> {
    Box::pin(std::future::ready(result))
}

impl RegistryBackend for MemoryBackend {
    fn get<'a>(&'a self, ns: &'a str, tenant: &'a Tenant, id: &'a str) -> BackendFuture<'a, Option<Vec<u8>>> {
        ready(self.read(ns, tenant, None, |slot| slot.entries.get(id).cloned()))
    }

    fn put<'a>(&'a self, ns: &'a str, tenant: &'a Tenant, id: &'a str, value: Vec<u8>) -> BackendFuture<'a, ()> {
        ready(self.write(ns, tenant, |slot| {
            slot.entries.insert(id.to_string(), value);
        }))
    }

    fn remove<'a>(&'a self, ns: &'a str, tenant: &'a Tenant, id: &'a str) -> BackendFuture<'a, ()> {
        ready(self.read(ns, tenant, false, |_| true).and_then(|exists| {
            if exists {
                self.write(ns, tenant, |slot| {
                    slot.entries.remove(id);
                })
            } else {
                Ok(())
            }
        }))
    }

    fn values<'a>(&'a self, ns: &'a str, tenant: &'a Tenant) -> BackendFuture<'a, Vec<Vec<u8>>> {
        ready(self.read(ns, tenant, Vec::new(), |slot| {
            slot.entries.values().cloned().collect()
        }))
    }

    fn next_id<'a>(&'a self, ns: &'a str, tenant: &'a Tenant) -> BackendFuture<'a, u64> {
        ready(self.write(ns, tenant, |slot| {
            slot.counter += 1;
            slot.counter
        }))
    }

    fn index_add<'a>(
        &'a self,
        ns: &'a str,
        tenant: &'a Tenant,
        index: &'a str,
        foreign: &'a str,
        id: &'a str,
    ) -> BackendFuture<'a, ()> {
        ready(self.write(ns, tenant, |slot| {
            slot.indexes
                .entry((index.to_string(), foreign.to_string()))
                .or_default()
                .insert(id.to_string());
        }))
    }

    fn index_remove<'a>(
        &'a self,
        ns: &'a str,
        tenant: &'a Tenant,
        index: &'a str,
        foreign: &'a str,
        id: &'a str,
    ) -> BackendFuture<'a, ()> {
        ready(self.write(ns, tenant, |slot| {
            let key = (index.to_string(), foreign.to_string());
            if let Some(members) = slot.indexes.get_mut(&key) {
                members.remove(id);
                if members.is_empty() {
                    slot.indexes.remove(&key);
                }
            }
        }))
    }

    fn index_members<'a>(
        &'a self,
        ns: &'a str,
        tenant: &'a Tenant,
        index: &'a str,
        foreign: &'a str,
    ) -> BackendFuture<'a, Vec<String>> {
        ready(self.read(ns, tenant, Vec::new(), |slot| {
            let mut members: Vec<String> = slot
                .indexes
                .get(&(index.to_string(), foreign.to_string()))
                .map(|members| members.iter().cloned().collect())
                .unwrap_or_default();
            super::sort_keys(&mut members);
            members
        }))
    }

    fn tenants<'a>(&'a self, ns: &'a str) -> BackendFuture<'a, Vec<Tenant>> {
        ready(
            self.tenants
                .read()
                .map_err(|_| poisoned())
                .map(|tenants| tenants.get(ns).cloned().unwrap_or_default()),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn tenant() -> Tenant {
        Tenant::create(Uuid::new_v4(), "GMS", 83, 1).unwrap()
    }

    #[tokio::test]
    async fn namespaces_do_not_share_entries() {
        let backend = MemoryBackend::new();
        let t = tenant();
        backend.put("party", &t, "1", b"a".to_vec()).await.unwrap();

        assert_eq!(backend.get("party", &t, "1").await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(backend.get("messenger", &t, "1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn counters_are_per_tenant() {
        let backend = MemoryBackend::new();
        let (a, b) = (tenant(), tenant());
        assert_eq!(backend.next_id("party", &a).await.unwrap(), 1);
        assert_eq!(backend.next_id("party", &a).await.unwrap(), 2);
        assert_eq!(backend.next_id("party", &b).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn index_members_are_sorted_and_pruned() {
        let backend = MemoryBackend::new();
        let t = tenant();
        backend.index_add("party", &t, "character", "7", "20").await.unwrap();
        backend.index_add("party", &t, "character", "7", "10").await.unwrap();
        assert_eq!(
            backend.index_members("party", &t, "character", "7").await.unwrap(),
            vec!["10", "20"]
        );

        backend.index_remove("party", &t, "character", "7", "10").await.unwrap();
        backend.index_remove("party", &t, "character", "7", "20").await.unwrap();
        assert!(backend.index_members("party", &t, "character", "7").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn removing_missing_entry_is_ok() {
        let backend = MemoryBackend::new();
        backend.remove("party", &tenant(), "404").await.unwrap();
    }
}
