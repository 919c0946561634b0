use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock, Weak};

use tracing::{debug, info};

use researchmind_core::traits::Embedder;
use researchmind_core::{Chunk, Error, Result};

use crate::fusion::FusionConfig;
use crate::retriever::HybridRetriever;

pub type SharedRetriever = Arc<RwLock<HybridRetriever>>;
type EvictionHook = Box<dyn Fn(&str, &SharedRetriever) + Send + Sync>;

#[derive(Default)]
struct Slots {
    stores: HashMap<String, SharedRetriever>,
    // least recently used first
    order: VecDeque<String>,
    // every instance handed out, including evicted ones still held by a caller
    live: HashMap<String, Weak<RwLock<HybridRetriever>>>,
}

impl Slots {
    fn touch(&mut self, user_id: &str) {
        if let Some(pos) = self.order.iter().position(|u| u == user_id) {
            if let Some(id) = self.order.remove(pos) { self.order.push_back(id); }
        }
    }

    fn remove(&mut self, user_id: &str) -> Option<SharedRetriever> {
        self.order.retain(|u| u != user_id);
        let live = self.live.remove(user_id).and_then(|w| w.upgrade());
        self.stores.remove(user_id).or(live)
    }

    /// Cached store, or an evicted one that a caller still holds.
    fn find(&mut self, user_id: &str) -> Option<SharedRetriever> {
        if let Some(store) = self.stores.get(user_id).cloned() {
            self.touch(user_id);
            return Some(store);
        }
        let store = self.live.get(user_id).and_then(Weak::upgrade)?;
        self.stores.insert(user_id.to_string(), Arc::clone(&store));
        self.order.push_back(user_id.to_string());
        Some(store)
    }

    fn evict_over(&mut self, capacity: usize) -> Vec<(String, SharedRetriever)> {
        let mut evicted = Vec::new();
        while self.order.len() > capacity {
            let Some(oldest) = self.order.pop_front() else { break };
            if let Some(old) = self.stores.remove(&oldest) { evicted.push((oldest, old)); }
        }
        self.live.retain(|_, w| w.strong_count() > 0);
        evicted
    }
}

/// Bounded cache of live per-user retrievers.
///
/// Stores live under `<root>/users/<user_id>`. When more than `capacity`
/// users are open, the least recently used store is dropped from memory
/// and handed to the eviction hook; its files stay on disk.
pub struct StoreRegistry {
    root: PathBuf,
    embedder: Arc<dyn Embedder>,
    fusion: FusionConfig,
    capacity: usize,
    slots: Mutex<Slots>,
    on_evict: Option<EvictionHook>,
}

impl StoreRegistry {
    pub fn new(root: impl Into<PathBuf>, embedder: Arc<dyn Embedder>, fusion: FusionConfig, capacity: usize) -> Result<Self> {
        fusion.validate()?;
        if capacity == 0 {
            return Err(Error::InvalidConfig("registry capacity must be at least 1".into()));
        }
        Ok(Self { root: root.into(), embedder, fusion, capacity, slots: Mutex::new(Slots::default()), on_evict: None })
    }

    pub fn with_eviction_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &SharedRetriever) + Send + Sync + 'static,
    {
        self.on_evict = Some(Box::new(hook));
        self
    }

    pub fn capacity(&self) -> usize { self.capacity }

    pub fn user_dir(&self, user_id: &str) -> Result<PathBuf> {
        validate_user_id(user_id)?;
        Ok(self.root.join("users").join(user_id))
    }

    /// Returns the live store for `user_id`, loading it from disk on first
    /// access. A store evicted from the cache while a caller still holds it
    /// is re-attached instead of loaded twice.
    pub fn open(&self, user_id: &str) -> Result<SharedRetriever> {
        let dir = self.user_dir(user_id)?;
        let cached = self.slots.lock().map_err(|e| Error::poisoned("registry", e))?.find(user_id);
        let store = match cached {
            Some(store) => store,
            None => {
                // cold load runs without the registry lock
                let mut retriever = HybridRetriever::new(dir, Arc::clone(&self.embedder), self.fusion);
                retriever.load_existing()?;
                Arc::new(RwLock::new(retriever))
            }
        };

        let (store, evicted) = {
            let mut slots = self.slots.lock().map_err(|e| Error::poisoned("registry", e))?;
            let store = match slots.find(user_id) {
                Some(live) => {
                    if !Arc::ptr_eq(&live, &store) {
                        debug!(user = user_id, "store loaded concurrently; keeping the first instance");
                    }
                    live
                }
                None => {
                    slots.stores.insert(user_id.to_string(), Arc::clone(&store));
                    slots.order.push_back(user_id.to_string());
                    slots.live.insert(user_id.to_string(), Arc::downgrade(&store));
                    debug!(user = user_id, live = slots.stores.len(), "opened user store");
                    store
                }
            };
            (store, slots.evict_over(self.capacity))
        };
        for (id, old) in &evicted {
            info!(user = %id, "evicting user store");
            if let Some(hook) = &self.on_evict { hook(id.as_str(), old); }
        }
        Ok(store)
    }

    /// Indexes and persists `chunks` for one user; returns the new total.
    pub fn index_documents(&self, user_id: &str, chunks: &[Chunk]) -> Result<usize> {
        let store = self.open(user_id)?;
        let mut retriever = store.write().map_err(|e| Error::poisoned("retriever", e))?;
        retriever.index(chunks)?;
        retriever.save()?;
        Ok(retriever.total_chunks())
    }

    /// Removes every document of a user; the store stays cached and usable.
    pub fn clear_documents(&self, user_id: &str) -> Result<()> {
        let store = self.open(user_id)?;
        let mut retriever = store.write().map_err(|e| Error::poisoned("retriever", e))?;
        retriever.clear()
    }

    /// Tears a user down: clears the store, drops the cache entry and
    /// deletes the user directory.
    pub fn remove_user(&self, user_id: &str) -> Result<()> {
        let dir = self.user_dir(user_id)?;
        let cached = self.slots.lock().map_err(|e| Error::poisoned("registry", e))?.remove(user_id);
        if let Some(store) = cached {
            let mut retriever = store.write().map_err(|e| Error::poisoned("retriever", e))?;
            retriever.clear()?;
        } else {
            HybridRetriever::new(dir.clone(), Arc::clone(&self.embedder), self.fusion).clear()?;
        }
        match std::fs::remove_dir_all(&dir) {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        info!(user = user_id, "removed user store");
        Ok(())
    }

    /// Cached user ids, least recently used first.
    pub fn active_users(&self) -> Vec<String> {
        self.slots.lock().map(|s| s.order.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn is_cached(&self, user_id: &str) -> bool {
        self.slots.lock().map(|s| s.stores.contains_key(user_id)).unwrap_or(false)
    }
}

/// ASCII letters, digits, `-` and `_` only, so ids are safe path segments.
pub fn validate_user_id(user_id: &str) -> Result<()> {
    let ok = !user_id.is_empty()
        && user_id.len() <= 128
        && user_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok { Ok(()) } else { Err(Error::InvalidInput(format!("invalid user id '{user_id}'"))) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_ids_must_be_path_safe() {
        assert!(validate_user_id("alice_01-x").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("../etc").is_err());
        assert!(validate_user_id("a/b").is_err());
        assert!(validate_user_id("a b").is_err());
    }
}
