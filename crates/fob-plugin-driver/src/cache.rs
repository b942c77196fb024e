//! Persistent per-plugin key-value cache.
//!
//! The host owns a [`PluginCache`] and may serialize it between builds. Each
//! plugin sees its own namespace through a [`PluginCacheHandle`]. Entries
//! carry an age that is reset whenever they are read; [`PluginCache::expire`]
//! ages every entry and drops the ones nobody touched for too long.

use crate::error::{DriverError, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Builds since the entry was last read or written.
    pub age: u32,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginCache {
    namespaces: BTreeMap<String, BTreeMap<String, CacheEntry>>,
}

pub type SharedPluginCache = Arc<Mutex<PluginCache>>;

impl PluginCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedPluginCache {
        Arc::new(Mutex::new(self))
    }

    pub fn namespace(&self, name: &str) -> Option<&BTreeMap<String, CacheEntry>> {
        self.namespaces.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.values().all(BTreeMap::is_empty)
    }

    /// Age every entry by one build. Called when a build starts.
    pub fn age_entries(&mut self) {
        for entry in self.namespaces.values_mut().flat_map(BTreeMap::values_mut) {
            entry.age = entry.age.saturating_add(1);
        }
    }

    /// Drop entries that went `max_age` builds without being used.
    pub fn evict(&mut self, max_age: u32) {
        for entries in self.namespaces.values_mut() {
            entries.retain(|_, entry| entry.age < max_age);
        }
        self.namespaces.retain(|_, entries| !entries.is_empty());
    }

    /// Age every entry and evict the stale ones in one step.
    pub fn expire(&mut self, max_age: u32) {
        self.age_entries();
        self.evict(max_age);
    }

    fn ensure_namespace(&mut self, name: &str) {
        self.namespaces.entry(name.to_string()).or_default();
    }
}

#[derive(Debug, Clone)]
enum HandleKind {
    Namespaced {
        store: SharedPluginCache,
        namespace: String,
    },
    /// Caching is turned off for the build. Reads miss, writes are dropped.
    Disabled,
    /// The plugin has no unique name; any use is an error.
    Uncacheable { plugin: String },
}

/// A plugin's view of the cache.
#[derive(Debug, Clone)]
pub struct PluginCacheHandle {
    kind: HandleKind,
}

impl PluginCacheHandle {
    pub(crate) fn namespaced(store: SharedPluginCache, namespace: String) -> Self {
        store.lock().ensure_namespace(&namespace);
        Self {
            kind: HandleKind::Namespaced { store, namespace },
        }
    }

    pub(crate) fn disabled() -> Self {
        Self {
            kind: HandleKind::Disabled,
        }
    }

    pub(crate) fn uncacheable(plugin: String) -> Self {
        Self {
            kind: HandleKind::Uncacheable { plugin },
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.kind, HandleKind::Namespaced { .. })
    }

    fn with_namespace<R>(
        &self,
        disabled: R,
        f: impl FnOnce(&mut BTreeMap<String, CacheEntry>) -> R,
    ) -> Result<R> {
        match &self.kind {
            HandleKind::Namespaced { store, namespace } => {
                let mut cache = store.lock();
                let entries = cache.namespaces.entry(namespace.clone()).or_default();
                Ok(f(entries))
            }
            HandleKind::Disabled => Ok(disabled),
            HandleKind::Uncacheable { plugin } => Err(DriverError::UncacheablePlugin(plugin.clone())),
        }
    }

    /// Read a value and mark it as used.
    pub fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        self.with_namespace(None, |entries| {
            entries.get_mut(key).map(|entry| {
                entry.age = 0;
                entry.value.clone()
            })
        })
    }

    /// Read and deserialize a value. Values of the wrong shape read as missing.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        Ok(self
            .get(key)?
            .and_then(|value| serde_json::from_value(value).ok()))
    }

    /// Whether a value exists. Marks it as used.
    pub fn has(&self, key: &str) -> Result<bool> {
        self.with_namespace(false, |entries| match entries.get_mut(key) {
            Some(entry) => {
                entry.age = 0;
                true
            }
            None => false,
        })
    }

    pub fn set(&self, key: &str, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| DriverError::InvalidConfig(format!("cache value for \"{}\": {}", key, e)))?;
        self.with_namespace((), |entries| {
            entries.insert(key.to_string(), CacheEntry { age: 0, value });
        })
    }

    /// Remove a value. Returns whether it existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.with_namespace(false, |entries| entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces_are_isolated() {
        let store = PluginCache::new().shared();
        let a = PluginCacheHandle::namespaced(store.clone(), "a".into());
        let b = PluginCacheHandle::namespaced(store.clone(), "b".into());

        a.set("key", 1).unwrap();
        assert_eq!(a.get_as::<i32>("key").unwrap(), Some(1));
        assert!(!b.has("key").unwrap());
        assert!(a.delete("key").unwrap());
        assert!(!a.delete("key").unwrap());
    }

    #[test]
    fn test_reads_reset_age() {
        let store = PluginCache::new().shared();
        let handle = PluginCacheHandle::namespaced(store.clone(), "p".into());
        handle.set("kept", "v").unwrap();
        handle.set("dropped", "v").unwrap();

        store.lock().expire(2);
        assert!(handle.has("kept").unwrap());
        store.lock().expire(2);

        let cache = store.lock();
        let entries = cache.namespace("p").unwrap();
        assert!(entries.contains_key("kept"));
        assert!(!entries.contains_key("dropped"));
    }

    #[test]
    fn test_disabled_and_uncacheable() {
        let disabled = PluginCacheHandle::disabled();
        disabled.set("k", 1).unwrap();
        assert_eq!(disabled.get("k").unwrap(), None);
        assert!(!disabled.is_enabled());

        let uncacheable = PluginCacheHandle::uncacheable("at position 1".into());
        let err = uncacheable.get("k").unwrap_err();
        assert!(matches!(err, DriverError::UncacheablePlugin(ref p) if p == "at position 1"));
    }

    #[test]
    fn test_cache_round_trips_through_json() {
        let store = PluginCache::new().shared();
        PluginCacheHandle::namespaced(store.clone(), "p".into())
            .set("k", serde_json::json!({"n": 1}))
            .unwrap();
        let json = serde_json::to_string(&*store.lock()).unwrap();
        let restored: PluginCache = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, *store.lock());
    }
}
