//! Asset Cache - path keyed store of decoded assets
//!
//! The cache is the single source of truth for "is this asset ready". It is
//! read from any thread; writes come from the dispatcher and from compound
//! joins storing their results. There is no eviction: entries live until they
//! are overwritten, removed or the whole cache is cleared.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::asset::{AssetPath, AssetType, ErasedAsset};
use crate::error::AssetError;

/// Stored asset entry
struct CacheEntry {
    /// The decoded object
    asset: ErasedAsset,
    /// Type tag it was stored under
    asset_type: AssetType,
}

/// Storage for all ready assets
pub struct AssetCache {
    entries: RwLock<HashMap<AssetPath, CacheEntry>>,
}

impl AssetCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Check if a path is cached
    pub fn contains(&self, path: &str) -> bool {
        self.entries.read().contains_key(path)
    }

    /// Get the object stored under a path
    pub fn get(&self, path: &str) -> Result<ErasedAsset, AssetError> {
        self.entries
            .read()
            .get(path)
            .map(|entry| entry.asset.clone())
            .ok_or_else(|| AssetError::NotCached(path.to_string()))
    }

    /// Get the object stored under a path as a concrete type
    pub fn get_as<T: Any + Send + Sync>(&self, path: &str) -> Result<Arc<T>, AssetError> {
        self.get(path)?
            .downcast::<T>()
            .map_err(|_| AssetError::TypeMismatch {
                path: path.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Get the type tag a path was stored under
    pub fn asset_type(&self, path: &str) -> Option<AssetType> {
        self.entries.read().get(path).map(|entry| entry.asset_type)
    }

    /// Store an object, replacing whatever was stored under the same path
    pub fn put(&self, path: impl Into<AssetPath>, asset_type: AssetType, asset: ErasedAsset) {
        self.entries
            .write()
            .insert(path.into(), CacheEntry { asset, asset_type });
    }

    /// Remove an entry. Returns whether something was removed.
    pub fn remove(&self, path: &str) -> bool {
        self.entries.write().remove(path).is_some()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Get number of cached assets
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Get all cached paths, sorted
    pub fn paths(&self) -> Vec<AssetPath> {
        let mut paths: Vec<_> = self.entries.read().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl Default for AssetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCache")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: AssetType = AssetType::new("text");

    #[test]
    fn test_put_get() {
        let cache = AssetCache::new();
        assert!(!cache.contains("a.txt"));
        assert!(matches!(cache.get("a.txt"), Err(AssetError::NotCached(p)) if p == "a.txt"));

        cache.put("a.txt", TEXT, Arc::new(String::from("hello")));

        assert!(cache.contains("a.txt"));
        assert_eq!(cache.asset_type("a.txt"), Some(TEXT));
        assert_eq!(*cache.get_as::<String>("a.txt").unwrap(), "hello");
    }

    #[test]
    fn test_put_overwrites() {
        let cache = AssetCache::new();
        cache.put("a.txt", TEXT, Arc::new(1u32));
        cache.put("a.txt", TEXT, Arc::new(2u32));

        assert_eq!(cache.len(), 1);
        assert_eq!(*cache.get_as::<u32>("a.txt").unwrap(), 2);
    }

    #[test]
    fn test_type_mismatch() {
        let cache = AssetCache::new();
        cache.put("a.txt", TEXT, Arc::new(7i64));

        let err = cache.get_as::<String>("a.txt").unwrap_err();
        assert!(matches!(err, AssetError::TypeMismatch { .. }));
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = AssetCache::new();
        cache.put("a", TEXT, Arc::new(()));
        cache.put("b", TEXT, Arc::new(()));
        cache.put("c", TEXT, Arc::new(()));

        assert!(cache.remove("b"));
        assert!(!cache.remove("b"));
        assert_eq!(cache.paths(), vec!["a".to_string(), "c".to_string()]);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("a").is_err());
    }

    #[test]
    fn test_concurrent_readers() {
        let cache = Arc::new(AssetCache::new());
        cache.put("shared", TEXT, Arc::new(42u32));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        assert_eq!(*cache.get_as::<u32>("shared").unwrap(), 42);
                    }
                })
            })
            .collect();

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
