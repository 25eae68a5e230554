//! Asset Loader - Pluggable decode strategies
//!
//! Loaders turn the bytes of an open [`Source`] into a typed in-memory asset.
//! Each [`AssetType`] maps to exactly one loader; the registry is filled at
//! startup and frozen once the manager is built.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::sync::Arc;

use crate::asset::{extension_of, AssetType, ErasedAsset};
use crate::error::{LoadError, LoadResult};
use crate::source::{Source, SourceScope};

/// Context provided to loaders during loading
///
/// Holds the request's source open for as long as the context lives.
pub struct LoadContext<'a> {
    path: &'a str,
    asset_type: AssetType,
    scope: SourceScope<'a>,
}

impl<'a> LoadContext<'a> {
    /// Open `source` and wrap it in a context. The source is closed when the
    /// context is dropped, or immediately if opening fails.
    pub fn open(path: &'a str, asset_type: AssetType, source: &'a mut dyn Source) -> LoadResult<Self> {
        Ok(Self {
            path,
            asset_type,
            scope: SourceScope::open(source)?,
        })
    }

    /// Path of the asset being loaded
    pub fn path(&self) -> &str {
        self.path
    }

    /// Type tag of the asset being loaded
    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    /// Get file extension
    pub fn extension(&self) -> Option<String> {
        extension_of(self.path)
    }

    /// Stream over the source bytes
    pub fn stream(&mut self) -> LoadResult<&mut dyn Read> {
        self.scope.source().stream()
    }

    /// Read the remaining bytes
    pub fn read_bytes(&mut self) -> LoadResult<Vec<u8>> {
        let mut data = Vec::new();
        self.stream()?.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Read the remaining bytes as UTF-8
    pub fn read_string(&mut self) -> LoadResult<String> {
        let data = self.read_bytes()?;
        String::from_utf8(data)
            .map_err(|e| LoadError::Parse(format!("Invalid UTF-8 in {}: {}", self.path, e)))
    }
}

/// Trait for asset loaders
pub trait AssetLoader: Send + Sync {
    /// Asset type this loader produces
    type Asset: Send + Sync + 'static;

    /// File extensions this loader handles
    fn extensions(&self) -> &[&str] {
        &[]
    }

    /// Load an asset from an open source
    fn load(&self, ctx: &mut LoadContext) -> LoadResult<Self::Asset>;

    /// Get the type name of the asset
    fn asset_type_name(&self) -> &'static str {
        std::any::type_name::<Self::Asset>()
    }
}

/// Type-erased asset loader
pub trait ErasedLoader: Send + Sync {
    /// File extensions this loader handles
    fn extensions(&self) -> &[&str];

    /// Load an asset into a shared `Any`
    fn load_erased(&self, ctx: &mut LoadContext) -> LoadResult<ErasedAsset>;

    /// Get the asset type name
    fn asset_type_name(&self) -> &'static str;
}

impl<L: AssetLoader> ErasedLoader for L {
    fn extensions(&self) -> &[&str] {
        AssetLoader::extensions(self)
    }

    fn load_erased(&self, ctx: &mut LoadContext) -> LoadResult<ErasedAsset> {
        self.load(ctx)
            .map(|asset| Arc::new(asset) as Arc<dyn Any + Send + Sync>)
    }

    fn asset_type_name(&self) -> &'static str {
        AssetLoader::asset_type_name(self)
    }
}

/// Registry of asset loaders keyed by asset type
pub struct LoaderRegistry {
    /// Loader per asset type
    by_type: HashMap<AssetType, Box<dyn ErasedLoader>>,
    /// Extension -> asset type
    by_extension: BTreeMap<String, AssetType>,
}

impl LoaderRegistry {
    /// Create a new loader registry
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            by_extension: BTreeMap::new(),
        }
    }

    /// Register a loader for an asset type, replacing any previous one
    pub fn register<L: AssetLoader + 'static>(&mut self, asset_type: AssetType, loader: L) {
        self.register_erased(asset_type, Box::new(loader));
    }

    /// Register an erased loader
    pub fn register_erased(&mut self, asset_type: AssetType, loader: Box<dyn ErasedLoader>) {
        for &ext in loader.extensions() {
            let ext = ext.to_lowercase();
            if let Some(previous) = self.by_extension.insert(ext.clone(), asset_type) {
                if previous != asset_type {
                    log::warn!("Extension '{}' moved from {} to {}", ext, previous, asset_type);
                }
            }
        }

        log::debug!("Registered {} loader for {}", loader.asset_type_name(), asset_type);
        if self.by_type.insert(asset_type, loader).is_some() {
            log::warn!("Replaced existing loader for {}", asset_type);
        }
    }

    /// Get the loader for an asset type
    pub fn get(&self, asset_type: AssetType) -> Option<&dyn ErasedLoader> {
        self.by_type.get(&asset_type).map(|b| b.as_ref())
    }

    /// Check if a loader is registered for an asset type
    pub fn supports(&self, asset_type: AssetType) -> bool {
        self.by_type.contains_key(&asset_type)
    }

    /// Resolve an asset type from a path's extension
    pub fn type_for_path(&self, path: &str) -> Option<AssetType> {
        let ext = extension_of(path)?;
        self.by_extension.get(&ext).copied()
    }

    /// Check if an extension is claimed by some loader
    pub fn supports_extension(&self, ext: &str) -> bool {
        self.by_extension.contains_key(&ext.to_lowercase())
    }

    /// Get all registered asset types
    pub fn types(&self) -> Vec<AssetType> {
        let mut types: Vec<_> = self.by_type.keys().copied().collect();
        types.sort();
        types
    }

    /// Get number of registered loaders
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
