//! Asset Manager - the context object tying cache, queue and dispatcher together
//!
//! Requests enter through [`AssetManager::request_asset`]. A path that is
//! already cached is answered on the calling thread before the call returns;
//! anything else is queued and answered by a later tick.

use std::any::Any;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::asset::{AssetPath, AssetType, ErasedAsset};
use crate::cache::AssetCache;
use crate::dispatcher::{Dispatcher, TickOutcome};
use crate::error::AssetError;
use crate::join::{CompoundJoin, CompoundRequest, PartListener};
use crate::listener::SharedListener;
use crate::loader::{AssetLoader, LoaderRegistry};
use crate::request::{AssetRequest, RequestQueue};
use crate::source::Source;

/// Asset manager configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetManagerConfig {
    /// Period of the background dispatcher in milliseconds
    pub tick_interval_ms: u64,
    /// Answer queued requests from the cache when an earlier duplicate already loaded them
    pub skip_cached_on_dispatch: bool,
}

impl AssetManagerConfig {
    /// Dispatcher period as a duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Default for AssetManagerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 16,
            skip_cached_on_dispatch: true,
        }
    }
}

/// How a request was accepted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestStatus {
    /// Already cached; listeners were notified before the call returned
    CacheHit,
    /// Waiting in the queue at this zero-based position
    Queued { position: usize },
}

impl RequestStatus {
    /// Whether the request was answered synchronously
    pub fn is_cache_hit(&self) -> bool {
        matches!(self, RequestStatus::CacheHit)
    }
}

/// Live counters shared by the manager and its joins
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    pub(crate) requests: AtomicU64,
    pub(crate) cache_hits: AtomicU64,
    pub(crate) cache_misses: AtomicU64,
    pub(crate) loaded: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) passed_through: AtomicU64,
    pub(crate) compounds_resolved: AtomicU64,
    pub(crate) compounds_failed: AtomicU64,
}

impl StatCounters {
    fn snapshot(&self, cached: usize, pending: usize) -> AssetStats {
        AssetStats {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            loaded: self.loaded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            passed_through: self.passed_through.load(Ordering::Relaxed),
            compounds_resolved: self.compounds_resolved.load(Ordering::Relaxed),
            compounds_failed: self.compounds_failed.load(Ordering::Relaxed),
            cached,
            pending,
        }
    }
}

/// Snapshot of manager statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStats {
    /// Simple requests submitted, compound parts included
    pub requests: u64,
    /// Requests answered synchronously from the cache
    pub cache_hits: u64,
    /// Requests that had to be queued
    pub cache_misses: u64,
    /// Successful loader runs
    pub loaded: u64,
    /// Failed loader runs
    pub failed: u64,
    /// Requests delivered without a loader
    pub passed_through: u64,
    /// Compound assets processed and cached
    pub compounds_resolved: u64,
    /// Compound failure notifications, refires included
    pub compounds_failed: u64,
    /// Entries in the cache
    pub cached: usize,
    /// Requests waiting in the queue
    pub pending: usize,
}

/// State shared between the manager handle and the dispatcher thread
pub(crate) struct Core {
    pub(crate) config: AssetManagerConfig,
    pub(crate) cache: Arc<AssetCache>,
    pub(crate) loaders: LoaderRegistry,
    pub(crate) queue: Arc<Mutex<RequestQueue>>,
    pub(crate) tick_lock: Mutex<()>,
    /// Thread running the current tick
    pub(crate) tick_owner: Mutex<Option<ThreadId>>,
    pub(crate) stats: Arc<StatCounters>,
}

impl Core {
    fn new(config: AssetManagerConfig, loaders: LoaderRegistry) -> Self {
        Self {
            config,
            cache: Arc::new(AssetCache::new()),
            loaders,
            queue: Arc::new(Mutex::new(RequestQueue::new())),
            tick_lock: Mutex::new(()),
            tick_owner: Mutex::new(None),
            stats: Arc::new(StatCounters::default()),
        }
    }

    pub(crate) fn request_asset(&self, request: AssetRequest) -> RequestStatus {
        self.stats.requests.fetch_add(1, Ordering::Relaxed);

        // The cache check and the enqueue happen under the queue lock so a
        // concurrent dispatch cannot store the path in between.
        let mut queue = self.queue.lock();
        if self.cache.contains(request.path()) {
            drop(queue);
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("Cache hit: {}", request.path());
            request.notify_available();
            return RequestStatus::CacheHit;
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        log::debug!("Queued asset: {} ({})", request.path(), request.asset_type());
        let position = queue.push(request);
        RequestStatus::Queued { position }
    }
}

/// Builder for [`AssetManager`]
pub struct AssetManagerBuilder {
    config: AssetManagerConfig,
    loaders: LoaderRegistry,
}

impl AssetManagerBuilder {
    /// Create a builder with default configuration and no loaders
    pub fn new() -> Self {
        Self {
            config: AssetManagerConfig::default(),
            loaders: LoaderRegistry::new(),
        }
    }

    /// Set configuration
    pub fn config(mut self, config: AssetManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a loader for an asset type
    pub fn register_loader<L: AssetLoader + 'static>(mut self, asset_type: AssetType, loader: L) -> Self {
        self.loaders.register(asset_type, loader);
        self
    }

    /// Direct access to the registry being built
    pub fn loaders_mut(&mut self) -> &mut LoaderRegistry {
        &mut self.loaders
    }

    /// Freeze the registry and create the manager
    pub fn build(self) -> AssetManager {
        AssetManager::init(self.config, self.loaders)
    }
}

impl Default for AssetManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Asset manager
///
/// Owns the cache, the request queue and the frozen loader registry. Clone the
/// [`cache`](Self::cache) handle to read assets from other threads.
pub struct AssetManager {
    core: Arc<Core>,
    dispatcher: Mutex<Option<Dispatcher>>,
}

impl AssetManager {
    /// Start building a manager
    pub fn builder() -> AssetManagerBuilder {
        AssetManagerBuilder::new()
    }

    /// Create a manager from a configuration and a filled loader registry
    pub fn init(config: AssetManagerConfig, loaders: LoaderRegistry) -> Self {
        log::info!(
            "Asset manager initialized with {} loader(s): {:?}",
            loaders.len(),
            loaders.types().iter().map(|t| t.name()).collect::<Vec<_>>()
        );
        Self {
            core: Arc::new(Core::new(config, loaders)),
            dispatcher: Mutex::new(None),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &AssetManagerConfig {
        &self.core.config
    }

    /// Get the loader registry
    pub fn loaders(&self) -> &LoaderRegistry {
        &self.core.loaders
    }

    /// Shared handle to the cache
    pub fn cache(&self) -> Arc<AssetCache> {
        self.core.cache.clone()
    }

    /// Request a simple asset
    ///
    /// On a cache hit every listener is notified before this returns.
    /// Otherwise the request is queued and answered by a later tick.
    pub fn request_asset<I>(
        &self,
        path: impl Into<AssetPath>,
        asset_type: AssetType,
        source: Box<dyn Source>,
        listeners: I,
    ) -> RequestStatus
    where
        I: IntoIterator<Item = SharedListener>,
    {
        let request = AssetRequest::new(path, asset_type, source, listeners.into_iter().collect());
        self.core.request_asset(request)
    }

    /// Submit a prepared request
    pub fn submit(&self, request: AssetRequest) -> RequestStatus {
        self.core.request_asset(request)
    }

    /// Request a compound asset built from several parts
    ///
    /// One simple request is issued per part path, sources minted by the
    /// request's factory. Returns the status of the last part queued, or
    /// `CacheHit` when nothing had to be queued.
    pub fn request_compound_asset(&self, request: CompoundRequest) -> Result<RequestStatus, AssetError> {
        let (parts, factory) = request.validate()?;

        if self.core.cache.contains(&request.compound_path) {
            self.core.stats.requests.fetch_add(1, Ordering::Relaxed);
            self.core.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("Cache hit: {}", request.compound_path);
            AssetRequest::detached(
                request.compound_path,
                request.compound_type,
                request.listeners,
            )
            .notify_available();
            return Ok(RequestStatus::CacheHit);
        }

        log::debug!(
            "Requesting compound asset {} from {} part(s)",
            request.compound_path,
            parts.len()
        );
        let join = Arc::new(CompoundJoin::new(
            request,
            self.core.cache.clone(),
            Arc::downgrade(&self.core.queue),
            self.core.stats.clone(),
        ));
        let listener: SharedListener = Arc::new(PartListener::new(join));

        let mut status = RequestStatus::CacheHit;
        for (path, asset_type) in parts {
            let source = factory.create(&path);
            let part = AssetRequest::new(path, asset_type, source, vec![listener.clone()]);
            if let queued @ RequestStatus::Queued { .. } = self.core.request_asset(part) {
                status = queued;
            }
        }
        Ok(status)
    }

    /// Run one dispatcher tick on the calling thread
    pub fn tick(&self) -> TickOutcome {
        self.core.tick()
    }

    /// Tick until the queue is empty. Returns the number of requests processed.
    ///
    /// Listeners that keep enqueueing keep this running. Called from a
    /// listener inside a tick it returns at once, leaving the queue to the
    /// outer driver.
    pub fn tick_until_idle(&self) -> usize {
        let mut processed = 0;
        loop {
            match self.core.tick() {
                TickOutcome::Idle => return processed,
                TickOutcome::Busy if self.core.is_ticking_here() => return processed,
                TickOutcome::Busy => std::thread::yield_now(),
                _ => processed += 1,
            }
        }
    }

    /// Start the background dispatcher thread. Does nothing if already running.
    pub fn start_dispatcher(&self) -> io::Result<()> {
        let mut dispatcher = self.dispatcher.lock();
        if dispatcher.is_none() {
            *dispatcher = Some(Dispatcher::spawn(
                self.core.clone(),
                self.core.config.tick_interval(),
            )?);
        }
        Ok(())
    }

    /// Stop the background dispatcher thread, waiting for its current tick
    pub fn stop_dispatcher(&self) {
        let dispatcher = self.dispatcher.lock().take();
        if let Some(dispatcher) = dispatcher {
            dispatcher.stop();
        }
    }

    /// Check if the background dispatcher is running
    pub fn is_dispatching(&self) -> bool {
        self.dispatcher.lock().is_some()
    }

    /// Get a cached asset
    pub fn get_asset(&self, path: &str) -> Result<ErasedAsset, AssetError> {
        self.core.cache.get(path)
    }

    /// Get a cached asset as a concrete type
    pub fn get_asset_as<T: Any + Send + Sync>(&self, path: &str) -> Result<Arc<T>, AssetError> {
        self.core.cache.get_as::<T>(path)
    }

    /// Check if a path is cached
    pub fn is_cached(&self, path: &str) -> bool {
        self.core.cache.contains(path)
    }

    /// Remove a cached asset
    pub fn remove_asset(&self, path: &str) -> bool {
        let removed = self.core.cache.remove(path);
        if removed {
            log::debug!("Removed asset: {}", path);
        }
        removed
    }

    /// Remove every cached asset
    pub fn clear_cache(&self) {
        let count = self.core.cache.len();
        self.core.cache.clear();
        log::debug!("Cleared {} cached asset(s)", count);
    }

    /// Number of requests waiting in the queue
    pub fn pending_requests(&self) -> usize {
        self.core.queue.lock().len()
    }

    /// Get statistics
    pub fn stats(&self) -> AssetStats {
        let pending = self.pending_requests();
        self.core.stats.snapshot(self.core.cache.len(), pending)
    }

    /// Stop dispatching, drop queued requests without notifying them and
    /// clear the cache
    pub fn release(&self) {
        self.stop_dispatcher();
        let dropped = self.core.queue.lock().clear();
        if dropped > 0 {
            log::warn!("Released asset manager with {} pending request(s)", dropped);
        }
        self.core.cache.clear();
        log::info!("Asset manager released");
    }
}

impl Drop for AssetManager {
    fn drop(&mut self) {
        self.stop_dispatcher();
    }
}
