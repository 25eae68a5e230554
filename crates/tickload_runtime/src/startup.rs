//! Startup preloading
//!
//! Submits every configured asset and atlas, then waits on a channel until
//! each one has reported or the timeout expires.

use std::collections::BTreeSet;
use std::time::Instant;

use serde::Serialize;
use tickload::loaders::{BytesLoader, TextLoader, BYTES, TEXT};
use tickload::{AssetEvent, AssetManager, AssetStats, ChannelListener, DirSourceFactory, SourceFactory};
use tickload_formats::{register_default_loaders, AtlasProcessor, AtlasRegion, FormatAssets};

use crate::config::RuntimeConfig;

/// An asset that reported `not_available`
#[derive(Debug, Clone, Serialize)]
pub struct FailedAsset {
    pub path: String,
    pub error: String,
}

/// A packed atlas
#[derive(Debug, Clone, Serialize)]
pub struct AtlasSummary {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub regions: Vec<AtlasRegion>,
}

/// Outcome of startup preloading
#[derive(Debug, Clone, Default, Serialize)]
pub struct StartupReport {
    pub loaded: Vec<String>,
    pub failed: Vec<FailedAsset>,
    /// Still waiting when the timeout expired
    pub timed_out: Vec<String>,
    pub atlases: Vec<AtlasSummary>,
    pub stats: AssetStats,
}

impl StartupReport {
    /// Every startup asset became available
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.timed_out.is_empty()
    }

    /// Log the report
    pub fn print_summary(&self) {
        log::info!("=== Startup Report ===");
        log::info!("  Loaded: {}", self.loaded.len());
        for failed in &self.failed {
            log::error!("  Failed: {} ({})", failed.path, failed.error);
        }
        for path in &self.timed_out {
            log::error!("  Timed out: {}", path);
        }
        for atlas in &self.atlases {
            log::info!(
                "  Atlas {}: {}x{}, {} region(s)",
                atlas.name,
                atlas.width,
                atlas.height,
                atlas.regions.len()
            );
        }
        log::info!(
            "  Cache: {} entries, {} hits / {} misses",
            self.stats.cached,
            self.stats.cache_hits,
            self.stats.cache_misses
        );
        log::info!("======================");
    }
}

/// Create a manager with every bundled loader
pub fn build_manager(config: &RuntimeConfig) -> AssetManager {
    register_default_loaders(AssetManager::builder())
        .config(config.manager.clone())
        .register_loader(TEXT, TextLoader)
        .register_loader(BYTES, BytesLoader)
        .build()
}

/// Request every configured asset and wait for the outcomes
///
/// The manager must already be dispatching.
pub fn preload(manager: &AssetManager, config: &RuntimeConfig) -> StartupReport {
    let (listener, events) = ChannelListener::new();
    let factory = DirSourceFactory::new(&config.asset_dir);
    let mut report = StartupReport::default();
    let mut waiting = BTreeSet::new();

    for path in &config.preload {
        let asset_type = manager.loaders().type_for_path(path).unwrap_or(BYTES);
        // Registered before the request: a cache hit reports synchronously
        waiting.insert(path.clone());
        manager.request_asset(path.clone(), asset_type, factory.create(path), [listener.clone()]);
    }

    for atlas in &config.atlases {
        waiting.insert(atlas.name.clone());
        let request = AtlasProcessor::new(atlas.padding, atlas.max_width)
            .request(
                &atlas.name,
                atlas.parts.iter().cloned(),
                DirSourceFactory::new(&config.asset_dir),
            )
            .listener(listener.clone());
        if let Err(e) = manager.request_compound_asset(request) {
            waiting.remove(&atlas.name);
            report.failed.push(FailedAsset {
                path: atlas.name.clone(),
                error: e.to_string(),
            });
        }
    }

    let deadline = Instant::now() + config.timeout();
    while !waiting.is_empty() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let Ok(event) = events.recv_timeout(remaining) else {
            break;
        };
        // Repeated failures of one compound only count once
        if !waiting.remove(event.path()) {
            continue;
        }
        match event {
            AssetEvent::Available { path, .. } => report.loaded.push(path),
            AssetEvent::NotAvailable { path, error, .. } => {
                report.failed.push(FailedAsset {
                    path,
                    error: error.to_string(),
                });
            }
        }
    }
    report.timed_out = waiting.into_iter().collect();

    for atlas in &config.atlases {
        if let Ok(packed) = manager.get_atlas(&atlas.name) {
            report.atlases.push(AtlasSummary {
                name: atlas.name.clone(),
                width: packed.texture.width,
                height: packed.texture.height,
                regions: packed.regions.clone(),
            });
        }
    }
    report.stats = manager.stats();
    report
}
