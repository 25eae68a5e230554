//! Dispatcher - the single consumer of the request queue
//!
//! Each tick pops at most one request, however deep the queue is, runs its
//! loader, stores the result and notifies the request's listeners. A burst of
//! requests only grows the queue; it never makes one tick more expensive.
//!
//! Ticks can be driven by hand ([`AssetManager::tick`](crate::AssetManager::tick))
//! or by the background scheduler thread started with
//! [`AssetManager::start_dispatcher`](crate::AssetManager::start_dispatcher).

use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender};

use crate::asset::AssetPath;
use crate::error::{catch_panic, AssetError, LoadError};
use crate::loader::LoadContext;
use crate::manager::Core;
use crate::request::AssetRequest;

/// What a single tick did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Queue was empty
    Idle,
    /// Another tick was already running
    Busy,
    /// Loader succeeded; asset cached and listeners notified
    Loaded(AssetPath),
    /// Loader failed; listeners notified, nothing cached
    Failed(AssetPath),
    /// No loader for the type; listeners notified, cache untouched
    PassedThrough(AssetPath),
    /// An earlier request already cached the path; listeners notified
    AlreadyCached(AssetPath),
}

impl TickOutcome {
    /// Whether a request was consumed
    pub fn did_work(&self) -> bool {
        !matches!(self, TickOutcome::Idle | TickOutcome::Busy)
    }
}

impl Core {
    /// Run one dispatcher tick
    pub(crate) fn tick(&self) -> TickOutcome {
        let Some(_ticking) = self.tick_lock.try_lock() else {
            return TickOutcome::Busy;
        };
        let _owner = TickOwner::enter(self);

        let next = self.queue.lock().pop();
        match next {
            Some(request) => self.dispatch(request),
            None => TickOutcome::Idle,
        }
    }

    /// Whether the running tick belongs to the calling thread
    pub(crate) fn is_ticking_here(&self) -> bool {
        *self.tick_owner.lock() == Some(thread::current().id())
    }

    fn dispatch(&self, mut request: AssetRequest) -> TickOutcome {
        let path = request.path().to_string();
        let asset_type = request.asset_type();

        if self.config.skip_cached_on_dispatch && self.cache.contains(&path) {
            log::debug!("Asset {} already cached, skipping load", path);
            request.notify_available();
            return TickOutcome::AlreadyCached(path);
        }

        let Some(loader) = self.loaders.get(asset_type) else {
            log::debug!("No loader for {}, passing {} through", asset_type, path);
            self.stats.passed_through.fetch_add(1, Ordering::Relaxed);
            request.notify_available();
            return TickOutcome::PassedThrough(path);
        };

        let started = Instant::now();
        let result = match request.source_mut() {
            Some(source) => catch_panic(|| {
                LoadContext::open(&path, asset_type, source)
                    .and_then(|mut ctx| loader.load_erased(&mut ctx))
            })
            .unwrap_or_else(|message| Err(LoadError::Custom(format!("loader panicked: {}", message)))),
            None => Err(LoadError::Source(format!("request for {} has no source", path))),
        };

        match result {
            Ok(asset) => {
                {
                    let _queue = self.queue.lock();
                    self.cache.put(path.clone(), asset_type, asset);
                }
                self.stats.loaded.fetch_add(1, Ordering::Relaxed);
                log::info!(
                    "Loaded asset: {} ({}) in {:?}",
                    path,
                    asset_type,
                    started.elapsed()
                );
                request.notify_available();
                TickOutcome::Loaded(path)
            }
            Err(source) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                log::warn!("Failed to load {}: {}", path, source);
                let error = AssetError::LoadFailed {
                    path: path.clone(),
                    source,
                };
                request.notify_not_available(&error);
                TickOutcome::Failed(path)
            }
        }
    }
}

/// Marks the calling thread as the tick owner until dropped
struct TickOwner<'a> {
    core: &'a Core,
}

impl<'a> TickOwner<'a> {
    fn enter(core: &'a Core) -> Self {
        *core.tick_owner.lock() = Some(thread::current().id());
        Self { core }
    }
}

impl Drop for TickOwner<'_> {
    fn drop(&mut self) {
        *self.core.tick_owner.lock() = None;
    }
}

/// Background scheduler thread ticking the dispatcher periodically
pub(crate) struct Dispatcher {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub(crate) fn spawn(core: Arc<Core>, interval: Duration) -> io::Result<Self> {
        let (stop, stop_rx) = crossbeam_channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("tickload-dispatcher".to_string())
            .spawn(move || {
                log::info!("Dispatcher started ({:?} per tick)", interval);
                loop {
                    if let Err(message) = catch_panic(|| core.tick()) {
                        log::error!("Dispatcher tick panicked: {}", message);
                    }
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::info!("Dispatcher stopped");
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to finish its current tick
    pub(crate) fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop.try_send(());
        let Some(handle) = self.handle.take() else {
            return;
        };
        // Stopped from a listener running on the dispatcher thread itself
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            log::error!("Dispatcher thread panicked");
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
