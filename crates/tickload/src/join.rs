//! Compound Join - one derived asset from several independently loaded parts
//!
//! A join fans out one simple request per part path, collects the outcomes
//! through a [`PartListener`], and once every distinct part is present runs its
//! [`CompoundProcessor`] and caches the result under the compound path.
//!
//! ```text
//!                 PartSucceeded (all present)
//!   Pending ───────────────────────────────────► Resolved
//!      │
//!      │ PartFailed (not yet received)
//!      ▼
//!   Failed ──► PartFailed (not yet received) re-notifies listeners
//! ```
//!
//! `Resolved` ignores every later event. `Failed` ignores successes, but each
//! further failure of a part that was never received notifies the compound's
//! listeners again.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::asset::{AssetPath, AssetType, ErasedAsset};
use crate::cache::AssetCache;
use crate::error::{catch_panic, AssetError, ProcessError};
use crate::listener::{AssetListener, SharedListener};
use crate::manager::StatCounters;
use crate::request::{AssetRequest, RequestQueue};
use crate::source::SourceFactory;

/// Read access to the parts of a compound, in part-path order
pub struct Parts<'a> {
    paths: &'a [AssetPath],
    cache: &'a AssetCache,
}

impl<'a> Parts<'a> {
    pub(crate) fn new(paths: &'a [AssetPath], cache: &'a AssetCache) -> Self {
        Self { paths, cache }
    }

    /// Part paths as given to the request, duplicates included
    pub fn paths(&self) -> &'a [AssetPath] {
        self.paths
    }

    /// Part paths with duplicates removed, first occurrence kept
    pub fn distinct_paths(&self) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        self.paths
            .iter()
            .map(String::as_str)
            .filter(|p| seen.insert(*p))
            .collect()
    }

    /// Number of part paths, duplicates included
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Read a part from the cache
    pub fn get(&self, path: &str) -> Result<ErasedAsset, ProcessError> {
        Ok(self.cache.get(path)?)
    }

    /// Read a part from the cache as a concrete type
    pub fn get_as<T: Any + Send + Sync>(&self, path: &str) -> Result<Arc<T>, ProcessError> {
        Ok(self.cache.get_as::<T>(path)?)
    }

    /// Read every part as a concrete type, in part-path order
    pub fn all_as<T: Any + Send + Sync>(&self) -> Result<Vec<(&'a str, Arc<T>)>, ProcessError> {
        let mut parts = Vec::with_capacity(self.paths.len());
        for path in self.paths {
            parts.push((path.as_str(), self.get_as::<T>(path)?));
        }
        Ok(parts)
    }
}

/// Synthesizes one object from the cached parts of a compound
pub trait CompoundProcessor: Send + Sync {
    /// Object this processor produces
    type Output: Send + Sync + 'static;

    /// Combine the parts. Parts are read back from the cache by path.
    fn process(&self, parts: &Parts) -> Result<Self::Output, ProcessError>;
}

/// Type-erased compound processor
pub trait ErasedProcessor: Send + Sync {
    /// Combine the parts into a shared `Any`
    fn process_erased(&self, parts: &Parts) -> Result<ErasedAsset, ProcessError>;
}

impl<P: CompoundProcessor> ErasedProcessor for P {
    fn process_erased(&self, parts: &Parts) -> Result<ErasedAsset, ProcessError> {
        self.process(parts)
            .map(|out| Arc::new(out) as Arc<dyn Any + Send + Sync>)
    }
}

/// Processor built from a closure
pub struct FnProcessor<F>(F);

impl<F, T> CompoundProcessor for FnProcessor<F>
where
    F: Fn(&Parts) -> Result<T, ProcessError> + Send + Sync,
    T: Send + Sync + 'static,
{
    type Output = T;

    fn process(&self, parts: &Parts) -> Result<T, ProcessError> {
        (self.0)(parts)
    }
}

/// Wrap a closure as a compound processor
pub fn processor_fn<F, T>(f: F) -> FnProcessor<F>
where
    F: Fn(&Parts) -> Result<T, ProcessError> + Send + Sync,
    T: Send + Sync + 'static,
{
    FnProcessor(f)
}

/// Asset types of the parts of a compound
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartTypes {
    /// Every part has the same type
    Shared(AssetType),
    /// One type per part path, in the same order
    PerPart(Vec<AssetType>),
}

/// Description of a compound asset to build
pub struct CompoundRequest {
    pub(crate) compound_path: AssetPath,
    pub(crate) compound_type: AssetType,
    pub(crate) processor: Arc<dyn ErasedProcessor>,
    pub(crate) part_paths: Vec<AssetPath>,
    pub(crate) part_types: PartTypes,
    pub(crate) source_factory: Option<Arc<dyn SourceFactory>>,
    pub(crate) listeners: Vec<SharedListener>,
}

impl CompoundRequest {
    /// Start describing a compound asset
    pub fn new<P: CompoundProcessor + 'static>(
        compound_path: impl Into<AssetPath>,
        compound_type: AssetType,
        processor: P,
    ) -> Self {
        Self {
            compound_path: compound_path.into(),
            compound_type,
            processor: Arc::new(processor),
            part_paths: Vec::new(),
            part_types: PartTypes::PerPart(Vec::new()),
            source_factory: None,
            listeners: Vec::new(),
        }
    }

    /// Parts that all share one asset type
    pub fn parts<I, S>(mut self, paths: I, part_type: AssetType) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AssetPath>,
    {
        self.part_paths = paths.into_iter().map(Into::into).collect();
        self.part_types = PartTypes::Shared(part_type);
        self
    }

    /// Parts with one asset type each
    pub fn typed_parts<I, S>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = (S, AssetType)>,
        S: Into<AssetPath>,
    {
        let (paths, types): (Vec<AssetPath>, Vec<AssetType>) =
            parts.into_iter().map(|(p, t)| (p.into(), t)).unzip();
        self.part_paths = paths;
        self.part_types = PartTypes::PerPart(types);
        self
    }

    /// Set part paths and types separately
    pub fn part_types(mut self, paths: Vec<AssetPath>, types: PartTypes) -> Self {
        self.part_paths = paths;
        self.part_types = types;
        self
    }

    /// Factory minting a source for each part
    pub fn source_factory<F: SourceFactory + 'static>(mut self, factory: F) -> Self {
        self.source_factory = Some(Arc::new(factory));
        self
    }

    /// Add a listener for the compound asset
    pub fn listener(mut self, listener: SharedListener) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Add several listeners for the compound asset
    pub fn listeners<I: IntoIterator<Item = SharedListener>>(mut self, listeners: I) -> Self {
        self.listeners.extend(listeners);
        self
    }

    /// Compound path
    pub fn path(&self) -> &str {
        &self.compound_path
    }

    /// Check the request and pair each part path with its type
    pub(crate) fn validate(
        &self,
    ) -> Result<(Vec<(AssetPath, AssetType)>, Arc<dyn SourceFactory>), AssetError> {
        if self.part_paths.is_empty() {
            return Err(AssetError::InvalidRequest(format!(
                "compound '{}' has no parts",
                self.compound_path
            )));
        }
        let Some(factory) = self.source_factory.clone() else {
            return Err(AssetError::InvalidRequest(format!(
                "compound '{}' has no source factory",
                self.compound_path
            )));
        };

        let parts = match &self.part_types {
            PartTypes::Shared(t) => self.part_paths.iter().map(|p| (p.clone(), *t)).collect(),
            PartTypes::PerPart(types) if types.len() == self.part_paths.len() => self
                .part_paths
                .iter()
                .cloned()
                .zip(types.iter().copied())
                .collect(),
            PartTypes::PerPart(types) => {
                return Err(AssetError::InvalidRequest(format!(
                    "compound '{}' has {} parts but {} part types",
                    self.compound_path,
                    self.part_paths.len(),
                    types.len()
                )))
            }
        };
        Ok((parts, factory))
    }
}

/// Join lifecycle
#[derive(Debug)]
pub(crate) enum JoinState {
    /// Waiting for parts
    Pending { received: HashMap<AssetPath, ErasedAsset> },
    /// Every part arrived; the processor has been started
    Resolved,
    /// Some part failed before it was received
    Failed { received: HashMap<AssetPath, ErasedAsset> },
}

/// Input to the join state machine
pub(crate) enum JoinEvent {
    PartSucceeded(AssetPath, ErasedAsset),
    PartFailed(AssetPath, AssetError),
}

/// What the join must do after a transition
#[derive(Debug)]
pub(crate) enum JoinAction {
    /// Keep waiting
    Wait,
    /// All parts present: run the processor
    Complete,
    /// Tell the compound's listeners that `part` failed
    Fail { part: AssetPath, error: AssetError },
    /// Event has no effect in the current state
    Ignore,
}

impl JoinState {
    pub(crate) fn new() -> Self {
        JoinState::Pending {
            received: HashMap::new(),
        }
    }

    /// Apply one event. `required` holds the distinct part paths.
    pub(crate) fn on_event(&mut self, event: JoinEvent, required: &HashSet<AssetPath>) -> JoinAction {
        match self {
            JoinState::Pending { received } => match event {
                JoinEvent::PartSucceeded(path, asset) => {
                    received.insert(path, asset);
                    if required.iter().all(|p| received.contains_key(p)) {
                        *self = JoinState::Resolved;
                        JoinAction::Complete
                    } else {
                        JoinAction::Wait
                    }
                }
                JoinEvent::PartFailed(path, error) => {
                    if received.contains_key(&path) {
                        return JoinAction::Ignore;
                    }
                    let received = std::mem::take(received);
                    *self = JoinState::Failed { received };
                    JoinAction::Fail { part: path, error }
                }
            },
            JoinState::Resolved => JoinAction::Ignore,
            JoinState::Failed { received } => match event {
                JoinEvent::PartSucceeded(path, asset) => {
                    received.insert(path, asset);
                    JoinAction::Ignore
                }
                JoinEvent::PartFailed(path, error) => {
                    if received.contains_key(&path) {
                        JoinAction::Ignore
                    } else {
                        JoinAction::Fail { part: path, error }
                    }
                }
            },
        }
    }

    #[cfg(test)]
    pub(crate) fn is_settled(&self) -> bool {
        !matches!(self, JoinState::Pending { .. })
    }
}

/// Runtime state of one compound request
pub(crate) struct CompoundJoin {
    compound_path: AssetPath,
    compound_type: AssetType,
    part_paths: Vec<AssetPath>,
    required: HashSet<AssetPath>,
    processor: Arc<dyn ErasedProcessor>,
    /// Carries the compound's own listeners
    notify: AssetRequest,
    cache: Arc<AssetCache>,
    /// Guards cache writes like the dispatcher does; weak since queued part
    /// requests hold the join
    queue: Weak<Mutex<RequestQueue>>,
    stats: Arc<StatCounters>,
    state: Mutex<JoinState>,
}

impl CompoundJoin {
    pub(crate) fn new(
        request: CompoundRequest,
        cache: Arc<AssetCache>,
        queue: Weak<Mutex<RequestQueue>>,
        stats: Arc<StatCounters>,
    ) -> Self {
        let required = request.part_paths.iter().cloned().collect();
        let notify = AssetRequest::detached(
            request.compound_path.clone(),
            request.compound_type,
            request.listeners,
        );
        Self {
            compound_path: request.compound_path,
            compound_type: request.compound_type,
            part_paths: request.part_paths,
            required,
            processor: request.processor,
            notify,
            cache,
            queue,
            stats,
            state: Mutex::new(JoinState::new()),
        }
    }

    /// Feed one part outcome into the state machine and act on the result
    pub(crate) fn handle(&self, event: JoinEvent) {
        // Side effects run after the lock is released: listeners may re-enter.
        let action = self.state.lock().on_event(event, &self.required);
        match action {
            JoinAction::Complete => self.resolve(),
            JoinAction::Fail { part, error } => self.fail(part, error),
            JoinAction::Wait | JoinAction::Ignore => {}
        }
    }

    fn resolve(&self) {
        let parts = Parts::new(&self.part_paths, &self.cache);
        let result = catch_panic(|| self.processor.process_erased(&parts))
            .unwrap_or_else(|message| Err(ProcessError::Custom(format!("processor panicked: {}", message))));
        match result {
            Ok(asset) => {
                {
                    let queue = self.queue.upgrade();
                    let _queue = queue.as_ref().map(|queue| queue.lock());
                    self.cache.put(self.compound_path.clone(), self.compound_type, asset);
                }
                self.stats.compounds_resolved.fetch_add(1, Ordering::Relaxed);
                log::info!(
                    "Resolved compound asset: {} ({} parts)",
                    self.compound_path,
                    self.required.len()
                );
                self.notify.notify_available();
            }
            Err(source) => {
                self.stats.compounds_failed.fetch_add(1, Ordering::Relaxed);
                log::warn!("Failed to process compound asset {}: {}", self.compound_path, source);
                let error = AssetError::ProcessingFailed {
                    compound: self.compound_path.clone(),
                    source,
                };
                self.notify.notify_not_available(&error);
            }
        }
    }

    fn fail(&self, part: AssetPath, error: AssetError) {
        self.stats.compounds_failed.fetch_add(1, Ordering::Relaxed);
        log::warn!(
            "Compound asset {} failed on part {}: {}",
            self.compound_path,
            part,
            error
        );
        let error = AssetError::PartFailed {
            compound: self.compound_path.clone(),
            part,
            source: Box::new(error),
        };
        self.notify.notify_not_available(&error);
    }

    #[cfg(test)]
    pub(crate) fn is_settled(&self) -> bool {
        self.state.lock().is_settled()
    }
}

/// Adapter registered as the sole listener on every part request of a join
pub(crate) struct PartListener {
    join: Arc<CompoundJoin>,
}

impl PartListener {
    pub(crate) fn new(join: Arc<CompoundJoin>) -> Self {
        Self { join }
    }
}

impl AssetListener for PartListener {
    fn available(&self, request: &AssetRequest) {
        let path = request.path().to_string();
        let event = match self.join.cache.get(&path) {
            Ok(asset) => JoinEvent::PartSucceeded(path, asset),
            Err(error) => JoinEvent::PartFailed(path, error),
        };
        self.join.handle(event);
    }

    fn not_available(&self, request: &AssetRequest, error: &AssetError) {
        self.join
            .handle(JoinEvent::PartFailed(request.path().to_string(), error.clone()));
    }
}
