//! Simple requests and the pending request queue

use std::collections::VecDeque;
use std::fmt;

use crate::asset::{AssetPath, AssetType};
use crate::error::{catch_panic, AssetError};
use crate::listener::SharedListener;
use crate::source::Source;

/// Immutable descriptor of one asset load and who wants to hear about it
///
/// Every listener on a request receives exactly one terminal notification for
/// it: `available` or `not_available`.
pub struct AssetRequest {
    path: AssetPath,
    asset_type: AssetType,
    source: Option<Box<dyn Source>>,
    listeners: Vec<SharedListener>,
}

impl AssetRequest {
    /// Create a new request
    pub fn new(
        path: impl Into<AssetPath>,
        asset_type: AssetType,
        source: Box<dyn Source>,
        listeners: Vec<SharedListener>,
    ) -> Self {
        Self {
            path: path.into(),
            asset_type,
            source: Some(source),
            listeners,
        }
    }

    /// Request with no source, used to notify the listeners of compound assets
    pub(crate) fn detached(
        path: impl Into<AssetPath>,
        asset_type: AssetType,
        listeners: Vec<SharedListener>,
    ) -> Self {
        Self {
            path: path.into(),
            asset_type,
            source: None,
            listeners,
        }
    }

    /// Asset path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Asset type tag
    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    /// The source the asset is read from. `None` for compound assets.
    pub fn source(&self) -> Option<&dyn Source> {
        self.source.as_deref()
    }

    pub(crate) fn source_mut(&mut self) -> Option<&mut (dyn Source + 'static)> {
        self.source.as_deref_mut()
    }

    /// Number of listeners attached
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // A panicking listener is logged and skipped; the rest still hear back.
    pub(crate) fn notify_available(&self) {
        for listener in &self.listeners {
            if let Err(message) = catch_panic(|| listener.available(self)) {
                log::error!("Listener panicked on {} available: {}", self.path, message);
            }
        }
    }

    pub(crate) fn notify_not_available(&self, error: &AssetError) {
        for listener in &self.listeners {
            if let Err(message) = catch_panic(|| listener.not_available(self, error)) {
                log::error!("Listener panicked on {} not available: {}", self.path, message);
            }
        }
    }
}

impl fmt::Debug for AssetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRequest")
            .field("path", &self.path)
            .field("asset_type", &self.asset_type)
            .field("source", &self.source.as_ref().map(|s| s.describe()))
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// FIFO of requests waiting for the dispatcher
#[derive(Debug, Default)]
pub(crate) struct RequestQueue {
    pending: VecDeque<AssetRequest>,
}

impl RequestQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a request, returning its zero-based position
    pub(crate) fn push(&mut self, request: AssetRequest) -> usize {
        self.pending.push_back(request);
        self.pending.len() - 1
    }

    pub(crate) fn pop(&mut self) -> Option<AssetRequest> {
        self.pending.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    /// Drop every pending request without notifying anyone
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}
