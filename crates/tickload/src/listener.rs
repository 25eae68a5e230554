//! Listeners - consumer callbacks for request outcomes
//!
//! A listener may be invoked on the requesting thread (cache hit, before
//! `request_asset` returns) or on the dispatcher thread (cache miss, on a later
//! tick). Implementations must be fine with either.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::asset::{AssetPath, AssetType};
use crate::error::AssetError;
use crate::request::AssetRequest;

/// Callback pair notified when a request resolves
pub trait AssetListener: Send + Sync {
    /// The asset is in the cache (or was passed through)
    fn available(&self, request: &AssetRequest);

    /// The asset could not be produced
    fn not_available(&self, request: &AssetRequest, error: &AssetError);
}

/// Shared listener handle
pub type SharedListener = Arc<dyn AssetListener>;

/// Listener built from two closures
pub struct FnListener<A, N> {
    on_available: A,
    on_not_available: N,
}

impl<A, N> AssetListener for FnListener<A, N>
where
    A: Fn(&AssetRequest) + Send + Sync,
    N: Fn(&AssetRequest, &AssetError) + Send + Sync,
{
    fn available(&self, request: &AssetRequest) {
        (self.on_available)(request)
    }

    fn not_available(&self, request: &AssetRequest, error: &AssetError) {
        (self.on_not_available)(request, error)
    }
}

/// Build a shared listener from two closures
pub fn listener_fn<A, N>(on_available: A, on_not_available: N) -> SharedListener
where
    A: Fn(&AssetRequest) + Send + Sync + 'static,
    N: Fn(&AssetRequest, &AssetError) + Send + Sync + 'static,
{
    Arc::new(FnListener {
        on_available,
        on_not_available,
    })
}

/// Outcome of a request as seen by a [`ChannelListener`]
#[derive(Clone, Debug)]
pub enum AssetEvent {
    /// Asset is ready
    Available {
        path: AssetPath,
        asset_type: AssetType,
    },
    /// Asset failed
    NotAvailable {
        path: AssetPath,
        asset_type: AssetType,
        error: AssetError,
    },
}

impl AssetEvent {
    /// Path of the request this event is about
    pub fn path(&self) -> &str {
        match self {
            AssetEvent::Available { path, .. } | AssetEvent::NotAvailable { path, .. } => path,
        }
    }

    /// Whether the asset became available
    pub fn is_available(&self) -> bool {
        matches!(self, AssetEvent::Available { .. })
    }
}

/// Listener that forwards outcomes into a channel
pub struct ChannelListener {
    tx: Sender<AssetEvent>,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its channel
    pub fn new() -> (SharedListener, Receiver<AssetEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Arc::new(Self { tx }), rx)
    }
}

impl AssetListener for ChannelListener {
    fn available(&self, request: &AssetRequest) {
        let _ = self.tx.send(AssetEvent::Available {
            path: request.path().to_string(),
            asset_type: request.asset_type(),
        });
    }

    fn not_available(&self, request: &AssetRequest, error: &AssetError) {
        let _ = self.tx.send(AssetEvent::NotAvailable {
            path: request.path().to_string(),
            asset_type: request.asset_type(),
            error: error.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TEXT: AssetType = AssetType::new("text");

    #[test]
    fn test_fn_listener() {
        let hits = Arc::new(AtomicUsize::new(0));
        let misses = Arc::new(AtomicUsize::new(0));
        let listener = {
            let hits = hits.clone();
            let misses = misses.clone();
            listener_fn(
                move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                },
                move |_, _| {
                    misses.fetch_add(1, Ordering::SeqCst);
                },
            )
        };

        let request = AssetRequest::detached("a.txt", TEXT, vec![listener]);
        request.notify_available();
        request.notify_not_available(&AssetError::NotCached("a.txt".into()));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(misses.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_channel_listener() {
        let (listener, rx) = ChannelListener::new();
        let request = AssetRequest::detached("a.txt", TEXT, vec![listener]);

        request.notify_available();
        request.notify_not_available(&AssetError::NotCached("a.txt".into()));

        let first = rx.try_recv().unwrap();
        assert!(first.is_available());
        assert_eq!(first.path(), "a.txt");

        match rx.try_recv().unwrap() {
            AssetEvent::NotAvailable { error, .. } => {
                assert!(matches!(error, AssetError::NotCached(_)))
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }
}
