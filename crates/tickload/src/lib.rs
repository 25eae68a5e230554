//! # tickload - Tick-Driven Asset Pipeline
//!
//! Asset loading with:
//! - A path keyed cache answering hits synchronously
//! - A FIFO request queue drained one request per tick
//! - Pluggable loaders selected by asset type
//! - Compound assets joined from independently loaded parts
//!
//! ## Example
//!
//! ```ignore
//! use tickload::prelude::*;
//! use tickload::loaders::{TextLoader, TEXT};
//!
//! let manager = AssetManager::builder()
//!     .register_loader(TEXT, TextLoader)
//!     .build();
//!
//! let (listener, events) = ChannelListener::new();
//! manager.request_asset(
//!     "notes/readme.txt",
//!     TEXT,
//!     Box::new(FileSource::new("assets/notes/readme.txt")),
//!     [listener],
//! );
//!
//! // Each frame
//! manager.tick();
//!
//! if let Ok(event) = events.try_recv() {
//!     let text = manager.get_asset_as::<String>(event.path())?;
//! }
//! ```

pub mod asset;
pub mod cache;
pub mod dispatcher;
pub mod error;
pub mod join;
pub mod listener;
pub mod loader;
pub mod manager;
pub mod request;
pub mod source;

pub use asset::{extension_of, AssetPath, AssetType, ErasedAsset};
pub use cache::AssetCache;
pub use dispatcher::TickOutcome;
pub use error::{AssetError, LoadError, LoadResult, ProcessError};
pub use join::{processor_fn, CompoundProcessor, CompoundRequest, ErasedProcessor, FnProcessor, PartTypes, Parts};
pub use listener::{listener_fn, AssetEvent, AssetListener, ChannelListener, FnListener, SharedListener};
pub use loader::{AssetLoader, ErasedLoader, LoadContext, LoaderRegistry};
pub use manager::{AssetManager, AssetManagerBuilder, AssetManagerConfig, AssetStats, RequestStatus};
pub use request::AssetRequest;
pub use source::{DirSourceFactory, FileSource, MemorySource, Source, SourceFactory};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::asset::{AssetPath, AssetType};
    pub use crate::error::{AssetError, LoadError, LoadResult, ProcessError};
    pub use crate::join::{processor_fn, CompoundProcessor, CompoundRequest, PartTypes, Parts};
    pub use crate::listener::{listener_fn, AssetEvent, AssetListener, ChannelListener, SharedListener};
    pub use crate::loader::{AssetLoader, LoadContext};
    pub use crate::manager::{AssetManager, AssetManagerConfig, RequestStatus};
    pub use crate::source::{DirSourceFactory, FileSource, MemorySource, Source};
    pub use crate::dispatcher::TickOutcome;
}

/// Built-in loaders for untyped data
pub mod loaders {
    use super::*;

    /// Raw bytes, stored as `Vec<u8>`
    pub const BYTES: AssetType = AssetType::new("bytes");

    /// UTF-8 text, stored as `String`
    pub const TEXT: AssetType = AssetType::new("text");

    /// Bytes loader
    pub struct BytesLoader;

    impl AssetLoader for BytesLoader {
        type Asset = Vec<u8>;

        fn extensions(&self) -> &[&str] {
            &["bin", "dat"]
        }

        fn load(&self, ctx: &mut LoadContext) -> LoadResult<Self::Asset> {
            ctx.read_bytes()
        }
    }

    /// Text loader
    pub struct TextLoader;

    impl AssetLoader for TextLoader {
        type Asset = String;

        fn extensions(&self) -> &[&str] {
            &["txt", "text", "md", "json", "toml"]
        }

        fn load(&self, ctx: &mut LoadContext) -> LoadResult<Self::Asset> {
            ctx.read_string()
        }
    }
}
