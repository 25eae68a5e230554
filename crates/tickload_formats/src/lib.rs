//! # tickload_formats
//!
//! Concrete loaders and compound processors for `tickload`.
//!
//! ## Features
//!
//! - **Textures**: PNG, JPG, BMP and HDR decoded to RGBA8 through `image`
//! - **Meshes**: a `Pod` vertex layout for host-provided mesh loaders
//! - **Atlases**: shelf-packed texture atlases built from texture parts
//! - **Masked textures**: alpha from a second, grayscale part
//!
//! ## Example
//!
//! ```ignore
//! use tickload::{AssetManager, DirSourceFactory};
//! use tickload_formats::{register_default_loaders, AtlasProcessor, FormatAssets};
//!
//! let manager = register_default_loaders(AssetManager::builder()).build();
//!
//! let request = AtlasProcessor::new(1, 1024)
//!     .request("ui", ["ui/ok.png", "ui/cancel.png"], DirSourceFactory::new("assets"));
//! manager.request_compound_asset(request)?;
//! manager.tick_until_idle();
//!
//! let atlas = manager.get_atlas("ui")?;
//! ```

pub mod atlas;
pub mod kinds;
pub mod masked;
pub mod mesh;
pub mod texture;

pub use atlas::{AtlasProcessor, AtlasRegion, TextureAtlas};
pub use kinds::{register_default_loaders, FormatAssets, MASKED_TEXTURE, MESH, TEXTURE, TEXTURE_ATLAS};
pub use masked::MaskedTextureProcessor;
pub use mesh::{Bounds, MeshAsset, Vertex};
pub use texture::{TextureAsset, TextureLoader};
