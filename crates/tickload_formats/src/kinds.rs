//! Asset type tags and manager helpers for the bundled formats

use std::sync::Arc;

use tickload::{AssetError, AssetManager, AssetManagerBuilder, AssetType};

use crate::atlas::TextureAtlas;
use crate::mesh::MeshAsset;
use crate::texture::{TextureAsset, TextureLoader};

/// Decoded image, stored as [`TextureAsset`]
pub const TEXTURE: AssetType = AssetType::new("texture");

/// Host-decoded mesh, stored as [`MeshAsset`]
pub const MESH: AssetType = AssetType::new("mesh");

/// Packed atlas, stored as [`TextureAtlas`]
pub const TEXTURE_ATLAS: AssetType = AssetType::new("texture_atlas");

/// Colour texture with mask alpha, stored as [`TextureAsset`]
pub const MASKED_TEXTURE: AssetType = AssetType::new("masked_texture");

/// Register the bundled loaders
pub fn register_default_loaders(builder: AssetManagerBuilder) -> AssetManagerBuilder {
    builder.register_loader(TEXTURE, TextureLoader::default())
}

/// Typed getters for the bundled asset types
pub trait FormatAssets {
    /// Get a cached texture (plain or masked)
    fn get_texture(&self, path: &str) -> Result<Arc<TextureAsset>, AssetError>;

    /// Get a cached mesh
    fn get_mesh(&self, path: &str) -> Result<Arc<MeshAsset>, AssetError>;

    /// Get a cached atlas
    fn get_atlas(&self, path: &str) -> Result<Arc<TextureAtlas>, AssetError>;
}

impl FormatAssets for AssetManager {
    fn get_texture(&self, path: &str) -> Result<Arc<TextureAsset>, AssetError> {
        self.get_asset_as::<TextureAsset>(path)
    }

    fn get_mesh(&self, path: &str) -> Result<Arc<MeshAsset>, AssetError> {
        self.get_asset_as::<MeshAsset>(path)
    }

    fn get_atlas(&self, path: &str) -> Result<Arc<TextureAtlas>, AssetError> {
        self.get_asset_as::<TextureAtlas>(path)
    }
}
