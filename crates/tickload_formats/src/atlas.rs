//! Texture atlas - a compound texture packed from independently loaded parts
//!
//! Parts are packed onto shelves left to right in part-path order, so the
//! layout depends only on the order of the request's part paths, never on the
//! order in which the parts finished loading.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use tickload::{CompoundProcessor, CompoundRequest, Parts, ProcessError, SourceFactory};

use crate::kinds::{TEXTURE, TEXTURE_ATLAS};
use crate::texture::TextureAsset;

/// Where one part ended up inside the atlas
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AtlasRegion {
    /// Part path the region was packed from
    pub path: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Normalized `[u0, v0, u1, v1]`
    pub uv: [f32; 4],
}

/// Packed texture plus the region of every part
#[derive(Clone, Debug)]
pub struct TextureAtlas {
    pub texture: TextureAsset,
    pub regions: Vec<AtlasRegion>,
}

impl TextureAtlas {
    /// Find the region packed from a part path
    pub fn region(&self, path: &str) -> Option<&AtlasRegion> {
        self.regions.iter().find(|r| r.path == path)
    }
}

/// Shelf packer producing a [`TextureAtlas`]
#[derive(Clone, Debug)]
pub struct AtlasProcessor {
    /// Transparent pixels around every region
    pub padding: u32,
    /// Widest the atlas may grow before starting a new shelf
    pub max_width: u32,
}

impl Default for AtlasProcessor {
    fn default() -> Self {
        Self {
            padding: 1,
            max_width: 2048,
        }
    }
}

impl AtlasProcessor {
    /// Create a processor
    pub fn new(padding: u32, max_width: u32) -> Self {
        Self { padding, max_width }
    }

    /// Build the compound request for an atlas of texture parts
    pub fn request<I, S, F>(self, name: &str, parts: I, factory: F) -> CompoundRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: SourceFactory + 'static,
    {
        CompoundRequest::new(name, TEXTURE_ATLAS, self)
            .parts(parts, TEXTURE)
            .source_factory(factory)
    }

    /// Pack textures in the given order
    pub fn pack(&self, textures: &[(&str, Arc<TextureAsset>)]) -> Result<TextureAtlas, ProcessError> {
        let pad = self.padding;
        let mut regions = Vec::with_capacity(textures.len());
        let (mut x, mut y) = (pad, pad);
        let mut shelf_height = 0;
        let mut width = 0;

        for (path, texture) in textures {
            if !texture.is_valid() {
                return Err(ProcessError::Invalid(format!(
                    "texture '{}' has a short pixel buffer",
                    path
                )));
            }
            let fits = pad
                .checked_mul(2)
                .and_then(|p| p.checked_add(texture.width))
                .is_some_and(|w| w <= self.max_width);
            if !fits {
                return Err(ProcessError::Invalid(format!(
                    "texture '{}' is {} wide, atlas limit is {}",
                    path, texture.width, self.max_width
                )));
            }

            if x.checked_add(texture.width + pad).map_or(true, |end| end > self.max_width) {
                x = pad;
                y = y
                    .checked_add(shelf_height)
                    .and_then(|y| y.checked_add(pad))
                    .ok_or_else(|| too_large(path))?;
                shelf_height = 0;
            }

            regions.push(AtlasRegion {
                path: path.to_string(),
                x,
                y,
                width: texture.width,
                height: texture.height,
                uv: [0.0; 4],
            });

            x += texture.width + pad;
            shelf_height = shelf_height.max(texture.height);
            width = width.max(x);
        }
        let height = y
            .checked_add(shelf_height)
            .and_then(|h| h.checked_add(pad))
            .ok_or_else(|| too_large("atlas"))?;
        width.checked_mul(4).ok_or_else(|| too_large("atlas"))?;
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| too_large("atlas"))?;

        let mut atlas = TextureAsset::from_rgba(width, height, vec![0; len], true);
        for ((_, texture), region) in textures.iter().zip(regions.iter_mut()) {
            blit(&mut atlas, texture, region.x, region.y);
            region.uv = [
                region.x as f32 / width as f32,
                region.y as f32 / height as f32,
                (region.x + region.width) as f32 / width as f32,
                (region.y + region.height) as f32 / height as f32,
            ];
        }

        Ok(TextureAtlas {
            texture: atlas,
            regions,
        })
    }
}

impl CompoundProcessor for AtlasProcessor {
    type Output = TextureAtlas;

    fn process(&self, parts: &Parts) -> Result<TextureAtlas, ProcessError> {
        let mut textures = Vec::new();
        for path in parts.distinct_paths() {
            textures.push((path, parts.get_as::<TextureAsset>(path)?));
        }
        let atlas = self.pack(&textures)?;
        log::debug!(
            "Packed {} texture(s) into {}x{} atlas",
            atlas.regions.len(),
            atlas.texture.width,
            atlas.texture.height
        );
        Ok(atlas)
    }
}

fn too_large(path: &str) -> ProcessError {
    ProcessError::Invalid(format!("packing '{}' overflows the atlas size", path))
}

fn blit(dst: &mut TextureAsset, src: &TextureAsset, x: u32, y: u32) {
    let row_len = src.width as usize * 4;
    for row in 0..src.height {
        let start = (y + row) as usize * dst.bytes_per_row as usize + x as usize * 4;
        dst.data[start..start + row_len].copy_from_slice(src.row(row));
    }
}
