//! Texture loader for PNG, JPG, BMP images

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageError};

use tickload::{AssetLoader, LoadContext, LoadError, LoadResult};

/// Decoded RGBA8 texture
#[derive(Clone, Debug, PartialEq)]
pub struct TextureAsset {
    /// Raw RGBA pixel data, rows tightly packed
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes per row (width * 4 for RGBA)
    pub bytes_per_row: u32,
    /// Whether texture uses sRGB color space
    pub srgb: bool,
    /// Mipmap levels below the base, largest first
    pub mips: Vec<Vec<u8>>,
}

impl TextureAsset {
    /// Wrap tightly packed RGBA8 pixels
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>, srgb: bool) -> Self {
        Self {
            data,
            width,
            height,
            bytes_per_row: width * 4,
            srgb,
            mips: Vec::new(),
        }
    }

    /// Check the pixel buffer covers every row
    pub fn is_valid(&self) -> bool {
        self.width.checked_mul(4).is_some_and(|row| self.bytes_per_row >= row)
            && self.data.len() >= self.bytes_per_row as usize * self.height as usize
    }

    /// RGBA of one pixel
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y * self.bytes_per_row + x * 4) as usize;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Pixels of one row, without row padding
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.bytes_per_row as usize;
        &self.data[start..start + self.width as usize * 4]
    }

    /// Create a 1x1 solid color texture
    pub fn solid_color(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::from_rgba(1, 1, vec![r, g, b, a], true)
    }

    /// Create a checkerboard pattern texture
    pub fn checkerboard(size: u32, tile_size: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let tile_size = tile_size.max(1);
        let mut data = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let color = if (x / tile_size + y / tile_size) % 2 == 0 {
                    color1
                } else {
                    color2
                };
                data.extend_from_slice(&color);
            }
        }

        Self::from_rgba(size, size, data, true)
    }
}

/// Loader for image textures
#[derive(Clone, Debug)]
pub struct TextureLoader {
    /// Generate mipmaps on load
    pub generate_mips: bool,
    /// Interpret as sRGB
    pub srgb: bool,
}

impl Default for TextureLoader {
    fn default() -> Self {
        Self {
            generate_mips: false,
            srgb: true,
        }
    }
}

impl TextureLoader {
    /// Create a new texture loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable mip chain generation
    pub fn with_mips(mut self) -> Self {
        self.generate_mips = true;
        self
    }

    /// Decode a texture from encoded image bytes
    pub fn decode(&self, data: &[u8], path: &str) -> LoadResult<TextureAsset> {
        let img = image::load_from_memory(data).map_err(|e| match e {
            ImageError::Unsupported(e) => {
                LoadError::UnsupportedFormat(format!("{}: {}", path, e))
            }
            e => LoadError::Parse(format!("Failed to decode image {}: {}", path, e)),
        })?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mips = if self.generate_mips {
            Self::generate_mip_chain(&img)
        } else {
            Vec::new()
        };

        let mut texture = TextureAsset::from_rgba(width, height, rgba.into_raw(), self.srgb);
        texture.mips = mips;
        Ok(texture)
    }

    /// Halve the image until it is 1x1
    fn generate_mip_chain(img: &DynamicImage) -> Vec<Vec<u8>> {
        let mut mips = Vec::new();
        let (mut w, mut h) = img.dimensions();
        let mut current = img.clone();

        while w > 1 || h > 1 {
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            current = current.resize_exact(w, h, FilterType::Triangle);
            mips.push(current.to_rgba8().into_raw());
        }

        mips
    }
}

impl AssetLoader for TextureLoader {
    type Asset = TextureAsset;

    fn extensions(&self) -> &[&str] {
        &["png", "jpg", "jpeg", "bmp", "hdr"]
    }

    fn load(&self, ctx: &mut LoadContext) -> LoadResult<TextureAsset> {
        let data = ctx.read_bytes()?;
        let texture = self.decode(&data, ctx.path())?;
        log::debug!(
            "Decoded texture {} ({}x{}, {} mips)",
            ctx.path(),
            texture.width,
            texture.height,
            texture.mips.len()
        );
        Ok(texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let texture = TextureLoader::new()
            .decode(&png(3, 2, [10, 20, 30, 255]), "a.png")
            .unwrap();

        assert_eq!((texture.width, texture.height), (3, 2));
        assert_eq!(texture.bytes_per_row, 12);
        assert_eq!(texture.data.len(), 24);
        assert_eq!(texture.pixel(2, 1), Some([10, 20, 30, 255]));
        assert!(texture.mips.is_empty());
    }

    #[test]
    fn test_mip_chain() {
        let texture = TextureLoader::new()
            .with_mips()
            .decode(&png(8, 4, [255, 0, 0, 255]), "a.png")
            .unwrap();

        // 4x2, 2x1, 1x1
        let sizes: Vec<usize> = texture.mips.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4 * 2 * 4, 2 * 4, 4]);
    }

    #[test]
    fn test_garbage_is_error() {
        let result = TextureLoader::new().decode(b"definitely not an image", "bad.png");
        assert!(matches!(
            result,
            Err(LoadError::Parse(_)) | Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_checkerboard() {
        let texture = TextureAsset::checkerboard(4, 2, [255; 4], [0, 0, 0, 255]);

        assert!(texture.is_valid());
        assert_eq!(texture.pixel(0, 0), Some([255; 4]));
        assert_eq!(texture.pixel(2, 0), Some([0, 0, 0, 255]));
        assert_eq!(texture.pixel(2, 2), Some([255; 4]));
        assert_eq!(texture.pixel(4, 0), None);
    }
}
