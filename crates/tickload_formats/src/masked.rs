//! Masked texture - colour part with alpha taken from a mask part

use tickload::{CompoundProcessor, Parts, ProcessError};

use crate::texture::TextureAsset;

/// Combines `[color, mask]` parts of equal size
///
/// The output keeps the colour's RGB and replaces alpha with the luminance of
/// the mask.
#[derive(Clone, Copy, Debug, Default)]
pub struct MaskedTextureProcessor;

impl MaskedTextureProcessor {
    /// Apply `mask` to `color`
    pub fn combine(color: &TextureAsset, mask: &TextureAsset) -> Result<TextureAsset, ProcessError> {
        if (color.width, color.height) != (mask.width, mask.height) {
            return Err(ProcessError::Invalid(format!(
                "mask is {}x{}, colour is {}x{}",
                mask.width, mask.height, color.width, color.height
            )));
        }
        if !color.is_valid() || !mask.is_valid() {
            return Err(ProcessError::Invalid("short pixel buffer".into()));
        }

        let mut data = Vec::with_capacity((color.width * color.height * 4) as usize);
        for y in 0..color.height {
            for (c, m) in color.row(y).chunks_exact(4).zip(mask.row(y).chunks_exact(4)) {
                data.extend_from_slice(&[c[0], c[1], c[2], luminance(m[0], m[1], m[2])]);
            }
        }

        Ok(TextureAsset::from_rgba(color.width, color.height, data, color.srgb))
    }
}

/// Rec. 601 luma, rounded
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8
}

impl CompoundProcessor for MaskedTextureProcessor {
    type Output = TextureAsset;

    fn process(&self, parts: &Parts) -> Result<TextureAsset, ProcessError> {
        let [color, mask] = parts.paths() else {
            return Err(ProcessError::Invalid(format!(
                "expected [color, mask] parts, got {}",
                parts.len()
            )));
        };
        let color = parts.get_as::<TextureAsset>(color)?;
        let mask = parts.get_as::<TextureAsset>(mask)?;
        Self::combine(&color, &mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_from_mask_luminance() {
        let color = TextureAsset::from_rgba(2, 1, vec![10, 20, 30, 255, 40, 50, 60, 255], true);
        let mask = TextureAsset::from_rgba(2, 1, vec![255, 255, 255, 255, 0, 0, 0, 255], false);

        let out = MaskedTextureProcessor::combine(&color, &mask).unwrap();
        assert_eq!(out.pixel(0, 0), Some([10, 20, 30, 255]));
        assert_eq!(out.pixel(1, 0), Some([40, 50, 60, 0]));
        assert!(out.srgb);
    }

    #[test]
    fn test_size_mismatch() {
        let color = TextureAsset::solid_color(1, 2, 3, 4);
        let mask = TextureAsset::checkerboard(2, 1, [0; 4], [255; 4]);

        assert!(matches!(
            MaskedTextureProcessor::combine(&color, &mask),
            Err(ProcessError::Invalid(_))
        ));
    }

    #[test]
    fn test_luminance() {
        assert_eq!(luminance(0, 0, 0), 0);
        assert_eq!(luminance(255, 255, 255), 255);
        assert_eq!(luminance(255, 0, 0), 76);
    }
}
