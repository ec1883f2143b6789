//! Texture pixel data
//!
//! Textures are decoded to tightly packed RGBA8 on the CPU. Only RGB and RGBA
//! sources are accepted; RGB data gets an opaque alpha channel.

use std::path::Path;

use thiserror::Error;

/// Texture loading errors
#[derive(Error, Debug)]
pub enum TextureError {
    /// The file could not be opened or decoded
    #[error("Failed to load texture {path}: {source}")]
    LoadFailed {
        /// File that failed to load
        path: String,
        /// Decoder error
        #[source]
        source: image::ImageError,
    },

    /// In-memory image data could not be decoded
    #[error("Failed to decode texture data: {0}")]
    Decode(#[from] image::ImageError),

    /// The image has a channel layout other than RGB or RGBA
    #[error("Unsupported channel count {0}, only RGB and RGBA textures are supported")]
    UnsupportedChannels(u8),
}

/// Linear RGBA color with components in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RgbaColor {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl RgbaColor {
    /// Create a color
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    fn to_bytes(self) -> [u8; 4] {
        // Float-to-int `as` saturates, so out-of-range components clamp.
        [
            (self.r * 255.0) as u8,
            (self.g * 255.0) as u8,
            (self.b * 255.0) as u8,
            (self.a * 255.0) as u8,
        ]
    }
}

const SOLID_COLOR_SIZE: u32 = 4;

/// RGBA8 texture ready for GPU upload
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    width: u32,
    height: u32,
    srgb: bool,
    pixels: Vec<u8>,
}

impl Texture {
    /// Load a texture from an image file
    pub fn from_file(path: impl AsRef<Path>, srgb: bool) -> Result<Self, TextureError> {
        let path = path.as_ref();
        log::debug!("Loading texture from: {:?}", path);

        let image = image::open(path).map_err(|source| TextureError::LoadFailed {
            path: path.display().to_string(),
            source,
        })?;

        let texture = Self::from_image(image, srgb)?;
        log::info!("Loaded texture {}x{} from {:?}", texture.width, texture.height, path);
        Ok(texture)
    }

    /// Decode a texture from encoded image bytes (PNG)
    pub fn from_bytes(bytes: &[u8], srgb: bool) -> Result<Self, TextureError> {
        let image = image::load_from_memory(bytes)?;
        Self::from_image(image, srgb)
    }

    fn from_image(image: image::DynamicImage, srgb: bool) -> Result<Self, TextureError> {
        match image.color().channel_count() {
            3 | 4 => {
                let rgba = image.to_rgba8();
                let (width, height) = rgba.dimensions();
                Ok(Self {
                    width,
                    height,
                    srgb,
                    pixels: rgba.into_raw(),
                })
            }
            other => Err(TextureError::UnsupportedChannels(other)),
        }
    }

    /// 4×4 linear texture filled with one color
    pub fn solid_color(color: RgbaColor) -> Self {
        let texel = color.to_bytes();
        let pixels = texel
            .iter()
            .copied()
            .cycle()
            .take((SOLID_COLOR_SIZE * SOLID_COLOR_SIZE * 4) as usize)
            .collect();

        Self {
            width: SOLID_COLOR_SIZE,
            height: SOLID_COLOR_SIZE,
            srgb: false,
            pixels,
        }
    }

    /// Width in texels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in texels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the pixel data is sRGB encoded
    pub fn is_srgb(&self) -> bool {
        self.srgb
    }

    /// RGBA8 pixel data, `width * height * 4` bytes
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(file: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("b3_engine_texture_{}_{}", std::process::id(), file))
    }

    #[test]
    fn test_solid_color_fills_every_texel() {
        let texture = Texture::solid_color(RgbaColor::new(0.0, 1.0, 0.0, 1.0));

        assert_eq!(texture.width(), 4);
        assert_eq!(texture.height(), 4);
        assert!(!texture.is_srgb());
        assert_eq!(texture.pixels().len(), 4 * 4 * 4);
        for texel in texture.pixels().chunks_exact(4) {
            assert_eq!(texel, &[0, 255, 0, 255]);
        }
    }

    #[test]
    fn test_rgb_file_gets_opaque_alpha() {
        let path = temp_path("rgb.png");
        image::RgbImage::from_pixel(2, 3, image::Rgb([10, 20, 30])).save(&path).unwrap();

        let texture = Texture::from_file(&path, true).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!((texture.width(), texture.height()), (2, 3));
        assert!(texture.is_srgb());
        for texel in texture.pixels().chunks_exact(4) {
            assert_eq!(texel, &[10, 20, 30, 255]);
        }
    }

    #[test]
    fn test_rgba_file_is_copied() {
        let path = temp_path("rgba.png");
        image::RgbaImage::from_pixel(1, 1, image::Rgba([1, 2, 3, 4])).save(&path).unwrap();

        let texture = Texture::from_file(&path, false).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(texture.pixels(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_grayscale_is_rejected() {
        let path = temp_path("gray.png");
        image::GrayImage::from_pixel(2, 2, image::Luma([7])).save(&path).unwrap();

        let result = Texture::from_file(&path, false);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(TextureError::UnsupportedChannels(1))));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = Texture::from_file(temp_path("missing.png"), false);
        assert!(matches!(result, Err(TextureError::LoadFailed { .. })));
    }
}
