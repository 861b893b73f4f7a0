//! Rendered RGBA images.

use image::{imageops, Rgba, RgbaImage};
use map_common::{ImageSize, PixelBox};

use crate::engine::EngineError;
use crate::png::create_png_auto;

/// Size of the image returned when no real render is possible.
pub const FALLBACK_SIZE: u32 = 256;

/// A complete, un-premultiplied RGBA image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pixels: RgbaImage,
}

impl RenderedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Fully transparent image of the given size.
    pub fn transparent(size: ImageSize) -> Self {
        Self::new(RgbaImage::from_pixel(
            size.width,
            size.height,
            Rgba([0, 0, 0, 0]),
        ))
    }

    /// The 256x256 fully transparent image handed out when the engine is
    /// unavailable or a style fails to load.
    pub fn fallback() -> Self {
        Self::transparent(ImageSize::square(FALLBACK_SIZE))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width(), self.height())
    }

    /// RGBA value at (x, y). Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels.get_pixel(x, y).0
    }

    /// Raw RGBA bytes, row-major.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn as_rgba_image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_rgba_image(self) -> RgbaImage {
        self.pixels
    }

    pub fn is_fully_transparent(&self) -> bool {
        self.pixels.pixels().all(|p| p.0[3] == 0)
    }

    /// Copy out the region described by `crop`.
    pub fn crop(&self, crop: PixelBox) -> Result<RenderedImage, EngineError> {
        if !crop.fits_within(self.size()) {
            return Err(EngineError::Crop {
                crop,
                width: self.width(),
                height: self.height(),
            });
        }
        if crop == PixelBox::full(self.size()) {
            return Ok(self.clone());
        }

        let view = imageops::crop_imm(&self.pixels, crop.left, crop.top, crop.width(), crop.height());
        Ok(Self::new(view.to_image()))
    }

    /// Encode as PNG, indexed when the image has few enough colors.
    pub fn to_png(&self) -> Result<Vec<u8>, String> {
        create_png_auto(
            self.as_raw(),
            self.width() as usize,
            self.height() as usize,
        )
    }
}
