//! Render framing: padded extent, padded pixel size and crop box.
//!
//! Symbols and labels near a tile edge get clipped when each tile is drawn
//! in isolation. The fix is to draw a slightly larger image covering a
//! proportionally larger extent, then crop the padding away:
//!
//! ```text
//!  ┌──────────────────────────┐  render_size = (w + 2p, h + 2p)
//!  │  padding p               │  extended    = extent grown by p pixels
//!  │   ┌──────────────────┐   │
//!  │   │ target_box       │   │  target_box  = (p, p, w + p, h + p)
//!  │   │ (w × h)          │   │
//!  │   └──────────────────┘   │
//!  └──────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::{BoundingBox, RenderError, RenderResult};

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Square size, as used for tiles.
    pub fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Crop rectangle in pixel coordinates, `left/top` inclusive and
/// `right/bottom` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl PixelBox {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// The whole image of the given size.
    pub fn full(size: ImageSize) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width(), self.height())
    }

    /// True when the box is non-inverted and lies inside an image of `size`.
    pub fn fits_within(&self, size: ImageSize) -> bool {
        self.left <= self.right
            && self.top <= self.bottom
            && self.right <= size.width
            && self.bottom <= size.height
    }
}

/// Output of [`render_bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderBounds {
    /// Extent to hand to the engine, grown by the padding.
    pub extended: BoundingBox,
    /// Pixel size of the padded render.
    pub render_size: ImageSize,
    /// Region of the padded render that the caller asked for.
    pub target_box: PixelBox,
}

/// Compute the padded render frame for `extent` drawn at `size` pixels.
///
/// Uses the same per-axis resolution for the padding as the requested image,
/// so the cropped result is pixel-identical in scale to an unpadded render.
/// A zero width or height, or a non-finite extent, is rejected with
/// [`RenderError::InvalidArgument`] instead of producing NaN/Inf extents.
pub fn render_bounds(
    extent: &BoundingBox,
    size: ImageSize,
    padding: u32,
) -> RenderResult<RenderBounds> {
    if size.is_empty() {
        return Err(RenderError::InvalidArgument(format!(
            "image size must be positive, got {}x{}",
            size.width, size.height
        )));
    }
    if !extent.is_finite() {
        return Err(RenderError::InvalidArgument(format!(
            "extent must be finite, got {:?}",
            extent
        )));
    }

    let doubled = padding.checked_mul(2);
    let (Some(render_width), Some(render_height)) = (
        doubled.and_then(|d| size.width.checked_add(d)),
        doubled.and_then(|d| size.height.checked_add(d)),
    ) else {
        return Err(RenderError::InvalidArgument(format!(
            "padding {} too large for {}x{}",
            padding, size.width, size.height
        )));
    };

    let res_x = extent.width() / size.width as f64;
    let res_y = extent.height() / size.height as f64;
    let pad = padding as f64;

    let extended = BoundingBox::new(
        extent.min_x - res_x * pad,
        extent.min_y - res_y * pad,
        extent.max_x + res_x * pad,
        extent.max_y + res_y * pad,
    );

    Ok(RenderBounds {
        extended,
        render_size: ImageSize::new(render_width, render_height),
        target_box: PixelBox::new(padding, padding, size.width + padding, size.height + padding),
    })
}
