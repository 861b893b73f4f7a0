//! Per-style render requests: arbitrary extents and Web Mercator tiles.

use std::sync::Arc;

use map_common::{BoundingBox, ImageSize, RenderError, RenderResult, StyleId, TileCoord};
use renderer::RenderedImage;

use crate::Dispatcher;

/// Renders one style through a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct StyleRenderRequest<'a> {
    dispatcher: &'a Dispatcher,
    style_id: StyleId,
    style_document: Arc<str>,
}

impl<'a> StyleRenderRequest<'a> {
    pub fn new(
        dispatcher: &'a Dispatcher,
        style_id: StyleId,
        style_document: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            dispatcher,
            style_id,
            style_document: style_document.into(),
        }
    }

    pub fn style_id(&self) -> StyleId {
        self.style_id
    }

    /// Render `extent` at exactly `size` pixels, no padding.
    pub fn render_extent(&self, extent: &BoundingBox, size: ImageSize) -> RenderResult<RenderedImage> {
        self.dispatcher
            .render_image(self.style_id, Arc::clone(&self.style_document), extent, size, 0)
    }

    /// Render a square Web Mercator tile of `size` pixels.
    ///
    /// Drawn with half a tile of padding on every side so symbols crossing
    /// the tile edge are not clipped.
    pub fn render_tile(&self, tile: TileCoord, size: u32) -> RenderResult<RenderedImage> {
        if !tile.is_valid() {
            return Err(RenderError::InvalidArgument(format!(
                "tile {}/{}/{} outside the tile matrix",
                tile.z, tile.x, tile.y
            )));
        }

        self.dispatcher.render_image(
            self.style_id,
            Arc::clone(&self.style_document),
            &tile.web_mercator_extent(),
            ImageSize::square(size),
            size / 2,
        )
    }
}
