//! Units of work accepted by the dispatcher.

use std::sync::Arc;

use map_common::{
    render_bounds, BoundingBox, ImageSize, PixelBox, RenderBounds, RenderError, RenderResult,
    StyleId,
};

/// One image render: a style, a padded frame and the crop to return.
///
/// Immutable once built; [`RenderOptions::new`] checks that the crop box
/// lies inside the render size.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    style_id: StyleId,
    style_document: Arc<str>,
    render_size: ImageSize,
    extended_box: BoundingBox,
    target_box: PixelBox,
}

impl RenderOptions {
    pub fn new(
        style_id: StyleId,
        style_document: impl Into<Arc<str>>,
        render_size: ImageSize,
        extended_box: BoundingBox,
        target_box: PixelBox,
    ) -> RenderResult<Self> {
        if render_size.is_empty() {
            return Err(RenderError::InvalidArgument(format!(
                "render size must be positive, got {}x{}",
                render_size.width, render_size.height
            )));
        }
        if !target_box.fits_within(render_size) {
            return Err(RenderError::InvalidArgument(format!(
                "target box {:?} does not fit in {}x{}",
                target_box, render_size.width, render_size.height
            )));
        }

        Ok(Self {
            style_id,
            style_document: style_document.into(),
            render_size,
            extended_box,
            target_box,
        })
    }

    /// Options for drawing `extent` at `size` pixels with `padding` extra
    /// pixels on every side.
    pub fn for_extent(
        style_id: StyleId,
        style_document: impl Into<Arc<str>>,
        extent: &BoundingBox,
        size: ImageSize,
        padding: u32,
    ) -> RenderResult<Self> {
        let RenderBounds {
            extended,
            render_size,
            target_box,
        } = render_bounds(extent, size, padding)?;
        Self::new(style_id, style_document, render_size, extended, target_box)
    }

    pub fn style_id(&self) -> StyleId {
        self.style_id
    }

    pub fn style_document(&self) -> &str {
        &self.style_document
    }

    pub fn render_size(&self) -> ImageSize {
        self.render_size
    }

    pub fn extended_box(&self) -> &BoundingBox {
        &self.extended_box
    }

    pub fn target_box(&self) -> PixelBox {
        self.target_box
    }
}

/// A legend request. Always answered with [`RenderError::Unsupported`].
#[derive(Debug, Clone, PartialEq)]
pub struct LegendOptions {
    pub style_document: Arc<str>,
    pub geometry_type: String,
    pub layer_name: String,
}

impl LegendOptions {
    pub fn new(
        style_document: impl Into<Arc<str>>,
        geometry_type: impl Into<String>,
        layer_name: impl Into<String>,
    ) -> Self {
        Self {
            style_document: style_document.into(),
            geometry_type: geometry_type.into(),
            layer_name: layer_name.into(),
        }
    }
}

/// Job placed on the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderJob {
    Image(RenderOptions),
    Legend(LegendOptions),
}

impl RenderJob {
    /// Label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderJob::Image(_) => "image",
            RenderJob::Legend(_) => "legend",
        }
    }
}

impl From<RenderOptions> for RenderJob {
    fn from(options: RenderOptions) -> Self {
        RenderJob::Image(options)
    }
}

impl From<LegendOptions> for RenderJob {
    fn from(options: LegendOptions) -> Self {
        RenderJob::Legend(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_box_must_fit() {
        let result = RenderOptions::new(
            StyleId::new(1),
            "<Map/>",
            ImageSize::square(256),
            BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            PixelBox::new(0, 0, 257, 256),
        );
        assert!(matches!(result, Err(RenderError::InvalidArgument(_))));
    }

    #[test]
    fn test_for_extent_applies_padding() {
        let options = RenderOptions::for_extent(
            StyleId::new(7),
            "<Map/>",
            &BoundingBox::new(0.0, 0.0, 256.0, 256.0),
            ImageSize::square(256),
            128,
        )
        .unwrap();

        assert_eq!(options.style_id(), StyleId::new(7));
        assert_eq!(options.render_size(), ImageSize::square(512));
        assert_eq!(options.target_box(), PixelBox::new(128, 128, 384, 384));
        assert_eq!(
            *options.extended_box(),
            BoundingBox::new(-128.0, -128.0, 384.0, 384.0)
        );
    }

    #[test]
    fn test_job_kind() {
        let legend: RenderJob = LegendOptions::new("<Map/>", "polygon", "Lakes").into();
        assert_eq!(legend.kind(), "legend");
    }
}
