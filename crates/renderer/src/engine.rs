//! The seam between the render dispatcher and a rendering engine.
//!
//! Engines are modelled on a stateful "map object": it is created empty,
//! loaded once from a style document, then resized, framed and drawn any
//! number of times. None of these calls are assumed to be safe to make
//! concurrently on one map object; the dispatcher guarantees that a map is
//! only ever touched by one worker at a time.

use map_common::{BoundingBox, ImageSize};
use thiserror::Error;

use crate::RenderedImage;

/// Factory for prepared map objects.
pub trait RenderEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Create an empty map with no styles loaded.
    fn create_map(&self) -> Box<dyn PreparedMap>;
}

/// Engine-side state prepared from one style document.
pub trait PreparedMap: Send {
    /// Parse `document` into this map. Expensive; called once per cache entry.
    fn load_style(&mut self, document: &str) -> Result<(), StyleError>;

    /// True once a style with at least one drawable rule has been loaded.
    fn is_loaded(&self) -> bool;

    /// Set the output image size for the next render.
    fn resize(&mut self, size: ImageSize);

    /// Set the map extent for the next render.
    fn zoom_to_box(&mut self, extent: &BoundingBox);

    /// Draw the map at the current size and extent.
    fn render(&mut self) -> Result<RenderedImage, EngineError>;
}

/// A style document that could not be loaded.
#[derive(Debug, Clone, Error)]
pub enum StyleError {
    #[error("XML error at byte {position}: {message}")]
    Xml { position: usize, message: String },

    #[error("style document has no <Map> root element")]
    MissingRoot,

    #[error("unexpected <{element}> inside <{parent}>")]
    Misplaced { element: String, parent: String },

    #[error("invalid value {value:?} for {field}")]
    InvalidValue { field: String, value: String },

    #[error("invalid geometry: {0}")]
    Geometry(String),

    #[error("layer {layer:?} references unknown style {style:?}")]
    UnknownStyle { layer: String, style: String },

    #[error("style document has no drawable rules")]
    NoDrawableRules,
}

/// Failure while drawing an already loaded map.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("map has no style loaded")]
    NotLoaded,

    #[error("invalid image size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("invalid map extent {0:?}")]
    InvalidExtent(BoundingBox),

    #[error("crop box {crop:?} outside {width}x{height} image")]
    Crop {
        crop: map_common::PixelBox,
        width: u32,
        height: u32,
    },

    #[error("{0}")]
    Other(String),
}
