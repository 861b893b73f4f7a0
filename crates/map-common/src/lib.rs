//! Common types shared across the map rendering crates.
//!
//! Geometry needed to frame a render request (bounding boxes, pixel sizes,
//! crop boxes and tile extents), the identity of a style document, and the
//! error taxonomy surfaced by the render dispatcher.

pub mod bbox;
pub mod bounds;
pub mod error;
pub mod style;
pub mod tile;

pub use bbox::{BboxParseError, BoundingBox};
pub use bounds::{render_bounds, ImageSize, PixelBox, RenderBounds};
pub use error::{RenderError, RenderResult};
pub use style::StyleId;
pub use tile::TileCoord;
