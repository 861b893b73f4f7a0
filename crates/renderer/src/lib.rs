//! Map image rendering.
//!
//! Provides:
//! - The engine seam ([`RenderEngine`], [`PreparedMap`]) used by the dispatcher
//! - [`RenderedImage`] with cropping, the transparent fallback and PNG output
//! - A built-in raster engine (feature `raster`): XML styles drawn with tiny-skia

pub mod engine;
pub mod image;
pub mod png;
#[cfg(feature = "raster")]
pub mod raster;

use std::path::Path;
use std::sync::Arc;

pub use engine::{EngineError, PreparedMap, RenderEngine, StyleError};
pub use self::image::{RenderedImage, FALLBACK_SIZE};
#[cfg(feature = "raster")]
pub use raster::{RasterEngine, RasterMap};

/// Initialise the engine compiled into this build, if any.
///
/// Returns `None` when no engine is available; the dispatcher then answers
/// every image job with the fallback image.
#[cfg(feature = "raster")]
pub fn default_engine(font_path: Option<&Path>) -> Option<Arc<dyn RenderEngine>> {
    Some(Arc::new(RasterEngine::new(font_path)))
}

#[cfg(not(feature = "raster"))]
pub fn default_engine(font_path: Option<&Path>) -> Option<Arc<dyn RenderEngine>> {
    tracing::warn!(
        font_path = ?font_path,
        "No rendering engine compiled in; image requests will get the fallback image"
    );
    None
}
