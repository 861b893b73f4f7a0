//! Built-in raster engine: XML styles drawn with tiny-skia.

pub mod draw;
pub mod style;
pub mod wkt;

use std::path::{Path, PathBuf};

use map_common::{BoundingBox, ImageSize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::engine::{EngineError, PreparedMap, RenderEngine, StyleError};
use crate::RenderedImage;

pub use style::MapStyle;

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc"];

/// Engine producing [`RasterMap`]s.
#[derive(Debug, Clone, Default)]
pub struct RasterEngine {
    font_path: Option<PathBuf>,
    font_count: usize,
}

impl RasterEngine {
    /// Create the engine, registering fonts found under `font_path`.
    pub fn new(font_path: Option<&Path>) -> Self {
        let font_count = font_path.map(scan_fonts).unwrap_or(0);
        Self {
            font_path: font_path.map(Path::to_path_buf),
            font_count,
        }
    }

    pub fn font_path(&self) -> Option<&Path> {
        self.font_path.as_deref()
    }

    /// Number of font files registered at start-up.
    pub fn font_count(&self) -> usize {
        self.font_count
    }
}

fn scan_fonts(path: &Path) -> usize {
    if !path.exists() {
        warn!(font_path = %path.display(), "Font path does not exist");
        return 0;
    }

    let count = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| FONT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .count();

    info!(font_path = %path.display(), fonts = count, "Registered fonts");
    count
}

impl RenderEngine for RasterEngine {
    fn name(&self) -> &str {
        "raster"
    }

    fn create_map(&self) -> Box<dyn PreparedMap> {
        Box::new(RasterMap::new())
    }
}

/// Map object of the raster engine.
#[derive(Debug, Clone)]
pub struct RasterMap {
    style: Option<MapStyle>,
    size: ImageSize,
    extent: BoundingBox,
}

impl RasterMap {
    pub fn new() -> Self {
        Self {
            style: None,
            size: ImageSize::new(0, 0),
            extent: BoundingBox::new(0.0, 0.0, 0.0, 0.0),
        }
    }
}

impl Default for RasterMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PreparedMap for RasterMap {
    fn load_style(&mut self, document: &str) -> Result<(), StyleError> {
        let style = MapStyle::parse(document)?;
        debug!(
            styles = style.styles.len(),
            layers = style.layers.len(),
            "Loaded style document"
        );
        self.style = Some(style);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.style.is_some()
    }

    fn resize(&mut self, size: ImageSize) {
        self.size = size;
    }

    fn zoom_to_box(&mut self, extent: &BoundingBox) {
        self.extent = *extent;
    }

    fn render(&mut self) -> Result<RenderedImage, EngineError> {
        let style = self.style.as_ref().ok_or(EngineError::NotLoaded)?;
        if self.size.is_empty() {
            return Err(EngineError::InvalidSize {
                width: self.size.width,
                height: self.size.height,
            });
        }
        if !self.extent.is_finite() || self.extent.width() <= 0.0 || self.extent.height() <= 0.0 {
            return Err(EngineError::InvalidExtent(self.extent));
        }

        let pixels = draw::draw(style, self.size, &self.extent)?;
        Ok(RenderedImage::new(pixels))
    }
}
