//! An instrumented rendering engine for dispatcher tests.
//!
//! The probe parses nothing; it recognises a few marker elements in the
//! style document and counts every call made to it:
//!
//! - `<broken/>` anywhere in the document makes `load_style` fail
//! - `<panic/>` makes `render` panic
//! - `<fail/>` makes `render` return an error
//!
//! Rendered images encode their framing so tests can tell which job an
//! image came from: pixel `(x, y)` is `[x, y, frame_tag(extent), 255]`
//! (x and y truncated to `u8`).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use map_common::{BoundingBox, ImageSize};
use renderer::{EngineError, PreparedMap, RenderEngine, RenderedImage, StyleError};

/// Call counters shared by a probe engine and all its maps.
#[derive(Debug, Default)]
pub struct ProbeStats {
    pub maps_created: AtomicUsize,
    pub parses: AtomicUsize,
    pub renders: AtomicUsize,
    /// Renders in progress right now, across all maps
    pub active_renders: AtomicUsize,
    /// Highest value `active_renders` reached
    pub peak_active_renders: AtomicUsize,
}

impl ProbeStats {
    pub fn parses(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn maps_created(&self) -> usize {
        self.maps_created.load(Ordering::SeqCst)
    }

    pub fn peak_active_renders(&self) -> usize {
        self.peak_active_renders.load(Ordering::SeqCst)
    }
}

/// Engine whose maps record every call in a shared [`ProbeStats`].
#[derive(Debug, Clone, Default)]
pub struct ProbeEngine {
    stats: Arc<ProbeStats>,
    render_delay: Duration,
}

impl ProbeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every `render` call.
    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = delay;
        self
    }

    pub fn stats(&self) -> Arc<ProbeStats> {
        Arc::clone(&self.stats)
    }

    /// Wrap for handing to a dispatcher.
    pub fn into_engine(self) -> Arc<dyn RenderEngine> {
        Arc::new(self)
    }
}

impl RenderEngine for ProbeEngine {
    fn name(&self) -> &str {
        "probe"
    }

    fn create_map(&self) -> Box<dyn PreparedMap> {
        self.stats.maps_created.fetch_add(1, Ordering::SeqCst);
        Box::new(ProbeMap {
            stats: Arc::clone(&self.stats),
            render_delay: self.render_delay,
            document: None,
            size: ImageSize::new(0, 0),
            extent: BoundingBox::new(0.0, 0.0, 0.0, 0.0),
        })
    }
}

struct ProbeMap {
    stats: Arc<ProbeStats>,
    render_delay: Duration,
    document: Option<String>,
    size: ImageSize,
    extent: BoundingBox,
}

impl PreparedMap for ProbeMap {
    fn load_style(&mut self, document: &str) -> Result<(), StyleError> {
        self.stats.parses.fetch_add(1, Ordering::SeqCst);
        if document.contains("<broken/>") {
            return Err(StyleError::Xml {
                position: 0,
                message: "probe: broken document".to_string(),
            });
        }
        self.document = Some(document.to_string());
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    fn resize(&mut self, size: ImageSize) {
        self.size = size;
    }

    fn zoom_to_box(&mut self, extent: &BoundingBox) {
        self.extent = *extent;
    }

    fn render(&mut self) -> Result<RenderedImage, EngineError> {
        let document = self.document.as_deref().ok_or(EngineError::NotLoaded)?;
        self.stats.renders.fetch_add(1, Ordering::SeqCst);

        let active = self.stats.active_renders.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats
            .peak_active_renders
            .fetch_max(active, Ordering::SeqCst);

        if !self.render_delay.is_zero() {
            thread::sleep(self.render_delay);
        }
        self.stats.active_renders.fetch_sub(1, Ordering::SeqCst);

        if document.contains("<panic/>") {
            panic!("probe: render panicked");
        }
        if document.contains("<fail/>") {
            return Err(EngineError::Other("probe: render failed".to_string()));
        }
        Ok(framed_image(&self.extent, self.size))
    }
}

/// Tag identifying a frame: `min_x` rounded, modulo 251.
pub fn frame_tag(extent: &BoundingBox) -> u8 {
    (extent.min_x.round() as i64).rem_euclid(251) as u8
}

/// The image a probe map renders for `extent` at `size`.
pub fn framed_image(extent: &BoundingBox, size: ImageSize) -> RenderedImage {
    let tag = frame_tag(extent);
    let pixels = RgbaImage::from_fn(size.width, size.height, |x, y| {
        Rgba([x as u8, y as u8, tag, 255])
    });
    RenderedImage::new(pixels)
}
