//! Rasterization of a parsed style with tiny-skia.

use image::RgbaImage;
use map_common::{BoundingBox, ImageSize};
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Stroke, Transform};

use super::style::{Color, MapStyle, Symbolizer};
use super::wkt::Geometry;
use crate::engine::EngineError;

/// Size of a rendering pixel in metres, used for scale denominators.
pub const STANDARD_PIXEL_SIZE: f64 = 0.00028;

/// Map units → pixel coordinates for one frame.
#[derive(Debug, Clone, Copy)]
struct Frame {
    min_x: f64,
    max_y: f64,
    res_x: f64,
    res_y: f64,
}

impl Frame {
    fn new(extent: &BoundingBox, size: ImageSize) -> Self {
        Self {
            min_x: extent.min_x,
            max_y: extent.max_y,
            res_x: extent.width() / size.width as f64,
            res_y: extent.height() / size.height as f64,
        }
    }

    #[inline]
    fn to_pixel(&self, (x, y): (f64, f64)) -> (f32, f32) {
        (
            ((x - self.min_x) / self.res_x) as f32,
            ((self.max_y - y) / self.res_y) as f32,
        )
    }

    fn scale_denominator(&self) -> f64 {
        self.res_x.abs() / STANDARD_PIXEL_SIZE
    }
}

/// Draw `style` covering `extent` into an image of `size`.
pub fn draw(style: &MapStyle, size: ImageSize, extent: &BoundingBox) -> Result<RgbaImage, EngineError> {
    let mut pixmap = Pixmap::new(size.width, size.height).ok_or(EngineError::InvalidSize {
        width: size.width,
        height: size.height,
    })?;
    pixmap.fill(skia_color(style.background));

    let frame = Frame::new(extent, size);
    let scale = frame.scale_denominator();

    for layer in &style.layers {
        for style_name in &layer.styles {
            let Some(layer_style) = style.style(style_name) else {
                continue;
            };
            for rule in layer_style.rules.iter().filter(|r| r.is_active(scale)) {
                for symbolizer in &rule.symbolizers {
                    for feature in &layer.features {
                        draw_feature(&mut pixmap, &frame, symbolizer, feature);
                    }
                }
            }
        }
    }

    let mut raw = Vec::with_capacity(size.width as usize * size.height as usize * 4);
    for px in pixmap.pixels() {
        let c = px.demultiply();
        raw.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    RgbaImage::from_raw(size.width, size.height, raw)
        .ok_or_else(|| EngineError::Other("pixel buffer size mismatch".to_string()))
}

fn draw_feature(pixmap: &mut Pixmap, frame: &Frame, symbolizer: &Symbolizer, feature: &Geometry) {
    match (symbolizer, feature) {
        (Symbolizer::Polygon { fill }, Geometry::Polygon(rings)) => {
            if fill.a == 0 {
                return;
            }
            let mut pb = PathBuilder::new();
            for ring in rings {
                push_ring(&mut pb, frame, ring, true);
            }
            if let Some(path) = pb.finish() {
                pixmap.fill_path(&path, &paint(*fill), FillRule::EvenOdd, Transform::identity(), None);
            }
        }
        (Symbolizer::Line { stroke, width }, Geometry::LineString(_) | Geometry::Polygon(_)) => {
            if stroke.a == 0 || *width <= 0.0 {
                return;
            }
            let mut pb = PathBuilder::new();
            match feature {
                Geometry::LineString(coords) => push_ring(&mut pb, frame, coords, false),
                Geometry::Polygon(rings) => {
                    for ring in rings {
                        push_ring(&mut pb, frame, ring, true);
                    }
                }
                Geometry::Point(..) => {}
            }
            if let Some(path) = pb.finish() {
                let stroke_style = Stroke {
                    width: *width,
                    ..Stroke::default()
                };
                pixmap.stroke_path(&path, &paint(*stroke), &stroke_style, Transform::identity(), None);
            }
        }
        (Symbolizer::Point { fill, size }, Geometry::Point(x, y)) => {
            if fill.a == 0 || *size <= 0.0 {
                return;
            }
            let (px, py) = frame.to_pixel((*x, *y));
            if let Some(path) = PathBuilder::from_circle(px, py, size / 2.0) {
                pixmap.fill_path(&path, &paint(*fill), FillRule::Winding, Transform::identity(), None);
            }
        }
        _ => {}
    }
}

fn push_ring(pb: &mut PathBuilder, frame: &Frame, coords: &[(f64, f64)], close: bool) {
    let mut points = coords.iter().map(|&c| frame.to_pixel(c));
    let Some((x, y)) = points.next() else {
        return;
    };
    pb.move_to(x, y);
    for (x, y) in points {
        pb.line_to(x, y);
    }
    if close {
        pb.close();
    }
}

fn paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

fn skia_color(color: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, color.a)
}
