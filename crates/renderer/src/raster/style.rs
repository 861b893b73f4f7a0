//! XML style documents for the raster engine.
//!
//! The accepted shape follows a Mapnik map file:
//!
//! ```xml
//! <Map background-color="#b5d0d0">
//!   <Style name="water">
//!     <Rule>
//!       <MaxScaleDenominator>5000000</MaxScaleDenominator>
//!       <PolygonSymbolizer fill="#4060c0" fill-opacity="0.8"/>
//!       <LineSymbolizer stroke="#203060" stroke-width="1.5"/>
//!     </Rule>
//!   </Style>
//!   <Layer name="lakes">
//!     <StyleName>water</StyleName>
//!     <Datasource>
//!       <Feature>POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))</Feature>
//!     </Datasource>
//!   </Layer>
//! </Map>
//! ```
//!
//! Elements the engine does not draw (text symbolizers, filters, font sets,
//! datasource parameters) are skipped together with their children.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use super::wkt::Geometry;
use crate::engine::StyleError;

/// Straight (non-premultiplied) RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    pub const GRAY: Color = Color::rgba(128, 128, 128, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Scale alpha by `opacity` in `[0, 1]`.
    pub fn with_opacity(self, opacity: f64) -> Self {
        let a = (self.a as f64 * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }

    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(..)`, `rgba(..)` or a
    /// handful of colour names.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();

        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex);
        }

        let lower = value.to_ascii_lowercase();
        if let Some(args) = lower.strip_prefix("rgba(").and_then(|s| s.strip_suffix(')')) {
            let parts: Vec<&str> = args.split(',').map(str::trim).collect();
            if let [r, g, b, a] = parts.as_slice() {
                let alpha: f64 = a.parse().ok()?;
                if !(0.0..=1.0).contains(&alpha) {
                    return None;
                }
                let color = Color::rgba(r.parse().ok()?, g.parse().ok()?, b.parse().ok()?, 255);
                return Some(color.with_opacity(alpha));
            }
            return None;
        }
        if let Some(args) = lower.strip_prefix("rgb(").and_then(|s| s.strip_suffix(')')) {
            let parts: Vec<&str> = args.split(',').map(str::trim).collect();
            if let [r, g, b] = parts.as_slice() {
                return Some(Color::rgba(r.parse().ok()?, g.parse().ok()?, b.parse().ok()?, 255));
            }
            return None;
        }

        match lower.as_str() {
            "transparent" | "none" => Some(Color::TRANSPARENT),
            "black" => Some(Color::BLACK),
            "white" => Some(Color::rgba(255, 255, 255, 255)),
            "red" => Some(Color::rgba(255, 0, 0, 255)),
            "green" => Some(Color::rgba(0, 128, 0, 255)),
            "blue" => Some(Color::rgba(0, 0, 255, 255)),
            "yellow" => Some(Color::rgba(255, 255, 0, 255)),
            "gray" | "grey" => Some(Color::GRAY),
            _ => None,
        }
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);

    match hex.len() {
        3 => Some(Color::rgba(nibble(0)?, nibble(1)?, nibble(2)?, 255)),
        6 => Some(Color::rgba(byte(0)?, byte(2)?, byte(4)?, 255)),
        8 => Some(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Symbolizer {
    Polygon { fill: Color },
    Line { stroke: Color, width: f32 },
    Point { fill: Color, size: f32 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rule {
    pub min_scale: Option<f64>,
    pub max_scale: Option<f64>,
    pub symbolizers: Vec<Symbolizer>,
}

impl Rule {
    /// Active when `min_scale <= scale < max_scale`.
    pub fn is_active(&self, scale_denominator: f64) -> bool {
        self.min_scale.map_or(true, |min| scale_denominator >= min)
            && self.max_scale.map_or(true, |max| scale_denominator < max)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    pub name: String,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layer {
    pub name: String,
    pub styles: Vec<String>,
    pub features: Vec<Geometry>,
}

/// A parsed style document.
#[derive(Debug, Clone, PartialEq)]
pub struct MapStyle {
    pub background: Color,
    pub styles: HashMap<String, Style>,
    pub layers: Vec<Layer>,
}

impl MapStyle {
    /// Parse a style document.
    pub fn parse(document: &str) -> Result<Self, StyleError> {
        let mut reader = Reader::from_str(document);
        reader.trim_text(true);

        let mut parser = DocumentParser::default();
        loop {
            let position = reader.buffer_position();
            let event = reader.read_event().map_err(|e| StyleError::Xml {
                position,
                message: e.to_string(),
            })?;

            match event {
                Event::Start(e) => parser.open(&e, position)?,
                Event::Empty(e) => {
                    parser.open(&e, position)?;
                    parser.close()?;
                }
                Event::End(_) => parser.close()?,
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| StyleError::Xml {
                        position,
                        message: e.to_string(),
                    })?;
                    parser.text(&text);
                }
                Event::CData(c) => parser.text(&String::from_utf8_lossy(&c.into_inner())),
                Event::Eof => break,
                _ => {}
            }
        }

        parser.finish()
    }

    pub fn style(&self, name: &str) -> Option<&Style> {
        self.styles.get(name)
    }

    /// True when some style has a rule with at least one symbolizer.
    pub fn has_drawable_rules(&self) -> bool {
        self.styles
            .values()
            .flat_map(|s| &s.rules)
            .any(|r| !r.symbolizers.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    MinScale,
    MaxScale,
    StyleName,
    Feature,
}

#[derive(Debug)]
enum Frame {
    Map,
    Style(Style),
    Rule(Rule),
    Layer(Layer),
    Datasource,
    Text { target: TextTarget, buf: String },
    Symbolizer,
    Ignored,
}

impl Frame {
    fn element(&self) -> &'static str {
        match self {
            Frame::Map => "Map",
            Frame::Style(_) => "Style",
            Frame::Rule(_) => "Rule",
            Frame::Layer(_) => "Layer",
            Frame::Datasource => "Datasource",
            Frame::Text { .. } => "text element",
            Frame::Symbolizer => "Symbolizer",
            Frame::Ignored => "ignored element",
        }
    }
}

const KNOWN_ELEMENTS: &[&str] = &[
    "Map",
    "Style",
    "Rule",
    "Layer",
    "Datasource",
    "Feature",
    "StyleName",
    "MinScaleDenominator",
    "MaxScaleDenominator",
    "PolygonSymbolizer",
    "LineSymbolizer",
    "PointSymbolizer",
];

#[derive(Default)]
struct DocumentParser {
    stack: Vec<Frame>,
    saw_map: bool,
    background: Option<Color>,
    styles: HashMap<String, Style>,
    layers: Vec<Layer>,
}

impl DocumentParser {
    fn open(&mut self, e: &BytesStart<'_>, position: usize) -> Result<(), StyleError> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let attrs = read_attributes(e, position)?;

        let frame = match (self.stack.last_mut(), name.as_str()) {
            (None, "Map") if !self.saw_map => {
                self.saw_map = true;
                if let Some(value) = attr(&attrs, "background-color") {
                    self.background = Some(parse_color("background-color", value)?);
                }
                Frame::Map
            }
            (None, _) => return Err(StyleError::MissingRoot),
            (Some(Frame::Ignored), _) => Frame::Ignored,
            (Some(Frame::Map), "Style") => {
                let style_name = attr(&attrs, "name").ok_or_else(|| StyleError::InvalidValue {
                    field: "Style name".to_string(),
                    value: String::new(),
                })?;
                Frame::Style(Style {
                    name: style_name.to_string(),
                    rules: Vec::new(),
                })
            }
            (Some(Frame::Map), "Layer") => Frame::Layer(Layer {
                name: attr(&attrs, "name").unwrap_or_default().to_string(),
                ..Layer::default()
            }),
            (Some(Frame::Style(_)), "Rule") => Frame::Rule(Rule::default()),
            (Some(Frame::Rule(_)), "MinScaleDenominator") => text_frame(TextTarget::MinScale),
            (Some(Frame::Rule(_)), "MaxScaleDenominator") => text_frame(TextTarget::MaxScale),
            (Some(Frame::Rule(rule)), "PolygonSymbolizer") => {
                let fill = color_attr(&attrs, "fill", Color::GRAY)?;
                let opacity = number_attr(&attrs, "fill-opacity", 1.0)?;
                rule.symbolizers.push(Symbolizer::Polygon {
                    fill: fill.with_opacity(opacity),
                });
                Frame::Symbolizer
            }
            (Some(Frame::Rule(rule)), "LineSymbolizer") => {
                let stroke = color_attr(&attrs, "stroke", Color::BLACK)?;
                let opacity = number_attr(&attrs, "stroke-opacity", 1.0)?;
                let width = non_negative(&attrs, "stroke-width", 1.0)?;
                rule.symbolizers.push(Symbolizer::Line {
                    stroke: stroke.with_opacity(opacity),
                    width: width as f32,
                });
                Frame::Symbolizer
            }
            (Some(Frame::Rule(rule)), "PointSymbolizer") => {
                let fill = color_attr(&attrs, "fill", Color::BLACK)?;
                let opacity = number_attr(&attrs, "opacity", 1.0)?;
                let size = non_negative(&attrs, "size", 4.0)?;
                rule.symbolizers.push(Symbolizer::Point {
                    fill: fill.with_opacity(opacity),
                    size: size as f32,
                });
                Frame::Symbolizer
            }
            (Some(Frame::Layer(_)), "StyleName") => text_frame(TextTarget::StyleName),
            (Some(Frame::Layer(_)), "Datasource") => Frame::Datasource,
            (Some(Frame::Datasource), "Feature") => text_frame(TextTarget::Feature),
            (Some(parent), element) if KNOWN_ELEMENTS.contains(&element) => {
                return Err(StyleError::Misplaced {
                    element: element.to_string(),
                    parent: parent.element().to_string(),
                });
            }
            (Some(_), element) => {
                debug!(element = %element, "Skipping unsupported style element");
                Frame::Ignored
            }
        };

        self.stack.push(frame);
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if let Some(Frame::Text { buf, .. }) = self.stack.last_mut() {
            buf.push_str(text);
        }
    }

    fn close(&mut self) -> Result<(), StyleError> {
        let Some(frame) = self.stack.pop() else {
            return Ok(());
        };

        match frame {
            Frame::Style(style) => {
                self.styles.insert(style.name.clone(), style);
            }
            Frame::Rule(rule) => {
                if let Some(Frame::Style(style)) = self.stack.last_mut() {
                    style.rules.push(rule);
                }
            }
            Frame::Layer(layer) => self.layers.push(layer),
            Frame::Text { target, buf } => self.close_text(target, buf.trim())?,
            Frame::Map | Frame::Datasource | Frame::Symbolizer | Frame::Ignored => {}
        }
        Ok(())
    }

    fn close_text(&mut self, target: TextTarget, text: &str) -> Result<(), StyleError> {
        match target {
            TextTarget::MinScale | TextTarget::MaxScale => {
                let field = if target == TextTarget::MinScale {
                    "MinScaleDenominator"
                } else {
                    "MaxScaleDenominator"
                };
                let value = parse_number(field, text)?;
                if let Some(Frame::Rule(rule)) = self.stack.last_mut() {
                    if target == TextTarget::MinScale {
                        rule.min_scale = Some(value);
                    } else {
                        rule.max_scale = Some(value);
                    }
                }
            }
            TextTarget::StyleName => {
                if let Some(Frame::Layer(layer)) = self.stack.last_mut() {
                    layer.styles.push(text.to_string());
                }
            }
            TextTarget::Feature => {
                let geometry = Geometry::parse(text)?;
                let layer = self.stack.iter_mut().rev().find_map(|f| match f {
                    Frame::Layer(layer) => Some(layer),
                    _ => None,
                });
                if let Some(layer) = layer {
                    layer.features.push(geometry);
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<MapStyle, StyleError> {
        if !self.saw_map {
            return Err(StyleError::MissingRoot);
        }
        if let Some(frame) = self.stack.last() {
            return Err(StyleError::Xml {
                position: 0,
                message: format!("unclosed <{}>", frame.element()),
            });
        }

        for layer in &self.layers {
            if let Some(missing) = layer.styles.iter().find(|s| !self.styles.contains_key(*s)) {
                return Err(StyleError::UnknownStyle {
                    layer: layer.name.clone(),
                    style: missing.clone(),
                });
            }
        }

        let style = MapStyle {
            background: self.background.unwrap_or(Color::TRANSPARENT),
            styles: self.styles,
            layers: self.layers,
        };
        if !style.has_drawable_rules() {
            return Err(StyleError::NoDrawableRules);
        }
        Ok(style)
    }
}

fn text_frame(target: TextTarget) -> Frame {
    Frame::Text {
        target,
        buf: String::new(),
    }
}

fn read_attributes(e: &BytesStart<'_>, position: usize) -> Result<Vec<(String, String)>, StyleError> {
    e.attributes()
        .map(|attr| {
            let attr = attr.map_err(|err| StyleError::Xml {
                position,
                message: err.to_string(),
            })?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| StyleError::Xml {
                    position,
                    message: err.to_string(),
                })?
                .into_owned();
            Ok((key, value))
        })
        .collect()
}

fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn invalid(field: &str, value: &str) -> StyleError {
    StyleError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn parse_color(field: &str, value: &str) -> Result<Color, StyleError> {
    Color::parse(value).ok_or_else(|| invalid(field, value))
}

fn parse_number(field: &str, value: &str) -> Result<f64, StyleError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(field, value))
}

fn color_attr(attrs: &[(String, String)], key: &str, default: Color) -> Result<Color, StyleError> {
    attr(attrs, key).map_or(Ok(default), |v| parse_color(key, v))
}

fn number_attr(attrs: &[(String, String)], key: &str, default: f64) -> Result<f64, StyleError> {
    attr(attrs, key).map_or(Ok(default), |v| parse_number(key, v))
}

fn non_negative(attrs: &[(String, String)], key: &str, default: f64) -> Result<f64, StyleError> {
    let value = number_attr(attrs, key, default)?;
    if value < 0.0 {
        return Err(invalid(key, &value.to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAKES: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<Map background-color="#b5d0d0" srs="+init=epsg:3857">
  <Style name="water">
    <Rule>
      <MaxScaleDenominator>5000000</MaxScaleDenominator>
      <PolygonSymbolizer fill="#4060c0" fill-opacity="0.5"/>
      <LineSymbolizer stroke="#203060" stroke-width="1.5"/>
      <TextSymbolizer face-name="DejaVu Sans Book">[name]</TextSymbolizer>
    </Rule>
  </Style>
  <Layer name="lakes" srs="+init=epsg:3857">
    <StyleName>water</StyleName>
    <Datasource>
      <Parameter name="type">inline</Parameter>
      <Feature>POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))</Feature>
      <Feature><![CDATA[POINT (5 5)]]></Feature>
    </Datasource>
  </Layer>
</Map>"##;

    #[test]
    fn test_parse_full_document() {
        let style = MapStyle::parse(LAKES).unwrap();

        assert_eq!(style.background, Color::rgba(0xb5, 0xd0, 0xd0, 255));
        let water = style.style("water").unwrap();
        assert_eq!(water.rules.len(), 1);

        let rule = &water.rules[0];
        assert_eq!(rule.max_scale, Some(5_000_000.0));
        assert_eq!(rule.min_scale, None);
        assert_eq!(
            rule.symbolizers,
            vec![
                Symbolizer::Polygon {
                    fill: Color::rgba(0x40, 0x60, 0xc0, 128)
                },
                Symbolizer::Line {
                    stroke: Color::rgba(0x20, 0x30, 0x60, 255),
                    width: 1.5
                },
            ]
        );

        assert_eq!(style.layers.len(), 1);
        assert_eq!(style.layers[0].styles, vec!["water".to_string()]);
        assert_eq!(style.layers[0].features.len(), 2);
        assert_eq!(style.layers[0].features[1], Geometry::Point(5.0, 5.0));
    }

    #[test]
    fn test_rule_scale_range() {
        let rule = Rule {
            min_scale: Some(1000.0),
            max_scale: Some(5000.0),
            symbolizers: Vec::new(),
        };
        assert!(!rule.is_active(999.0));
        assert!(rule.is_active(1000.0));
        assert!(rule.is_active(4999.0));
        assert!(!rule.is_active(5000.0));
    }

    #[test]
    fn test_colors() {
        assert_eq!(Color::parse("#fff"), Some(Color::rgba(255, 255, 255, 255)));
        assert_eq!(Color::parse("#10203040"), Some(Color::rgba(16, 32, 48, 64)));
        assert_eq!(Color::parse("rgb(1, 2, 3)"), Some(Color::rgba(1, 2, 3, 255)));
        assert_eq!(Color::parse("rgba(0,0,0,0.5)"), Some(Color::rgba(0, 0, 0, 128)));
        assert_eq!(Color::parse("transparent"), Some(Color::TRANSPARENT));
        assert_eq!(Color::parse("#ggg"), None);
        assert_eq!(Color::parse("chartreuse-ish"), None);
        assert_eq!(Color::parse("rgba(0,0,0,2)"), None);
    }

    #[test]
    fn test_malformed_xml_rejected() {
        let err = MapStyle::parse("<Map><Style name=\"a\"></Map>").unwrap_err();
        assert!(matches!(err, StyleError::Xml { .. }), "got {:?}", err);
    }

    #[test]
    fn test_missing_root_rejected() {
        assert!(matches!(
            MapStyle::parse("<Style name=\"a\"/>"),
            Err(StyleError::MissingRoot)
        ));
        assert!(matches!(MapStyle::parse(""), Err(StyleError::MissingRoot)));
    }

    #[test]
    fn test_unknown_style_reference_rejected() {
        let doc = r#"<Map>
            <Style name="a"><Rule><PointSymbolizer/></Rule></Style>
            <Layer name="l"><StyleName>b</StyleName></Layer>
        </Map>"#;
        assert!(matches!(
            MapStyle::parse(doc),
            Err(StyleError::UnknownStyle { .. })
        ));
    }

    #[test]
    fn test_no_drawable_rules_rejected() {
        let doc = r#"<Map><Style name="a"><Rule/></Style></Map>"#;
        assert!(matches!(
            MapStyle::parse(doc),
            Err(StyleError::NoDrawableRules)
        ));
    }

    #[test]
    fn test_misplaced_element_rejected() {
        let doc = r#"<Map><Rule><PointSymbolizer/></Rule></Map>"#;
        assert!(matches!(
            MapStyle::parse(doc),
            Err(StyleError::Misplaced { .. })
        ));
    }

    #[test]
    fn test_bad_attribute_rejected() {
        let doc = r##"<Map><Style name="a"><Rule>
            <LineSymbolizer stroke="#000" stroke-width="-2"/>
        </Rule></Style></Map>"##;
        assert!(matches!(
            MapStyle::parse(doc),
            Err(StyleError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_bad_feature_rejected() {
        let doc = r#"<Map>
            <Style name="a"><Rule><PointSymbolizer/></Rule></Style>
            <Layer name="l"><StyleName>a</StyleName>
              <Datasource><Feature>POINT (x y)</Feature></Datasource>
            </Layer>
        </Map>"#;
        assert!(matches!(MapStyle::parse(doc), Err(StyleError::Geometry(_))));
    }
}
