//! Minimal WKT reader for inline style features.
//!
//! Supports `POINT`, `LINESTRING` and `POLYGON` (outer ring plus holes),
//! 2D coordinates only.

use crate::engine::StyleError;

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(f64, f64),
    LineString(Vec<(f64, f64)>),
    /// First ring is the shell, the rest are holes.
    Polygon(Vec<Vec<(f64, f64)>>),
}

impl Geometry {
    /// Parse a WKT string.
    pub fn parse(wkt: &str) -> Result<Self, StyleError> {
        let wkt = wkt.trim();
        let open = wkt
            .find('(')
            .ok_or_else(|| geometry_error(wkt, "missing '('"))?;
        if !wkt.ends_with(')') {
            return Err(geometry_error(wkt, "missing ')'"));
        }

        let kind = wkt[..open].trim().to_ascii_uppercase();
        let body = &wkt[open + 1..wkt.len() - 1];

        match kind.as_str() {
            "POINT" => {
                let coords = parse_coords(body)?;
                match coords.as_slice() {
                    [(x, y)] => Ok(Geometry::Point(*x, *y)),
                    _ => Err(geometry_error(wkt, "POINT needs exactly one coordinate")),
                }
            }
            "LINESTRING" => {
                let coords = parse_coords(body)?;
                if coords.len() < 2 {
                    return Err(geometry_error(wkt, "LINESTRING needs at least two coordinates"));
                }
                Ok(Geometry::LineString(coords))
            }
            "POLYGON" => {
                let rings = split_rings(body)
                    .ok_or_else(|| geometry_error(wkt, "unbalanced parentheses"))?
                    .into_iter()
                    .map(parse_coords)
                    .collect::<Result<Vec<_>, _>>()?;
                if rings.is_empty() || rings.iter().any(|r| r.len() < 3) {
                    return Err(geometry_error(wkt, "POLYGON rings need at least three coordinates"));
                }
                Ok(Geometry::Polygon(rings))
            }
            other => Err(geometry_error(wkt, &format!("unsupported geometry type {:?}", other))),
        }
    }
}

fn geometry_error(wkt: &str, reason: &str) -> StyleError {
    StyleError::Geometry(format!("{}: {}", reason, wkt))
}

fn parse_coords(body: &str) -> Result<Vec<(f64, f64)>, StyleError> {
    body.split(',')
        .map(|pair| {
            let mut parts = pair.split_whitespace();
            let x = parts.next().and_then(|v| v.parse::<f64>().ok());
            let y = parts.next().and_then(|v| v.parse::<f64>().ok());
            match (x, y, parts.next()) {
                (Some(x), Some(y), None) if x.is_finite() && y.is_finite() => Ok((x, y)),
                _ => Err(StyleError::Geometry(format!("bad coordinate {:?}", pair.trim()))),
            }
        })
        .collect()
}

/// Split `(a b, c d), (e f, ...)` into the ring bodies.
fn split_rings(body: &str) -> Option<Vec<&str>> {
    let mut rings = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, ch) in body.char_indices() {
        match ch {
            '(' => {
                if depth == 0 {
                    start = i + 1;
                }
                depth += 1;
            }
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    rings.push(&body[start..i]);
                }
            }
            _ => {}
        }
    }

    (depth == 0).then_some(rings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(Geometry::parse("POINT (1 2)").unwrap(), Geometry::Point(1.0, 2.0));
        assert_eq!(Geometry::parse("point(-1.5 2e3)").unwrap(), Geometry::Point(-1.5, 2000.0));
    }

    #[test]
    fn test_parse_linestring() {
        let geom = Geometry::parse("LINESTRING (0 0, 10 10, 20 0)").unwrap();
        assert_eq!(geom, Geometry::LineString(vec![(0.0, 0.0), (10.0, 10.0), (20.0, 0.0)]));
    }

    #[test]
    fn test_parse_polygon_with_hole() {
        let geom = Geometry::parse(
            "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0), (2 2, 4 2, 4 4, 2 2))",
        )
        .unwrap();
        match geom {
            Geometry::Polygon(rings) => {
                assert_eq!(rings.len(), 2);
                assert_eq!(rings[0].len(), 5);
                assert_eq!(rings[1][1], (4.0, 2.0));
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Geometry::parse("POINT 1 2").is_err());
        assert!(Geometry::parse("POINT (1)").is_err());
        assert!(Geometry::parse("LINESTRING (0 0)").is_err());
        assert!(Geometry::parse("POLYGON ((0 0, 1 1)").is_err());
        assert!(Geometry::parse("MULTIPOINT ((0 0))").is_err());
        assert!(Geometry::parse("POINT (nan 1)").is_err());
    }
}
