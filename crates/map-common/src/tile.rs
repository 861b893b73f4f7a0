//! Web Mercator tile addressing.

use serde::{Deserialize, Serialize};

use crate::BoundingBox;

/// Half the width of the Web Mercator world in meters.
pub const WEB_MERCATOR_MAX_EXTENT: f64 = 20037508.342789244;

/// A tile coordinate (z/x/y) with top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Parse "z/x/y".
    pub fn from_path(s: &str) -> Option<Self> {
        let mut parts = s.split('/');
        let z = parts.next()?.parse().ok()?;
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { z, x, y })
    }

    /// Number of tiles along each axis at this zoom level.
    pub fn matrix_size(&self) -> u64 {
        1u64 << self.z.min(63)
    }

    /// True when x and y address a tile that exists at this zoom level.
    pub fn is_valid(&self) -> bool {
        self.z < 32 && (self.x as u64) < self.matrix_size() && (self.y as u64) < self.matrix_size()
    }

    /// Extent of this tile in EPSG:3857 meters.
    pub fn web_mercator_extent(&self) -> BoundingBox {
        let span = 2.0 * WEB_MERCATOR_MAX_EXTENT / self.matrix_size() as f64;

        let min_x = -WEB_MERCATOR_MAX_EXTENT + self.x as f64 * span;
        let max_y = WEB_MERCATOR_MAX_EXTENT - self.y as f64 * span;

        BoundingBox::new(min_x, max_y - span, min_x + span, max_y)
    }
}
