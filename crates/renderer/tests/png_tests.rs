//! Tests for PNG encoding functionality.
//!
//! Covers the indexed and RGBA encoders and the automatic choice between
//! them for flat-filled map images.

use renderer::png::{create_png, create_png_auto, create_png_indexed};
use std::collections::HashSet;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

// ============================================================================
// Helper functions
// ============================================================================

/// Pack RGBA bytes into a u32 for color counting
fn pack_color(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16) | ((a as u32) << 24)
}

/// Generate map-like pixel data: land, water and a few road colours on a
/// transparent background.
fn generate_map_pixels(width: usize, height: usize) -> Vec<u8> {
    let palette: [[u8; 4]; 6] = [
        [0, 0, 0, 0],         // background
        [242, 239, 233, 255], // land
        [170, 211, 223, 255], // water
        [255, 255, 255, 255], // road casing
        [248, 213, 168, 255], // road fill
        [200, 200, 200, 128], // semi-transparent overlay
    ];
    let mut pixels = Vec::with_capacity(width * height * 4);

    for y in 0..height {
        for x in 0..width {
            let idx = if (x + y) % 37 == 0 {
                3
            } else if (x * 3 + y) % 41 < 2 {
                4
            } else if x > width / 2 && y > height / 3 {
                2
            } else if y % 64 == 0 {
                5
            } else if x < width / 8 {
                0
            } else {
                1
            };
            pixels.extend_from_slice(&palette[idx]);
        }
    }
    pixels
}

/// Count unique colors in pixel data
fn count_unique_colors(pixels: &[u8]) -> usize {
    let mut unique: HashSet<u32> = HashSet::new();
    for chunk in pixels.chunks_exact(4) {
        unique.insert(pack_color(chunk[0], chunk[1], chunk[2], chunk[3]));
    }
    unique.len()
}

/// Read the colour type byte out of the IHDR chunk.
fn color_type(png: &[u8]) -> u8 {
    // signature (8) + length (4) + "IHDR" (4) + width (4) + height (4) + depth (1)
    png[8 + 4 + 4 + 4 + 4 + 1]
}

fn has_chunk(png: &[u8], name: &[u8; 4]) -> bool {
    png.windows(4).any(|w| w == name)
}

// ============================================================================
// Basic PNG creation tests
// ============================================================================

#[test]
fn test_create_png_simple() {
    let pixels = [
        255, 0, 0, 255, // red
        0, 255, 0, 255, // green
        0, 255, 0, 255, // green
        255, 0, 0, 255, // red
    ];

    let png = create_png_auto(&pixels, 2, 2).unwrap();
    assert_eq!(&png[0..8], &PNG_SIGNATURE);
    assert_eq!(color_type(&png), 3);
    assert!(has_chunk(&png, b"PLTE"));
    // All opaque, so no transparency chunk
    assert!(!has_chunk(&png, b"tRNS"));
}

#[test]
fn test_create_png_rgba() {
    let pixels = [
        255, 0, 0, 255, // red
        0, 255, 0, 255, // green
        0, 0, 255, 255, // blue
        255, 255, 0, 255, // yellow
    ];

    let png = create_png(&pixels, 2, 2).unwrap();
    assert_eq!(&png[0..8], &PNG_SIGNATURE);
    assert_eq!(color_type(&png), 6);
}

#[test]
fn test_create_png_with_transparency() {
    let pixels = [
        255, 0, 0, 255, // red, opaque
        0, 0, 0, 0, // transparent
        0, 255, 0, 128, // green, semi-transparent
        0, 0, 255, 255, // blue, opaque
    ];

    let png = create_png_auto(&pixels, 2, 2).unwrap();
    assert!(has_chunk(&png, b"tRNS"));
}

#[test]
fn test_indexed_rejects_wrong_index_count() {
    let palette = [(0, 0, 0, 255)];
    assert!(create_png_indexed(2, 2, &palette, &[0, 0, 0]).is_err());
}

// ============================================================================
// Format selection tests
// ============================================================================

#[test]
fn test_create_png_rgba_fallback_many_colors() {
    let mut pixels = Vec::with_capacity(300 * 4);
    for i in 0..300 {
        pixels.push((i % 256) as u8);
        pixels.push(((i / 2) % 256) as u8);
        pixels.push(((i / 3) % 256) as u8);
        pixels.push(255);
    }

    let png = create_png_auto(&pixels, 300, 1).unwrap();
    assert_eq!(color_type(&png), 6);
}

#[test]
fn test_map_tile_prefers_indexed() {
    let pixels = generate_map_pixels(256, 256);
    assert!(count_unique_colors(&pixels) <= 256);

    let indexed = create_png_auto(&pixels, 256, 256).unwrap();
    let rgba = create_png(&pixels, 256, 256).unwrap();

    assert_eq!(color_type(&indexed), 3);
    assert!(
        indexed.len() < rgba.len(),
        "Indexed PNG ({} bytes) should be smaller than RGBA ({} bytes)",
        indexed.len(),
        rgba.len()
    );
}

// ============================================================================
// Edge case tests
// ============================================================================

#[test]
fn test_single_pixel() {
    let pixels = [255, 0, 0, 255];
    assert!(create_png_auto(&pixels, 1, 1).is_ok());
}

#[test]
fn test_single_color_image() {
    let mut pixels = Vec::with_capacity(100 * 100 * 4);
    for _ in 0..(100 * 100) {
        pixels.extend_from_slice(&[128, 64, 32, 255]);
    }

    let png = create_png_auto(&pixels, 100, 100).unwrap();
    assert!(png.len() < 1000, "Single color 100x100 should be very small");
}

#[test]
fn test_all_transparent() {
    let pixels = vec![0u8; 256 * 256 * 4];
    let png = create_png_auto(&pixels, 256, 256).unwrap();
    assert_eq!(color_type(&png), 3);
}

#[test]
fn test_grayscale_gradient() {
    // Exactly 256 unique colors still fits the palette
    let mut pixels = Vec::with_capacity(256 * 4);
    for i in 0..256 {
        let v = i as u8;
        pixels.extend_from_slice(&[v, v, v, 255]);
    }

    let png = create_png_auto(&pixels, 256, 1).unwrap();
    assert_eq!(color_type(&png), 3);
}

#[test]
fn test_grayscale_gradient_plus_one() {
    let mut pixels = Vec::with_capacity(257 * 4);
    for i in 0..256 {
        let v = i as u8;
        pixels.extend_from_slice(&[v, v, v, 255]);
    }
    pixels.extend_from_slice(&[128, 0, 0, 255]);

    let png = create_png_auto(&pixels, 257, 1).unwrap();
    assert_eq!(color_type(&png), 6);
}
