//! Shared test utilities for the avatar-crop test suite.
//!
//! Synthetic images with position-dependent pixels, so a crop that samples the
//! wrong rectangle fails a pixel comparison instead of passing by accident.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let img = gradient_image(1000, 800);
//! let bytes = png_bytes(&img);
//! let expected = region_of(&img, 50, 50, 400, 400);
//! ```

use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Opaque image whose channels encode the pixel position.
pub fn gradient_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x % 256) as u8,
            (y % 256) as u8,
            ((x / 256 + 7 * (y / 256) + x + y) % 256) as u8,
            255,
        ])
    })
}

pub fn solid_image(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}

/// Encode an image as PNG bytes, as if read from a selected file.
pub fn png_bytes(img: &RgbaImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Copy of the `width`×`height` rectangle at `(x, y)`.
pub fn region_of(img: &RgbaImage, x: u32, y: u32, width: u32, height: u32) -> RgbaImage {
    image::imageops::crop_imm(img, x, y, width, height).to_image()
}
