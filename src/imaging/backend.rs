//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the crop pipeline
//! needs: decode the selected file, render a completed crop into an
//! [`OutputSurface`], and encode that surface for the payload.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust and built on the
//! `image` crate. Tests swap in a recording mock.

use super::params::{OutputFormat, Quality, RenderParams};
use super::surface::OutputSurface;
use crate::error::Result;
use image::{ImageFormat, RgbaImage};

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A decoded source image, read-only after decode.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: RgbaImage,
    format: Option<ImageFormat>,
}

impl SourceImage {
    pub fn new(pixels: RgbaImage, format: Option<ImageFormat>) -> Self {
        Self { pixels, format }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Container format the bytes were sniffed as, if known.
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Trait for image processing backends.
///
/// Every backend must implement decode, render and encode so the session is
/// backend-agnostic. Backends are shared with blocking encode tasks, hence
/// `Send + Sync`.
pub trait ImageBackend: Send + Sync {
    /// Decode raw file bytes into a source image.
    fn decode(&self, bytes: &[u8]) -> Result<SourceImage>;

    /// Reset `surface` and draw the completed crop of `source` into it.
    fn render(
        &self,
        source: &SourceImage,
        params: &RenderParams,
        surface: &mut OutputSurface,
    ) -> Result<()>;

    /// Encode the surface pixels in the given format.
    fn encode(
        &self,
        surface: &OutputSurface,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>>;
}
