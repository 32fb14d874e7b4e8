//! Render destination.
//!
//! An [`OutputSurface`] is the raster a completed crop is drawn into. It is
//! owned by the editing session and handed to the backend mutably for one
//! render at a time. Every render starts with [`OutputSurface::reset`], which
//! reallocates the pixels fully transparent, so no state carries over from a
//! previous render.

use image::{Rgba, RgbaImage};

#[derive(Debug, Clone)]
pub struct OutputSurface {
    pixels: RgbaImage,
    device_pixel_ratio: f64,
    renders: u64,
}

impl Default for OutputSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSurface {
    /// An empty 0×0 surface that has never been rendered.
    pub fn new() -> Self {
        Self {
            pixels: RgbaImage::new(0, 0),
            device_pixel_ratio: 1.0,
            renders: 0,
        }
    }

    /// Resize to `width`×`height` physical pixels and clear to transparent.
    pub fn reset(&mut self, width: u32, height: u32, device_pixel_ratio: f64) {
        self.pixels = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
        self.device_pixel_ratio = device_pixel_ratio;
        self.renders += 1;
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    /// Number of times the surface has been reset for a render.
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    pub fn has_content(&self) -> bool {
        self.renders > 0 && self.width() > 0 && self.height() > 0
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_surface_has_no_content() {
        let surface = OutputSurface::new();
        assert_eq!(surface.dimensions(), (0, 0));
        assert!(!surface.has_content());
    }

    #[test]
    fn reset_clears_previous_pixels() {
        let mut surface = OutputSurface::new();
        surface.reset(4, 4, 1.0);
        surface.pixels_mut().put_pixel(1, 1, Rgba([255, 0, 0, 255]));

        surface.reset(4, 4, 1.0);
        assert!(surface.pixels().pixels().all(|p| p.0 == [0, 0, 0, 0]));
        assert_eq!(surface.render_count(), 2);
    }

    #[test]
    fn reset_resizes_and_records_ratio() {
        let mut surface = OutputSurface::new();
        surface.reset(8, 6, 2.0);
        assert_eq!(surface.dimensions(), (8, 6));
        assert_eq!(surface.device_pixel_ratio(), 2.0);
        assert!(surface.has_content());
    }
}
