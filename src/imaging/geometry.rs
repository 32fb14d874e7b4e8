//! Pure crop geometry.
//!
//! All functions here are pure and testable without any I/O or images. Sizes
//! are in *displayed* pixels: the coordinate space of the image as the user
//! sees it while dragging. Mapping to natural source pixels happens at render
//! time (see [`DisplayTransform`](super::DisplayTransform)).

/// Unit of a [`Crop`] rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropUnit {
    /// Percent (0-100) of the displayed width/height.
    Percent,
    /// Displayed pixels.
    Pixels,
}

/// A live crop rectangle as reported by the drag/resize gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crop {
    pub unit: CropUnit,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Crop {
    pub fn percent(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            unit: CropUnit::Percent,
            x,
            y,
            width,
            height,
        }
    }

    pub fn pixels(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            unit: CropUnit::Pixels,
            x,
            y,
            width,
            height,
        }
    }
}

/// A completed crop snapshot in whole displayed pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelCrop {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelCrop {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn fits_within(&self, width: f64, height: f64) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.x + self.width <= width
            && self.y + self.height <= height
    }
}

/// Largest `(width, height)` with the given aspect that fits in the media.
fn fit_aspect(media_width: f64, media_height: f64, aspect: f64) -> (f64, f64) {
    let width = media_width.min(media_height * aspect);
    (width, width / aspect)
}

/// Smallest crop width honoring `min_size` on both edges for this aspect.
fn min_crop_width(min_size: u32, aspect: f64) -> f64 {
    min_size as f64 * aspect.max(1.0)
}

/// Convert any crop to displayed pixels, without rounding.
fn to_pixels(crop: &Crop, media_width: f64, media_height: f64) -> (f64, f64, f64, f64) {
    match crop.unit {
        CropUnit::Pixels => (crop.x, crop.y, crop.width, crop.height),
        CropUnit::Percent => (
            crop.x / 100.0 * media_width,
            crop.y / 100.0 * media_height,
            crop.width / 100.0 * media_width,
            crop.height / 100.0 * media_height,
        ),
    }
}

/// Express a crop in percent of the displayed media size.
pub fn convert_to_percent_crop(crop: &Crop, media_width: f64, media_height: f64) -> Crop {
    if crop.unit == CropUnit::Percent {
        return *crop;
    }
    Crop::percent(
        crop.x / media_width * 100.0,
        crop.y / media_height * 100.0,
        crop.width / media_width * 100.0,
        crop.height / media_height * 100.0,
    )
}

/// Snapshot a crop into whole displayed pixels.
///
/// The origin is rounded to the pixel grid. The width is rounded, then
/// trimmed to the room left before both media edges (fractional edges are
/// floored), and the height is derived from it so the snapshot keeps `aspect`.
pub fn convert_to_pixel_crop(
    crop: &Crop,
    media_width: f64,
    media_height: f64,
    aspect: f64,
) -> PixelCrop {
    let (x, y, w, _) = to_pixels(crop, media_width, media_height);
    let x = x.round().max(0.0);
    let y = y.round().max(0.0);
    let room_w = (media_width.floor() - x).max(0.0);
    let room_h = (media_height.floor() - y).max(0.0);
    let width = w
        .round()
        .min(room_w)
        .min((room_h * aspect).floor())
        .max(0.0);
    let height = (width / aspect).round().min(room_h);
    PixelCrop::new(x, y, width, height)
}

/// Default crop for freshly loaded media.
///
/// Centered, with the requested aspect, sized to `coverage` of the largest
/// rectangle of that aspect the media can hold (for a square crop: `coverage`
/// of the shorter edge). The side is floored to whole pixels and raised to
/// the minimum before centering. Returns `None` for zero-sized media.
pub fn centered_aspect_crop(
    media_width: f64,
    media_height: f64,
    aspect: f64,
    coverage: f64,
    min_size: u32,
) -> Option<Crop> {
    if !(media_width > 0.0 && media_height > 0.0) {
        return None;
    }
    let (fit_w, _) = fit_aspect(media_width, media_height, aspect);
    let min_w = min_crop_width(min_size, aspect).min(fit_w);
    let width = (fit_w * coverage).floor().clamp(min_w, fit_w);
    let height = width / aspect;
    let x = ((media_width - width) / 2.0).floor();
    let y = ((media_height - height) / 2.0).floor();
    let crop = Crop::pixels(x, y, width, height);
    Some(constrain_crop(
        &crop,
        media_width,
        media_height,
        aspect,
        min_size,
    ))
}

/// Enforce the crop invariants, returning the crop in percent units.
///
/// - The aspect is enforced by shrinking whichever edge is too long.
/// - The crop never exceeds the largest rectangle of that aspect in the media.
/// - Both edges are at least `min_size`, unless the media is smaller than
///   that, in which case the largest fitting rectangle is used.
/// - The origin is moved (never the size) to keep the crop in bounds.
pub fn constrain_crop(
    crop: &Crop,
    media_width: f64,
    media_height: f64,
    aspect: f64,
    min_size: u32,
) -> Crop {
    let (x, y, w, h) = to_pixels(crop, media_width, media_height);
    let (max_w, _) = fit_aspect(media_width, media_height, aspect);
    let min_w = min_crop_width(min_size, aspect).min(max_w);

    let width = w.min(h.max(0.0) * aspect).clamp(min_w, max_w);
    let height = width / aspect;
    let x = x.clamp(0.0, (media_width - width).max(0.0));
    let y = y.clamp(0.0, (media_height - height).max(0.0));

    convert_to_percent_crop(
        &Crop::pixels(x, y, width, height),
        media_width,
        media_height,
    )
}

/// Pixel size of the render target for a completed crop.
///
/// `scale` is the natural-to-displayed factor per axis. Each edge is floored
/// and never drops below one pixel.
pub fn render_target_size(crop: &PixelCrop, scale: (f64, f64), device_pixel_ratio: f64) -> (u32, u32) {
    let w = (crop.width * scale.0 * device_pixel_ratio).floor().max(1.0);
    let h = (crop.height * scale.1 * device_pixel_ratio).floor().max(1.0);
    (w as u32, h as u32)
}
