//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`session`](crate::session) (which decides when and
//! what to render) and the [`backend`](super::backend) (which does the pixel
//! work). This separation allows swapping backends (e.g. for testing with a
//! mock) without changing session logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`OutputFormat`]: Encoding of the emitted payload (PNG, JPEG, WebP).
//! - [`DisplayTransform`]: How the source image is laid out on screen: displayed size, rotation, scale.
//! - [`RenderParams`]: Everything one render needs: completed crop, display transform, pixel ratio.

use super::geometry::PixelCrop;
use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Encoding used for the embedded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub fn mime(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Webp => "image/webp",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(OutputFormat::Png),
            "image/jpeg" | "image/jpg" => Some(OutputFormat::Jpeg),
            "image/webp" => Some(OutputFormat::Webp),
            _ => None,
        }
    }
}

/// On-screen layout of the source image.
///
/// Crop rectangles are expressed in displayed pixels; the transform is what
/// maps them back to the natural pixels of the source. `rotate_degrees` and
/// `scale` describe a transform applied around the image center (clockwise
/// rotation, uniform scale) that the render inverts before sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    pub displayed_width: f64,
    pub displayed_height: f64,
    pub rotate_degrees: f64,
    pub scale: f64,
}

impl DisplayTransform {
    /// Image shown at its natural size, untransformed.
    pub fn natural(width: u32, height: u32) -> Self {
        Self::fitted(width as f64, height as f64)
    }

    /// Image shown at the given on-screen size, untransformed.
    pub fn fitted(displayed_width: f64, displayed_height: f64) -> Self {
        Self {
            displayed_width,
            displayed_height,
            rotate_degrees: 0.0,
            scale: 1.0,
        }
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotate_degrees = degrees;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Natural-to-displayed scale factors `(x, y)`.
    pub fn scale_factors(&self, natural_width: u32, natural_height: u32) -> (f64, f64) {
        (
            natural_width as f64 / self.displayed_width,
            natural_height as f64 / self.displayed_height,
        )
    }

    /// True when only a translation separates display and source pixels.
    pub fn is_axis_aligned(&self) -> bool {
        self.rotate_degrees.rem_euclid(360.0) == 0.0 && self.scale == 1.0
    }

    pub fn is_usable(&self) -> bool {
        self.displayed_width.is_finite()
            && self.displayed_height.is_finite()
            && self.displayed_width > 0.0
            && self.displayed_height > 0.0
            && self.scale.is_finite()
            && self.scale != 0.0
            && self.rotate_degrees.is_finite()
    }
}

/// Parameters for one render of the completed crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    /// Completed crop in displayed pixels.
    pub crop: PixelCrop,
    pub transform: DisplayTransform,
    pub device_pixel_ratio: f64,
}
