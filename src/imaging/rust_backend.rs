//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Sniff | `image::guess_format` |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::load_from_memory_with_format` |
//! | Render, axis-aligned 1:1 | `image::imageops::crop_imm` + `replace` (exact copy) |
//! | Render, general | inverse affine mapping + bilinear sampling, rows in parallel via `rayon` |
//! | Encode → PNG | `ImageBuffer::write_to` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (RGB, quality) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |

use super::backend::{ImageBackend, SourceImage};
use super::geometry::render_target_size;
use super::params::{DisplayTransform, OutputFormat, Quality, RenderParams};
use super::surface::OutputSurface;
use crate::error::{AvatarError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, RgbaImage};
use rayon::prelude::*;
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a destination pixel center back to a point in natural source pixels.
///
/// The forward transform draws the source with, in order: a rotation and
/// uniform scale about the image center, a translation by the crop origin,
/// and a scale by the device pixel ratio. This holds its inverse.
#[derive(Debug, Clone, Copy)]
struct InverseMapping {
    inv_ratio: f64,
    crop_x: f64,
    crop_y: f64,
    center_x: f64,
    center_y: f64,
    // Inverse rotation divided by scale, row-major 2x2.
    m00: f64,
    m01: f64,
    m10: f64,
    m11: f64,
}

/// `(sin, cos)` with exact values on quarter turns.
fn sin_cos_degrees(degrees: f64) -> (f64, f64) {
    let turn = degrees.rem_euclid(360.0);
    match turn {
        t if t == 0.0 => (0.0, 1.0),
        t if t == 90.0 => (1.0, 0.0),
        t if t == 180.0 => (0.0, -1.0),
        t if t == 270.0 => (-1.0, 0.0),
        t => t.to_radians().sin_cos(),
    }
}

impl InverseMapping {
    fn new(source: &SourceImage, params: &RenderParams) -> Self {
        let t: &DisplayTransform = &params.transform;
        let (sx, sy) = t.scale_factors(source.width(), source.height());
        let (sin, cos) = sin_cos_degrees(t.rotate_degrees);
        let inv_scale = 1.0 / t.scale;
        Self {
            inv_ratio: 1.0 / params.device_pixel_ratio,
            crop_x: params.crop.x * sx,
            crop_y: params.crop.y * sy,
            center_x: source.width() as f64 / 2.0,
            center_y: source.height() as f64 / 2.0,
            m00: cos * inv_scale,
            m01: sin * inv_scale,
            m10: -sin * inv_scale,
            m11: cos * inv_scale,
        }
    }

    fn source_point(&self, dest_x: f64, dest_y: f64) -> (f64, f64) {
        let dx = dest_x * self.inv_ratio + self.crop_x - self.center_x;
        let dy = dest_y * self.inv_ratio + self.crop_y - self.center_y;
        (
            self.center_x + self.m00 * dx + self.m01 * dy,
            self.center_y + self.m10 * dx + self.m11 * dy,
        )
    }
}

/// Bilinear sample at `(x, y)` in continuous pixel coordinates.
///
/// Pixel `k` covers `[k, k + 1)`; its value sits at `k + 0.5`. Points outside
/// the image are transparent. Neighbors past the edge clamp to the edge.
fn sample_bilinear(src: &RgbaImage, x: f64, y: f64) -> [u8; 4] {
    let (w, h) = src.dimensions();
    if !(x >= 0.0 && y >= 0.0 && x < w as f64 && y < h as f64) {
        return [0, 0, 0, 0];
    }
    let fx = x - 0.5;
    let fy = y - 0.5;
    let x0f = fx.floor();
    let y0f = fy.floor();
    let tx = fx - x0f;
    let ty = fy - y0f;

    let clamp_x = |v: f64| v.clamp(0.0, (w - 1) as f64) as u32;
    let clamp_y = |v: f64| v.clamp(0.0, (h - 1) as f64) as u32;
    let (x0, x1) = (clamp_x(x0f), clamp_x(x0f + 1.0));
    let (y0, y1) = (clamp_y(y0f), clamp_y(y0f + 1.0));

    let p00 = src.get_pixel(x0, y0).0;
    let p10 = src.get_pixel(x1, y0).0;
    let p01 = src.get_pixel(x0, y1).0;
    let p11 = src.get_pixel(x1, y1).0;

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] as f64 * (1.0 - tx) + p10[c] as f64 * tx;
        let bottom = p01[c] as f64 * (1.0 - tx) + p11[c] as f64 * tx;
        let v = top * (1.0 - ty) + bottom * ty;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Whole-pixel copy is exact when source and destination pixels line up.
fn is_pixel_aligned(source: &SourceImage, params: &RenderParams) -> bool {
    let (sx, sy) = params
        .transform
        .scale_factors(source.width(), source.height());
    let crop_x = params.crop.x * sx;
    let crop_y = params.crop.y * sy;
    params.transform.is_axis_aligned()
        && params.device_pixel_ratio == 1.0
        && crop_x.fract() == 0.0
        && crop_y.fract() == 0.0
        && crop_x >= 0.0
        && crop_y >= 0.0
}

fn render_aligned(source: &SourceImage, params: &RenderParams, surface: &mut OutputSurface) {
    let (sx, sy) = params
        .transform
        .scale_factors(source.width(), source.height());
    let (w, h) = surface.dimensions();
    let region = image::imageops::crop_imm(
        source.pixels(),
        (params.crop.x * sx) as u32,
        (params.crop.y * sy) as u32,
        w,
        h,
    )
    .to_image();
    image::imageops::replace(surface.pixels_mut(), &region, 0, 0);
}

fn render_mapped(source: &SourceImage, params: &RenderParams, surface: &mut OutputSurface) {
    let mapping = InverseMapping::new(source, params);
    let width = surface.width() as usize;
    let src = source.pixels();
    let buf: &mut [u8] = surface.pixels_mut();

    buf.par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(row, line)| {
            let dest_y = row as f64 + 0.5;
            for (col, px) in line.chunks_exact_mut(4).enumerate() {
                let (x, y) = mapping.source_point(col as f64 + 0.5, dest_y);
                px.copy_from_slice(&sample_bilinear(src, x, y));
            }
        });
}

fn encode_png(pixels: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    pixels
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| AvatarError::Encode(format!("PNG encode failed: {e}")))?;
    Ok(buf.into_inner())
}

fn encode_jpeg(pixels: &RgbaImage, quality: Quality) -> Result<Vec<u8>> {
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.value() as u8)
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| AvatarError::Encode(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

fn encode_webp(pixels: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    WebPEncoder::new_lossless(&mut buf)
        .write_image(
            pixels.as_raw(),
            pixels.width(),
            pixels.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| AvatarError::Encode(format!("WebP encode failed: {e}")))?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<SourceImage> {
        let format = image::guess_format(bytes).map_err(|_| AvatarError::NotAnImage)?;
        if !format.reading_enabled() {
            return Err(AvatarError::NotAnImage);
        }
        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| AvatarError::Decode(e.to_string()))?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(AvatarError::EmptyImage {
                width: decoded.width(),
                height: decoded.height(),
            });
        }
        Ok(SourceImage::new(decoded.to_rgba8(), Some(format)))
    }

    fn render(
        &self,
        source: &SourceImage,
        params: &RenderParams,
        surface: &mut OutputSurface,
    ) -> Result<()> {
        if params.crop.is_empty() {
            return Err(AvatarError::NoSurface);
        }
        let scale = params
            .transform
            .scale_factors(source.width(), source.height());
        let (width, height) = render_target_size(&params.crop, scale, params.device_pixel_ratio);
        surface.reset(width, height, params.device_pixel_ratio);

        if is_pixel_aligned(source, params) {
            render_aligned(source, params, surface);
        } else {
            render_mapped(source, params, surface);
        }
        Ok(())
    }

    fn encode(
        &self,
        surface: &OutputSurface,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>> {
        if !surface.has_content() {
            return Err(AvatarError::NoSurface);
        }
        match format {
            OutputFormat::Png => encode_png(surface.pixels()),
            OutputFormat::Jpeg => encode_jpeg(surface.pixels(), quality),
            OutputFormat::Webp => encode_webp(surface.pixels()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::geometry::PixelCrop;
    use crate::test_helpers::{gradient_image, png_bytes, region_of, solid_image};

    fn render(source: &SourceImage, params: RenderParams) -> OutputSurface {
        let mut surface = OutputSurface::new();
        RustBackend::new()
            .render(source, &params, &mut surface)
            .unwrap();
        surface
    }

    fn natural_params(source: &SourceImage, crop: PixelCrop) -> RenderParams {
        RenderParams {
            crop,
            transform: DisplayTransform::natural(source.width(), source.height()),
            device_pixel_ratio: 1.0,
        }
    }

    // =========================================================================
    // decode
    // =========================================================================

    #[test]
    fn decode_png_bytes() {
        let bytes = png_bytes(&gradient_image(64, 48));
        let source = RustBackend::new().decode(&bytes).unwrap();
        assert_eq!(source.width(), 64);
        assert_eq!(source.height(), 48);
        assert_eq!(source.format(), Some(ImageFormat::Png));
        assert_eq!(source.pixels(), &gradient_image(64, 48));
    }

    #[test]
    fn decode_text_is_not_an_image() {
        let result = RustBackend::new().decode(b"hello, this is not an image");
        assert!(matches!(result, Err(AvatarError::NotAnImage)));
    }

    #[test]
    fn decode_truncated_png_fails() {
        let bytes = png_bytes(&gradient_image(64, 48));
        let result = RustBackend::new().decode(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(AvatarError::Decode(_))));
    }

    // =========================================================================
    // render
    // =========================================================================

    #[test]
    fn aligned_render_copies_exact_region() {
        let source = SourceImage::new(gradient_image(1000, 800), None);
        let crop = PixelCrop::new(50.0, 50.0, 400.0, 400.0);
        let surface = render(&source, natural_params(&source, crop));

        assert_eq!(surface.dimensions(), (400, 400));
        assert_eq!(surface.pixels(), &region_of(source.pixels(), 50, 50, 400, 400));
    }

    #[test]
    fn mapped_render_matches_aligned_at_identity() {
        let source = SourceImage::new(gradient_image(120, 90), None);
        let params = natural_params(&source, PixelCrop::new(10.0, 5.0, 60.0, 60.0));

        let mut mapped = OutputSurface::new();
        mapped.reset(60, 60, 1.0);
        render_mapped(&source, &params, &mut mapped);

        assert_eq!(mapped.pixels(), &region_of(source.pixels(), 10, 5, 60, 60));
    }

    #[test]
    fn pixel_ratio_two_doubles_output_size() {
        let source = SourceImage::new(solid_image(40, 40, [200, 100, 50, 255]), None);
        let params = RenderParams {
            device_pixel_ratio: 2.0,
            ..natural_params(&source, PixelCrop::new(4.0, 4.0, 10.0, 10.0))
        };
        let surface = render(&source, params);

        assert_eq!(surface.dimensions(), (20, 20));
        assert_eq!(surface.device_pixel_ratio(), 2.0);
        assert!(surface.pixels().pixels().all(|p| p.0 == [200, 100, 50, 255]));
    }

    #[test]
    fn display_scale_maps_to_natural_pixels() {
        // Shown at half size: a 100px displayed crop covers 200 natural px.
        let source = SourceImage::new(gradient_image(400, 400), None);
        let params = RenderParams {
            crop: PixelCrop::new(25.0, 25.0, 100.0, 100.0),
            transform: DisplayTransform::fitted(200.0, 200.0),
            device_pixel_ratio: 1.0,
        };
        let surface = render(&source, params);

        assert_eq!(surface.dimensions(), (200, 200));
        assert_eq!(surface.pixels(), &region_of(source.pixels(), 50, 50, 200, 200));
    }

    #[test]
    fn half_turn_rotation_is_inverted_before_sampling() {
        let source = SourceImage::new(gradient_image(8, 8), None);
        let params = RenderParams {
            transform: DisplayTransform::natural(8, 8).with_rotation(180.0),
            ..natural_params(&source, PixelCrop::new(0.0, 0.0, 8.0, 8.0))
        };
        let surface = render(&source, params);

        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(
                    surface.pixels().get_pixel(x, y),
                    source.pixels().get_pixel(7 - x, 7 - y),
                    "at ({x}, {y})"
                );
            }
        }
    }

    #[test]
    fn quarter_turn_rotation_is_clockwise() {
        let source = SourceImage::new(gradient_image(6, 6), None);
        let params = RenderParams {
            transform: DisplayTransform::natural(6, 6).with_rotation(90.0),
            ..natural_params(&source, PixelCrop::new(0.0, 0.0, 6.0, 6.0))
        };
        let surface = render(&source, params);

        // Source top-left ends up top-right.
        assert_eq!(
            surface.pixels().get_pixel(5, 0),
            source.pixels().get_pixel(0, 0)
        );
        for y in 0..6 {
            for x in 0..6 {
                assert_eq!(
                    surface.pixels().get_pixel(x, y),
                    source.pixels().get_pixel(y, 5 - x)
                );
            }
        }
    }

    #[test]
    fn zoomed_out_image_leaves_transparent_margin() {
        let source = SourceImage::new(gradient_image(10, 10), None);
        let params = RenderParams {
            transform: DisplayTransform::natural(10, 10).with_scale(0.5),
            ..natural_params(&source, PixelCrop::new(0.0, 0.0, 10.0, 10.0))
        };
        let surface = render(&source, params);

        assert_eq!(surface.pixels().get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(surface.pixels().get_pixel(5, 5).0[3], 255);
    }

    #[test]
    fn repeated_render_is_pixel_identical() {
        let source = SourceImage::new(gradient_image(300, 200), None);
        let params = RenderParams {
            crop: PixelCrop::new(13.0, 7.0, 150.0, 150.0),
            transform: DisplayTransform::natural(300, 200).with_rotation(33.0),
            device_pixel_ratio: 1.5,
        };

        let mut surface = OutputSurface::new();
        let backend = RustBackend::new();
        backend.render(&source, &params, &mut surface).unwrap();
        let first = surface.pixels().clone();
        backend.render(&source, &params, &mut surface).unwrap();

        assert_eq!(surface.pixels(), &first);
        assert_eq!(surface.render_count(), 2);
    }

    #[test]
    fn empty_crop_is_rejected() {
        let source = SourceImage::new(gradient_image(10, 10), None);
        let params = natural_params(&source, PixelCrop::new(0.0, 0.0, 0.0, 0.0));
        let mut surface = OutputSurface::new();
        let result = RustBackend::new().render(&source, &params, &mut surface);
        assert!(matches!(result, Err(AvatarError::NoSurface)));
    }

    // =========================================================================
    // encode
    // =========================================================================

    fn rendered_surface() -> OutputSurface {
        let source = SourceImage::new(gradient_image(64, 64), None);
        render(&source, natural_params(&source, PixelCrop::new(8.0, 8.0, 32.0, 32.0)))
    }

    #[test]
    fn png_round_trip_is_lossless() {
        let surface = rendered_surface();
        let bytes = RustBackend::new()
            .encode(&surface, OutputFormat::Png, Quality::default())
            .unwrap();
        let decoded = RustBackend::new().decode(&bytes).unwrap();
        assert_eq!(decoded.pixels(), surface.pixels());
    }

    #[test]
    fn webp_round_trip_is_lossless() {
        let surface = rendered_surface();
        let bytes = RustBackend::new()
            .encode(&surface, OutputFormat::Webp, Quality::default())
            .unwrap();
        let decoded = RustBackend::new().decode(&bytes).unwrap();
        assert_eq!(decoded.format(), Some(ImageFormat::WebP));
        assert_eq!(decoded.pixels(), surface.pixels());
    }

    #[test]
    fn jpeg_round_trip_keeps_dimensions() {
        let surface = rendered_surface();
        let bytes = RustBackend::new()
            .encode(&surface, OutputFormat::Jpeg, Quality::new(95))
            .unwrap();
        let decoded = RustBackend::new().decode(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), surface.dimensions());
    }

    #[test]
    fn encode_unrendered_surface_fails() {
        let result =
            RustBackend::new().encode(&OutputSurface::new(), OutputFormat::Png, Quality::default());
        assert!(matches!(result, Err(AvatarError::NoSurface)));
    }
}
