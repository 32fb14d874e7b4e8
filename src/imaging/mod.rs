//! Image processing: pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::guess_format` + `load_from_memory_with_format` |
//! | **Render** | `crop_imm` fast path, otherwise inverse mapping + bilinear sampling on `rayon` |
//! | **Encode** | PNG / JPEG / lossless WebP via `image::codecs` |
//! | **Payload** | `base64` data URL, `sha2` fingerprint |
//!
//! The module is split into:
//! - **Geometry**: Pure crop math in displayed pixels (unit testable)
//! - **Parameters**: Data structures describing one render or encode
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Surface**: The [`OutputSurface`] a render draws into
//! - **Payload**: [`EncodedAvatar`] `data:` URLs

pub mod backend;
pub mod geometry;
mod params;
pub mod payload;
pub mod rust_backend;
mod surface;

pub use backend::{Dimensions, ImageBackend, SourceImage};
pub use geometry::{Crop, CropUnit, PixelCrop};
pub use params::{DisplayTransform, OutputFormat, Quality, RenderParams};
pub use payload::{EncodedAvatar, is_data_url, parse_data_url};
pub use rust_backend::RustBackend;
pub use surface::OutputSurface;
