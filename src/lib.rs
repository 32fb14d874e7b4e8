//! # Avatar Crop
//!
//! The image pipeline behind an avatar picker: the user selects a photo,
//! adjusts a square crop over it, and saves. The result is a small image
//! embedded in a `data:` URL the host stores as the new avatar value.
//!
//! # Architecture: One Session, Three Backend Operations
//!
//! ```text
//! select file ──▶ decode ──▶ default crop ──▶ adjust ──▶ complete ──(500ms)──▶ render
//!                                                                                │
//!                                                 value ◀── data URL ◀── encode ◀┘ save
//! ```
//!
//! Pixel work goes through the [`imaging::ImageBackend`] trait (decode,
//! render, encode). Everything else is pure state kept in a
//! [`session::CropSession`]: which selection is current, the live crop, the
//! snapshot being rendered, and the pending debounced render. The session
//! never calls back into the host; side effects it needs (clearing the file
//! control) are queued as [`session::HostCommand`]s.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`input`] | `AvatarInput`: committed value, label id, change callback |
//! | [`session`] | Editing state machine: selection, crop, debounced render, save |
//! | [`debounce`] | Deadline-based render scheduling on the tokio clock |
//! | [`imaging`] | Crop geometry, render, codecs, `data:` payloads |
//! | [`config`] | `avatar.toml` loading, merging and validation |
//! | [`error`] | `AvatarError`, the crate-wide error type |
//!
//! # Design Decisions
//!
//! ## Crops Live in Percent, Renders in Pixels
//!
//! The live crop is stored relative to the displayed image so a relayout
//! (window resize, different display scale) keeps it on the same part of the
//! photo. When a gesture completes the crop is snapshotted to whole displayed
//! pixels, and the render maps those back to natural pixels of the source.
//! The output therefore has the source's resolution, not the screen's.
//!
//! ## Debounced Rendering
//!
//! Dragging a crop handle completes many crops in quick succession. Only the
//! last one within the quiet period is rendered. Saving flushes a render that
//! is still waiting, so the payload always matches the last completed crop.
//!
//! ## Last Selection Wins
//!
//! File reads are asynchronous and may finish out of order. Each selection
//! carries a ticket; completions for anything but the latest ticket are
//! dropped, so the session never shows one image with another's crop.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resampling and encoding use the `image` crate with no system
//! libraries. Renders are deterministic, and an untransformed crop at a 1:1
//! pixel ratio is a byte-exact copy of the source rectangle.

pub mod config;
pub mod debounce;
pub mod error;
pub mod imaging;
pub mod input;
pub mod session;

pub use error::{AvatarError, Result};

#[cfg(test)]
pub(crate) mod test_helpers;
