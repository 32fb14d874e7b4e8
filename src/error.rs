//! Crate-wide error type.
//!
//! Every fallible operation in the pipeline returns [`AvatarError`]. The two
//! failures a save can hit (no rendered surface yet, encoder failure) are
//! separate variants so a host can tell "crop first" apart from "try again".

use crate::config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Selected file is not a recognized image format")]
    NotAnImage,
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Image has zero width or height ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("No image is loaded in the editing session")]
    NoImage,
    #[error("Crop surface does not exist")]
    NoSurface,
    #[error("Failed to encode crop surface: {0}")]
    Encode(String),
    #[error("Invalid embedded image payload: {0}")]
    InvalidPayload(String),
    #[error("Editing session is closed")]
    SessionClosed,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, AvatarError>;
