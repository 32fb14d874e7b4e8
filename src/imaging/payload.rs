//! Embedded image payloads (`data:` URLs).
//!
//! The widget's output is a self-describing string a browser can use directly
//! as an image source: `data:<mime>;base64,<bytes>`. [`EncodedAvatar`] wraps
//! one; [`parse_data_url`] splits one back into its MIME type and bytes.

use super::params::OutputFormat;
use crate::error::{AvatarError, Result};
use base64::{Engine as _, engine::general_purpose};
use sha2::{Digest, Sha256};
use std::fmt;

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// A finished avatar payload. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAvatar {
    url: String,
    format: OutputFormat,
}

impl EncodedAvatar {
    /// Wrap encoded image bytes into a `data:` URL.
    pub fn from_encoded(format: OutputFormat, bytes: &[u8]) -> Self {
        let b64 = general_purpose::STANDARD.encode(bytes);
        Self {
            url: format!("{DATA_PREFIX}{}{BASE64_MARKER}{b64}", format.mime()),
            format,
        }
    }

    /// Parse an existing `data:` URL, e.g. a previously committed value.
    pub fn parse(url: &str) -> Result<Self> {
        let (mime, _) = parse_data_url(url)?;
        let format = OutputFormat::from_mime(mime)
            .ok_or_else(|| AvatarError::InvalidPayload(format!("unsupported type {mime}")))?;
        Ok(Self {
            url: url.to_string(),
            format,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn into_string(self) -> String {
        self.url
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// The raw encoded image bytes.
    pub fn decode_bytes(&self) -> Result<Vec<u8>> {
        parse_data_url(&self.url).map(|(_, bytes)| bytes)
    }

    /// Short SHA-256 prefix of the URL, for logs.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.url.as_bytes());
        format!("{:x}", digest)[..12].to_string()
    }
}

impl fmt::Display for EncodedAvatar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Split `data:image/<type>;base64,<payload>` into MIME type and bytes.
pub fn parse_data_url(url: &str) -> Result<(&str, Vec<u8>)> {
    let rest = url
        .strip_prefix(DATA_PREFIX)
        .ok_or_else(|| AvatarError::InvalidPayload("missing data: prefix".into()))?;
    let marker = rest
        .find(BASE64_MARKER)
        .ok_or_else(|| AvatarError::InvalidPayload("missing ;base64, marker".into()))?;
    let mime = &rest[..marker];
    if !mime.starts_with("image/") {
        return Err(AvatarError::InvalidPayload(format!("not an image type: {mime}")));
    }
    let bytes = general_purpose::STANDARD
        .decode(&rest[marker + BASE64_MARKER.len()..])
        .map_err(|e| AvatarError::InvalidPayload(format!("base64: {e}")))?;
    Ok((mime, bytes))
}

/// Whether a value looks like an embedded payload rather than a remote URL.
pub fn is_data_url(value: &str) -> bool {
    value.starts_with(DATA_PREFIX)
}
