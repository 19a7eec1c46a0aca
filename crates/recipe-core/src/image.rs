//! Validation of uploaded food photos
//!
//! Clients send photos as base64 strings, optionally wrapped in a data URI.
//! The declared MIME type is ignored; the format is sniffed from the decoded
//! bytes instead.

use base64::{
    alphabet,
    engine::{
        general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD},
        DecodePaddingMode,
    },
    Engine,
};
use thiserror::Error;
use tracing::{debug, warn};

/// Smallest decoded payload that can still be a real image
pub const MIN_IMAGE_BYTES: usize = 37;

/// Standard alphabet, padding optional
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Image payload too small: {0} bytes")]
    TooSmall(usize),

    #[error("Malformed data URI: missing ',' separator")]
    InvalidDataUri,

    #[error("Failed to decode base64 image: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("No valid images")]
    NoValidImages,
}

/// Image formats accepted by the upstream vision model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Sniff the format from magic bytes, defaulting to JPEG
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            ImageFormat::Png
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            ImageFormat::Jpeg
        } else if bytes.starts_with(&[0x47, 0x49, 0x46, 0x38]) {
            ImageFormat::Gif
        } else if bytes.starts_with(&[0x52, 0x49, 0x46, 0x46]) {
            ImageFormat::Webp
        } else {
            ImageFormat::Jpeg
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
        }
    }
}

/// A decoded photo ready to be attached to an upstream request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl ValidatedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Canonical padded base64 for inline upstream parts
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Validate a single base64 or data-URI encoded photo
pub fn validate_image(raw: &str) -> Result<ValidatedImage, ImageError> {
    let payload = strip_data_uri(raw.trim())?;

    let cleaned: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let significant = cleaned.trim_end_matches('=').len();
    let estimated = significant * 3 / 4;
    if estimated < MIN_IMAGE_BYTES {
        return Err(ImageError::TooSmall(estimated));
    }

    let bytes = LENIENT_STANDARD.decode(cleaned.as_bytes())?;
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(ImageError::TooSmall(bytes.len()));
    }

    let format = ImageFormat::detect(&bytes);
    debug!("Validated {} image of {} bytes", format.mime_type(), bytes.len());

    Ok(ValidatedImage { format, bytes })
}

/// Validate every photo of a request independently
///
/// Individual failures are logged and the photo is dropped. Fails only when
/// no photo survives.
pub fn validate_batch<S: AsRef<str>>(raws: &[S]) -> Result<Vec<ValidatedImage>, ImageError> {
    let mut images = Vec::with_capacity(raws.len());

    for (idx, raw) in raws.iter().enumerate() {
        match validate_image(raw.as_ref()) {
            Ok(image) => images.push(image),
            Err(e) => warn!("Dropping image {} of {}: {}", idx + 1, raws.len(), e),
        }
    }

    if images.is_empty() {
        return Err(ImageError::NoValidImages);
    }

    Ok(images)
}

fn strip_data_uri(raw: &str) -> Result<&str, ImageError> {
    let is_data_uri = raw
        .get(..5)
        .map(|scheme| scheme.eq_ignore_ascii_case("data:"))
        .unwrap_or(false);

    if !is_data_uri {
        return Ok(raw);
    }

    raw.split_once(',')
        .map(|(_, payload)| payload)
        .ok_or(ImageError::InvalidDataUri)
}
