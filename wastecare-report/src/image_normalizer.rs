//! Photo normalisation
//!
//! Captured photos are decoded, downscaled so the longest edge fits
//! `max_edge` (aspect ratio preserved, never upscaled), re-encoded as JPEG and
//! wrapped in a base64 data URL. The result is self-contained: it can be
//! stored in the draft and sent to the backend as-is.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};
use thiserror::Error;

/// Longest edge of a normalised photo, in pixels
pub const DEFAULT_MAX_EDGE: u32 = 1024;

/// JPEG quality (1-100)
pub const DEFAULT_QUALITY: u8 = 70;

pub const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("image is empty")]
    Empty,

    #[error("not a decodable image: {0}")]
    Unreadable(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("image worker failed: {0}")]
    Worker(String),
}

impl DecodeError {
    /// Message shown to the user, who is asked to pick another photo
    pub fn user_message(&self) -> &'static str {
        "Failed to process image. Please choose another photo."
    }
}

/// Encoded photo ready for the draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
    /// Size of the JPEG before base64 encoding
    pub encoded_bytes: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    max_edge: u32,
    quality: u8,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self {
            max_edge: DEFAULT_MAX_EDGE,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl ImageNormalizer {
    pub fn new(max_edge: u32, quality: u8) -> Self {
        Self {
            max_edge: max_edge.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    pub fn max_edge(&self) -> u32 {
        self.max_edge
    }

    /// Decode, bound, re-encode
    pub fn normalize(&self, raw: &[u8]) -> Result<NormalizedImage, DecodeError> {
        if raw.is_empty() {
            return Err(DecodeError::Empty);
        }

        let decoded =
            image::load_from_memory(raw).map_err(|e| DecodeError::Unreadable(e.to_string()))?;
        let (orig_w, orig_h) = (decoded.width(), decoded.height());

        let bounded = if orig_w > self.max_edge || orig_h > self.max_edge {
            decoded.resize(self.max_edge, self.max_edge, FilterType::Lanczos3)
        } else {
            decoded
        };

        // JPEG has no alpha channel
        let rgb = bounded.to_rgb8();
        let (width, height) = rgb.dimensions();

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode_image(&rgb)
            .map_err(|e| DecodeError::Encode(e.to_string()))?;

        tracing::debug!(
            orig_w,
            orig_h,
            width,
            height,
            raw_bytes = raw.len(),
            jpeg_bytes = jpeg.len(),
            "Photo normalised"
        );

        let encoded_bytes = jpeg.len();
        Ok(NormalizedImage {
            data_url: format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(&jpeg)),
            width,
            height,
            encoded_bytes,
        })
    }

    /// [`normalize`](Self::normalize) on the blocking pool
    pub async fn normalize_async(&self, raw: Vec<u8>) -> Result<NormalizedImage, DecodeError> {
        let normalizer = *self;
        tokio::task::spawn_blocking(move || normalizer.normalize(&raw))
            .await
            .map_err(|e| DecodeError::Worker(e.to_string()))?
    }
}

/// JPEG bytes inside a data URL produced by [`ImageNormalizer`]
pub fn decode_data_url(data_url: &str) -> Option<Vec<u8>> {
    let encoded = data_url.strip_prefix(DATA_URL_PREFIX)?;
    STANDARD.decode(encoded).ok()
}

/// Re-load a normalised photo, e.g. to hand it to a classifier
pub fn load_normalized(data_url: &str) -> Result<DynamicImage, DecodeError> {
    let bytes = decode_data_url(data_url)
        .ok_or_else(|| DecodeError::Unreadable("not a JPEG data URL".to_string()))?;
    image::load_from_memory(&bytes).map_err(|e| DecodeError::Unreadable(e.to_string()))
}
