//! Codec backend trait and the shared surface encoder.
//!
//! A backend's job is to turn bytes into a pixel surface; once a surface
//! exists, encoding is the same for everyone, so the trait ships a default
//! `encode`. Backends are trait objects so the pipeline can hold an ordered
//! fallback list.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageFormat};
use thiserror::Error;

use crate::types::{ImageKind, TargetFormat};

/// Why a backend attempt failed. The pipeline attaches file context when it
/// gives up; inside the fallback chain there is only the mechanism.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("encode failed: {0}")]
    Encode(String),
}

/// A decoded pixel surface. Owns its pixels; dropping the frame releases
/// them, which is what bounds peak memory in a batch. `encode` consumes the
/// frame so release happens on the error path too.
#[derive(Debug)]
pub struct DecodedFrame {
    pub surface: DynamicImage,
    pub width: u32,
    pub height: u32,
}

impl DecodedFrame {
    pub fn from_surface(surface: DynamicImage) -> Self {
        let (width, height) = surface.dimensions();
        Self {
            surface,
            width,
            height,
        }
    }
}

/// Encoding knobs carried from the caller's options.
#[derive(Debug, Clone, Copy)]
pub struct EncodeParams {
    pub format: TargetFormat,

    /// In [0.0, 1.0]; mapped to the JPEG encoder's 1..=100 scale. PNG and
    /// WebP output is always lossless with the encoders in use.
    pub quality: f32,

    /// Prefer lossless encoding; PNG and WebP already are, JPEG has no
    /// lossless mode to select.
    pub lossless: bool,
}

/// One way of getting pixels out of bytes.
///
/// Only the first frame of animated input is ever decoded; trailing frames
/// never reach the output.
pub trait CodecBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Decode the first frame of `data` into a pixel surface.
    fn decode_first_frame(&self, data: &[u8], kind: ImageKind)
        -> Result<DecodedFrame, CodecError>;

    /// Encode a frame into the target format. Every backend produces a
    /// standard raster surface, so the default implementation serves all.
    fn encode(&self, frame: DecodedFrame, params: &EncodeParams) -> Result<Vec<u8>, CodecError> {
        encode_surface(frame, params)
    }
}

/// Encode a surface into the target container. Consumes the frame.
pub(crate) fn encode_surface(
    frame: DecodedFrame,
    params: &EncodeParams,
) -> Result<Vec<u8>, CodecError> {
    let mut cursor = Cursor::new(Vec::new());
    match params.format {
        TargetFormat::Jpeg => {
            // JPEG carries no alpha channel.
            let rgb = frame.surface.to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut cursor, jpeg_quality(params.quality));
            encoder
                .encode_image(&rgb)
                .map_err(|e| CodecError::Encode(e.to_string()))?;
        }
        TargetFormat::Png => {
            frame
                .surface
                .write_to(&mut cursor, ImageFormat::Png)
                .map_err(|e| CodecError::Encode(e.to_string()))?;
        }
        TargetFormat::Webp => {
            let rgba = frame.surface.to_rgba8();
            let (width, height) = rgba.dimensions();
            WebPEncoder::new_lossless(&mut cursor)
                .encode(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(|e| CodecError::Encode(e.to_string()))?;
        }
    }
    Ok(cursor.into_inner())
}

/// Map quality in [0.0, 1.0] to the JPEG encoder's 1..=100 scale.
fn jpeg_quality(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn solid_frame(w: u32, h: u32) -> DecodedFrame {
        let img = ImageBuffer::from_pixel(w, h, Rgba::<u8>([10, 20, 30, 255]));
        DecodedFrame::from_surface(DynamicImage::ImageRgba8(img))
    }

    #[test]
    fn test_jpeg_quality_mapping() {
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(0.92), 92);
        assert_eq!(jpeg_quality(1.0), 100);
        assert_eq!(jpeg_quality(-3.0), 1);
        assert_eq!(jpeg_quality(7.0), 100);
    }

    #[test]
    fn test_encode_surface_png_signature() {
        let params = EncodeParams {
            format: TargetFormat::Png,
            quality: 0.9,
            lossless: false,
        };
        let bytes = encode_surface(solid_frame(8, 4), &params).unwrap();
        assert_eq!(&bytes[..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn test_encode_surface_jpeg_handles_alpha_source() {
        let params = EncodeParams {
            format: TargetFormat::Jpeg,
            quality: 0.8,
            lossless: false,
        };
        let bytes = encode_surface(solid_frame(8, 4), &params).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_surface_webp_container() {
        let params = EncodeParams {
            format: TargetFormat::Webp,
            quality: 0.5,
            lossless: true,
        };
        let bytes = encode_surface(solid_frame(8, 4), &params).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_frame_captures_dimensions() {
        let frame = solid_frame(100, 50);
        assert_eq!((frame.width, frame.height), (100, 50));
    }
}
