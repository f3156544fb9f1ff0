//! Format-directed codec backend.
//!
//! Hands the buffer straight to the decoder for the declared container
//! kind. Fast and strict: bytes that do not match the declaration fail
//! here and fall through to the sniffing backend.

use std::io::Cursor;

use image::codecs::jpeg::JpegDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::DynamicImage;

use crate::types::ImageKind;

use super::backend::{CodecBackend, CodecError, DecodedFrame};

pub struct NativeCodec;

impl CodecBackend for NativeCodec {
    fn name(&self) -> &'static str {
        "native"
    }

    fn decode_first_frame(
        &self,
        data: &[u8],
        kind: ImageKind,
    ) -> Result<DecodedFrame, CodecError> {
        let decode_err = |e: image::ImageError| CodecError::Decode(e.to_string());
        let surface = match kind {
            ImageKind::Jpeg => {
                let decoder = JpegDecoder::new(Cursor::new(data)).map_err(decode_err)?;
                DynamicImage::from_decoder(decoder).map_err(decode_err)?
            }
            ImageKind::Png => {
                let decoder = PngDecoder::new(Cursor::new(data)).map_err(decode_err)?;
                DynamicImage::from_decoder(decoder).map_err(decode_err)?
            }
            ImageKind::Webp => {
                let decoder = WebPDecoder::new(Cursor::new(data)).map_err(decode_err)?;
                DynamicImage::from_decoder(decoder).map_err(decode_err)?
            }
        };
        Ok(DecodedFrame::from_surface(surface))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn encoded(w: u32, h: u32, format: image::ImageFormat) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(w, h, Rgb::<u8>([200, 100, 50]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decodes_declared_kind() {
        let png = encoded(20, 10, image::ImageFormat::Png);
        let frame = NativeCodec
            .decode_first_frame(&png, ImageKind::Png)
            .unwrap();
        assert_eq!((frame.width, frame.height), (20, 10));
    }

    #[test]
    fn test_rejects_mismatched_declaration() {
        let jpeg = encoded(20, 10, image::ImageFormat::Jpeg);
        let err = NativeCodec
            .decode_first_frame(&jpeg, ImageKind::Png)
            .unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }
}
