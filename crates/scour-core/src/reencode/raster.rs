//! Content-sniffing fallback backend.
//!
//! Ignores the declared kind entirely and lets the reader work out what
//! the bytes are. Slower to get started than the format-directed path but
//! it saves misdeclared files, which are common enough in practice.

use std::io::Cursor;

use crate::types::ImageKind;

use super::backend::{CodecBackend, CodecError, DecodedFrame};

pub struct RasterSurface;

impl CodecBackend for RasterSurface {
    fn name(&self) -> &'static str {
        "raster"
    }

    fn decode_first_frame(
        &self,
        data: &[u8],
        _kind: ImageKind,
    ) -> Result<DecodedFrame, CodecError> {
        let reader = image::ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| CodecError::Decode(format!("cannot sniff format: {e}")))?;
        let surface = reader
            .decode()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(DecodedFrame::from_surface(surface))
    }
}
