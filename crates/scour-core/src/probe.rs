//! Header-only image inspection.
//!
//! Reads just enough of a buffer to learn its pixel dimensions: container
//! headers only, never the pixel data. Used for the decompression-bomb
//! preflight and for reporting dimensions on the strip path, which never
//! decodes pixels at all.

use std::io::Cursor;

/// Image dimensions from container headers, sniffing the actual format
/// from the bytes. `None` when the buffer is not a readable image.
pub fn dimensions(data: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
