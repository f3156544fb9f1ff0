//! Lossless metadata stripping for JPEG, PNG and WebP containers.
//!
//! Each format module walks its container's segment or chunk structure and
//! rebuilds the file from structural pieces only; compressed pixel data is
//! copied verbatim and never decoded. The walks share a common contract:
//!
//! - A buffer that does not open with the container signature is a
//!   [`PipelineError::Format`] error.
//! - Structural damage past the signature (truncated segment, overrunning
//!   chunk length) ends the walk gracefully; the valid prefix built so far
//!   is returned.
//! - Running the stripper over its own output changes nothing.

use std::collections::BTreeSet;

use crate::error::PipelineResult;
use crate::types::{ImageKind, MetadataKind};

pub mod jpeg;
pub mod png;
pub mod webp;

/// What a strip pass produced: the rebuilt file plus a report of what fell
/// away, used for logging and the CLI summary.
#[derive(Debug, Clone)]
pub struct StripOutcome {
    /// The rebuilt file contents.
    pub bytes: Vec<u8>,

    /// Kinds of metadata that were removed.
    pub removed: BTreeSet<MetadataKind>,

    /// How many bytes smaller the output is than the input.
    pub bytes_removed: u64,
}

impl StripOutcome {
    pub(crate) fn new(
        original_len: usize,
        bytes: Vec<u8>,
        removed: BTreeSet<MetadataKind>,
    ) -> Self {
        let bytes_removed = original_len.saturating_sub(bytes.len()) as u64;
        Self {
            bytes,
            removed,
            bytes_removed,
        }
    }
}

/// Strip metadata from `data` according to its declared container kind.
pub fn strip_bytes(
    data: &[u8],
    kind: ImageKind,
    file_name: &str,
) -> PipelineResult<StripOutcome> {
    match kind {
        ImageKind::Jpeg => jpeg::strip(data, file_name),
        ImageKind::Png => png::strip(data, file_name),
        ImageKind::Webp => webp::strip(data, file_name),
    }
}

/// Scan `data` for removable metadata without modifying anything.
///
/// Returns the kinds a strip pass would remove. Buffers that do not carry
/// the declared container's signature scan as empty rather than erroring;
/// the scan answers "what metadata is in here", not "is this well-formed".
pub fn scan_metadata(data: &[u8], kind: ImageKind) -> BTreeSet<MetadataKind> {
    match kind {
        ImageKind::Jpeg => jpeg::scan(data),
        ImageKind::Png => png::scan(data),
        ImageKind::Webp => webp::scan(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn test_dispatch_routes_by_kind() {
        let jpeg = jpeg::minimal_jpeg();
        let png = png::minimal_png();
        let webp = webp::minimal_webp();

        assert!(strip_bytes(&jpeg, ImageKind::Jpeg, "a.jpg").is_ok());
        assert!(strip_bytes(&png, ImageKind::Png, "b.png").is_ok());
        assert!(strip_bytes(&webp, ImageKind::Webp, "c.webp").is_ok());

        // Declared kind and actual bytes disagreeing is a Format error.
        let err = strip_bytes(&jpeg, ImageKind::Png, "a.jpg").unwrap_err();
        assert!(matches!(err, PipelineError::Format { .. }));
    }

    #[test]
    fn test_scan_never_errors_on_foreign_bytes() {
        assert!(scan_metadata(b"not an image", ImageKind::Jpeg).is_empty());
        assert!(scan_metadata(b"not an image", ImageKind::Png).is_empty());
        assert!(scan_metadata(b"not an image", ImageKind::Webp).is_empty());
        assert!(scan_metadata(&[], ImageKind::Png).is_empty());
    }

    #[test]
    fn test_strip_is_idempotent_across_formats() {
        let mut jpeg = jpeg::minimal_jpeg();
        jpeg.splice(2..2, jpeg::app1_exif_segment(64));
        let png = {
            let mut p = png::minimal_png();
            let text = png::test_chunk(b"tEXt", b"Author\0someone");
            p.splice(33..33, text);
            p
        };
        let webp = webp::webp_with_exif();

        for (data, kind) in [
            (jpeg, ImageKind::Jpeg),
            (png, ImageKind::Png),
            (webp, ImageKind::Webp),
        ] {
            let once = strip_bytes(&data, kind, "x").unwrap();
            let twice = strip_bytes(&once.bytes, kind, "x").unwrap();
            assert_eq!(once.bytes, twice.bytes, "{kind} strip not idempotent");
            assert!(twice.removed.is_empty());
            assert_eq!(twice.bytes_removed, 0);
        }
    }
}
