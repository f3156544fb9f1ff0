//! JPEG metadata stripping.
//!
//! A JPEG file is a sequence of marker segments: `0xFF` followed by a marker
//! byte, then (for most markers) a big-endian u16 length that counts itself
//! plus the payload. Metadata lives in APP1..=APP15 (EXIF, XMP, ICC
//! profiles, Photoshop/IPTC blocks) and COM comment segments; everything
//! the decoder needs (quantization tables, Huffman tables, frame and scan
//! headers) sits in other segments that are copied through untouched.
//!
//! APP0 is the one application segment with a structural role: a leading
//! `JFIF\0` payload marks the JFIF header, which stays. Any other APP0
//! payload (JFXX thumbnails included) is dropped with the rest.
//!
//! After the SOS header comes the entropy-coded scan, where `0xFF` bytes are
//! escaped as `FF 00` and restart markers `FF D0` through `FF D7` may
//! appear. The scan is copied byte for byte until `FF D9` (EOI) or a real
//! marker hands control back to the segment walk.

use std::collections::BTreeSet;

use crate::error::{PipelineError, PipelineResult};
use crate::types::MetadataKind;

use super::StripOutcome;

/// Marker bytes (the byte following `0xFF`).
mod markers {
    /// Start of image
    pub const SOI: u8 = 0xD8;
    /// End of image
    pub const EOI: u8 = 0xD9;
    /// Start of scan; entropy-coded data follows the header
    pub const SOS: u8 = 0xDA;
    /// Temporary private use, standalone
    pub const TEM: u8 = 0x01;
    /// Restart markers RST0..=RST7, standalone
    pub const RST0: u8 = 0xD0;
    pub const RST7: u8 = 0xD7;
    /// Application segments APP0..=APP15
    pub const APP0: u8 = 0xE0;
    pub const APP1: u8 = 0xE1;
    pub const APP2: u8 = 0xE2;
    pub const APP13: u8 = 0xED;
    pub const APP15: u8 = 0xEF;
    /// Comment
    pub const COM: u8 = 0xFE;
}

/// Strip metadata segments from a JPEG buffer.
///
/// Fails only when the buffer does not begin with SOI. A truncated tail
/// (mid-segment or mid-scan) ends the walk; the output holds every complete
/// segment seen up to that point. Bytes after EOI never reach the output.
pub fn strip(data: &[u8], file_name: &str) -> PipelineResult<StripOutcome> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != markers::SOI {
        return Err(PipelineError::Format {
            file: file_name.to_string(),
            expected: "JPEG".to_string(),
            reason: "missing SOI marker".to_string(),
        });
    }

    let mut output = Vec::with_capacity(data.len());
    let mut removed = BTreeSet::new();
    output.extend_from_slice(&[0xFF, markers::SOI]);
    let mut pos = 2;

    while pos < data.len() {
        if data[pos] != 0xFF {
            // Lost sync with the marker stream; keep what we have.
            break;
        }

        // Tolerate 0xFF fill bytes before the marker byte.
        let mut marker_pos = pos + 1;
        while marker_pos < data.len() && data[marker_pos] == 0xFF {
            marker_pos += 1;
        }
        if marker_pos >= data.len() {
            break;
        }
        let marker = data[marker_pos];

        match marker {
            markers::EOI => {
                output.extend_from_slice(&[0xFF, markers::EOI]);
                return Ok(StripOutcome::new(data.len(), output, removed));
            }
            markers::TEM | markers::RST0..=markers::RST7 => {
                output.extend_from_slice(&[0xFF, marker]);
                pos = marker_pos + 1;
            }
            _ => {
                if marker_pos + 2 >= data.len() {
                    break;
                }
                let length =
                    u16::from_be_bytes([data[marker_pos + 1], data[marker_pos + 2]]) as usize;
                if length < 2 {
                    break;
                }
                let seg_end = marker_pos + 1 + length;
                if seg_end > data.len() {
                    break;
                }

                if let Some(kind) = dropped_kind(marker, &data[marker_pos + 3..seg_end]) {
                    removed.insert(kind);
                    pos = seg_end;
                    continue;
                }

                output.push(0xFF);
                output.push(marker);
                output.extend_from_slice(&data[marker_pos + 1..seg_end]);
                pos = seg_end;

                if marker == markers::SOS {
                    let (next, terminated) = copy_entropy_coded(data, pos, &mut output);
                    if terminated {
                        return Ok(StripOutcome::new(data.len(), output, removed));
                    }
                    pos = next;
                }
            }
        }
    }

    Ok(StripOutcome::new(data.len(), output, removed))
}

/// Scan segment headers for removable metadata.
///
/// Entropy-coded data is skipped the same way `strip` copies it, so
/// segments between the scans of a progressive file are seen too. Buffers
/// without an SOI signature report nothing.
pub(crate) fn scan(data: &[u8]) -> BTreeSet<MetadataKind> {
    let mut found = BTreeSet::new();
    if data.len() < 2 || data[0] != 0xFF || data[1] != markers::SOI {
        return found;
    }

    let mut pos = 2;
    while pos < data.len() {
        if data[pos] != 0xFF {
            break;
        }
        let mut marker_pos = pos + 1;
        while marker_pos < data.len() && data[marker_pos] == 0xFF {
            marker_pos += 1;
        }
        if marker_pos >= data.len() {
            break;
        }
        let marker = data[marker_pos];

        match marker {
            markers::EOI => break,
            markers::TEM | markers::RST0..=markers::RST7 => {
                pos = marker_pos + 1;
            }
            _ => {
                if marker_pos + 2 >= data.len() {
                    break;
                }
                let length =
                    u16::from_be_bytes([data[marker_pos + 1], data[marker_pos + 2]]) as usize;
                if length < 2 {
                    break;
                }
                let seg_end = marker_pos + 1 + length;
                if seg_end > data.len() {
                    break;
                }
                if let Some(kind) = dropped_kind(marker, &data[marker_pos + 3..seg_end]) {
                    found.insert(kind);
                }
                pos = seg_end;

                if marker == markers::SOS {
                    let (next, terminated) = skip_entropy_coded(data, pos);
                    if terminated {
                        break;
                    }
                    pos = next;
                }
            }
        }
    }
    found
}

/// Copy entropy-coded scan data starting at `pos`.
///
/// Stuffed `FF 00` pairs and restart markers are scan content and copied.
/// Returns `(next_pos, true)` when EOI terminated the scan (EOI already
/// copied), or `(next_pos, false)` when a real marker should re-enter the
/// segment walk or the buffer ran out.
fn copy_entropy_coded(data: &[u8], mut pos: usize, output: &mut Vec<u8>) -> (usize, bool) {
    while pos < data.len() {
        let byte = data[pos];
        if byte != 0xFF {
            output.push(byte);
            pos += 1;
            continue;
        }
        if pos + 1 >= data.len() {
            // Dangling 0xFF at the end of a truncated buffer.
            return (data.len(), false);
        }
        let next = data[pos + 1];
        if next == 0x00 || (markers::RST0..=markers::RST7).contains(&next) {
            output.extend_from_slice(&data[pos..pos + 2]);
            pos += 2;
        } else if next == markers::EOI {
            output.extend_from_slice(&[0xFF, markers::EOI]);
            return (pos + 2, true);
        } else {
            // A marker interrupts the scan (DNL, the next scan of a
            // progressive file, ...). Let the segment walk decide.
            return (pos, false);
        }
    }
    (data.len(), false)
}

/// Advance past entropy-coded scan data without copying it.
///
/// Same marker rules as [`copy_entropy_coded`], same return contract.
fn skip_entropy_coded(data: &[u8], mut pos: usize) -> (usize, bool) {
    while pos < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        if pos + 1 >= data.len() {
            return (data.len(), false);
        }
        let next = data[pos + 1];
        if next == 0x00 || (markers::RST0..=markers::RST7).contains(&next) {
            pos += 2;
        } else if next == markers::EOI {
            return (pos + 2, true);
        } else {
            return (pos, false);
        }
    }
    (data.len(), false)
}

/// Classify a length-bearing segment: `Some(kind)` means drop it, `None`
/// means it is structural and stays.
fn dropped_kind(marker: u8, payload: &[u8]) -> Option<MetadataKind> {
    match marker {
        markers::COM => Some(MetadataKind::Comment),
        markers::APP0 => {
            if payload.starts_with(b"JFIF\0") {
                None
            } else {
                Some(MetadataKind::Other)
            }
        }
        markers::APP1 => {
            if payload.starts_with(b"Exif\0\0") {
                Some(MetadataKind::Exif)
            } else if payload.starts_with(b"http://") {
                // XMP packets (including extension packets) identify
                // themselves with a namespace URI.
                Some(MetadataKind::Xmp)
            } else {
                Some(MetadataKind::Other)
            }
        }
        markers::APP2 => {
            if payload.starts_with(b"ICC_PROFILE\0") {
                Some(MetadataKind::IccProfile)
            } else {
                Some(MetadataKind::Other)
            }
        }
        markers::APP13 => Some(MetadataKind::Iptc),
        m if (markers::APP1..=markers::APP15).contains(&m) => Some(MetadataKind::Other),
        _ => None,
    }
}

/// Minimal structurally valid JPEG: SOI, JFIF APP0, DQT, SOF0 (1x1), DHT,
/// SOS header, three scan bytes, EOI. 150 bytes.
#[cfg(test)]
pub(crate) fn minimal_jpeg() -> Vec<u8> {
    let mut jpeg = vec![0xFF, markers::SOI];
    // APP0 "JFIF", length 16
    jpeg.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
    jpeg.extend_from_slice(b"JFIF\0");
    jpeg.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
    // DQT, length 67 (table id + 64 entries)
    jpeg.extend_from_slice(&[0xFF, 0xDB, 0x00, 0x43, 0x00]);
    jpeg.extend_from_slice(&[0x10; 64]);
    // SOF0, length 11: 8-bit 1x1, one component
    jpeg.extend_from_slice(&[
        0xFF, 0xC0, 0x00, 0x0B, 0x08, 0x00, 0x01, 0x00, 0x01, 0x01, 0x01, 0x11, 0x00,
    ]);
    // DHT, length 31: DC table, 12 symbols
    jpeg.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x1F, 0x00]);
    jpeg.extend_from_slice(&[
        0x00, 0x01, 0x05, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00,
    ]);
    jpeg.extend_from_slice(&[
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B,
    ]);
    // SOS, length 8: one component
    jpeg.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
    // Entropy-coded data
    jpeg.extend_from_slice(&[0x12, 0x34, 0x56]);
    jpeg.extend_from_slice(&[0xFF, markers::EOI]);
    jpeg
}

/// APP1 EXIF segment occupying exactly `total_len` bytes in the file
/// (marker + length field + payload).
#[cfg(test)]
pub(crate) fn app1_exif_segment(total_len: usize) -> Vec<u8> {
    assert!(total_len >= 10);
    let field = (total_len - 2) as u16;
    let mut seg = vec![0xFF, 0xE1, (field >> 8) as u8, (field & 0xFF) as u8];
    seg.extend_from_slice(b"Exif\0\0");
    seg.resize(total_len, 0xAB);
    seg
}

/// COM segment occupying exactly `total_len` bytes in the file.
#[cfg(test)]
pub(crate) fn com_segment(total_len: usize) -> Vec<u8> {
    assert!(total_len >= 4);
    let field = (total_len - 2) as u16;
    let mut seg = vec![0xFF, 0xFE, (field >> 8) as u8, (field & 0xFF) as u8];
    seg.resize(total_len, b'x');
    seg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_jpeg_passes_through_unchanged() {
        let jpeg = minimal_jpeg();
        let outcome = strip(&jpeg, "clean.jpg").unwrap();
        assert_eq!(outcome.bytes, jpeg);
        assert!(outcome.removed.is_empty());
        assert_eq!(outcome.bytes_removed, 0);
    }

    #[test]
    fn test_exif_and_comment_removed() {
        let base = minimal_jpeg();
        let mut jpeg = base.clone();
        // Metadata goes after the JFIF APP0 (offset 2 + 18).
        jpeg.splice(20..20, com_segment(50));
        jpeg.splice(20..20, app1_exif_segment(200));

        let outcome = strip(&jpeg, "tagged.jpg").unwrap();
        assert_eq!(outcome.bytes, base);
        assert_eq!(outcome.bytes_removed, 250);
        assert!(outcome.removed.contains(&MetadataKind::Exif));
        assert!(outcome.removed.contains(&MetadataKind::Comment));
    }

    #[test]
    fn test_segment_arithmetic_exact() {
        // 770 structural bytes + a 200-byte APP1 + a 50-byte COM = 1020 in,
        // 770 out.
        let mut base = minimal_jpeg();
        let eoi_at = base.len() - 2;
        base.splice(eoi_at..eoi_at, std::iter::repeat(0x42).take(620));
        assert_eq!(base.len(), 770);

        let mut jpeg = base.clone();
        jpeg.splice(20..20, com_segment(50));
        jpeg.splice(20..20, app1_exif_segment(200));
        assert_eq!(jpeg.len(), 1020);

        let outcome = strip(&jpeg, "big.jpg").unwrap();
        assert_eq!(outcome.bytes.len(), 770);
        assert_eq!(outcome.bytes, base);
        assert_eq!(&outcome.bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(&outcome.bytes[outcome.bytes.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_non_jfif_app0_dropped() {
        let mut jpeg = minimal_jpeg();
        // A second APP0 with a non-JFIF payload ("JFXX" thumbnail).
        let mut seg = vec![0xFF, 0xE0, 0x00, 0x09];
        seg.extend_from_slice(b"JFXX\0");
        seg.extend_from_slice(&[0x10, 0x00]);
        // length 9 = 2 + 7 payload
        jpeg.splice(20..20, seg);

        let outcome = strip(&jpeg, "thumb.jpg").unwrap();
        assert_eq!(outcome.bytes, minimal_jpeg());
        assert!(outcome.removed.contains(&MetadataKind::Other));
    }

    #[test]
    fn test_xmp_iptc_and_icc_classified() {
        let mut jpeg = minimal_jpeg();
        let mut xmp = vec![0xFF, 0xE1, 0x00, 0x26];
        xmp.extend_from_slice(b"http://ns.adobe.com/xap/1.0/\0");
        xmp.resize(2 + 0x26, 0x00);
        let mut icc = vec![0xFF, 0xE2, 0x00, 0x12];
        icc.extend_from_slice(b"ICC_PROFILE\0");
        icc.resize(2 + 0x12, 0x00);
        let iptc = {
            let mut s = vec![0xFF, 0xED, 0x00, 0x10];
            s.extend_from_slice(b"Photoshop 3.0\0");
            s
        };
        jpeg.splice(20..20, iptc);
        jpeg.splice(20..20, icc);
        jpeg.splice(20..20, xmp);

        let outcome = strip(&jpeg, "multi.jpg").unwrap();
        assert_eq!(outcome.bytes, minimal_jpeg());
        assert!(outcome.removed.contains(&MetadataKind::Xmp));
        assert!(outcome.removed.contains(&MetadataKind::IccProfile));
        assert!(outcome.removed.contains(&MetadataKind::Iptc));
    }

    #[test]
    fn test_unknown_structural_segment_kept() {
        let mut jpeg = minimal_jpeg();
        // DRI: restart interval, must survive
        jpeg.splice(20..20, vec![0xFF, 0xDD, 0x00, 0x04, 0x00, 0x10]);

        let outcome = strip(&jpeg, "dri.jpg").unwrap();
        assert_eq!(outcome.bytes, jpeg);
        assert!(outcome.removed.is_empty());
    }

    #[test]
    fn test_entropy_stuffing_and_restart_markers_preserved() {
        let mut jpeg = minimal_jpeg();
        // Replace the scan bytes with data containing a stuffed 0xFF and a
        // restart marker; neither may be treated as a segment boundary.
        let scan_at = jpeg.len() - 5;
        jpeg.splice(
            scan_at..scan_at + 3,
            vec![0x11, 0xFF, 0x00, 0x22, 0xFF, 0xD0, 0x33],
        );

        let outcome = strip(&jpeg, "scan.jpg").unwrap();
        assert_eq!(outcome.bytes, jpeg);
    }

    #[test]
    fn test_fill_bytes_tolerated() {
        let mut jpeg = minimal_jpeg();
        // Extra 0xFF fill before the DQT marker (offset 20 is its 0xFF).
        jpeg.insert(20, 0xFF);

        let outcome = strip(&jpeg, "fill.jpg").unwrap();
        // Fill bytes are not copied; output is the canonical form.
        assert_eq!(outcome.bytes, minimal_jpeg());
    }

    #[test]
    fn test_trailing_bytes_after_eoi_discarded() {
        let mut jpeg = minimal_jpeg();
        jpeg.extend_from_slice(b"trailing junk that hides data");

        let outcome = strip(&jpeg, "trail.jpg").unwrap();
        assert_eq!(outcome.bytes, minimal_jpeg());
    }

    #[test]
    fn test_truncated_segment_ends_walk_gracefully() {
        let mut jpeg = minimal_jpeg();
        jpeg.splice(20..20, app1_exif_segment(200));
        // Cut the file in the middle of the APP1 payload.
        jpeg.truncate(120);

        let outcome = strip(&jpeg, "cut.jpg").unwrap();
        // SOI + APP0 were complete; nothing after survives.
        assert_eq!(outcome.bytes, &minimal_jpeg()[..20]);
    }

    #[test]
    fn test_truncated_scan_keeps_prefix() {
        let mut jpeg = minimal_jpeg();
        jpeg.truncate(jpeg.len() - 2); // drop EOI

        let outcome = strip(&jpeg, "noeoi.jpg").unwrap();
        assert_eq!(outcome.bytes, jpeg);
    }

    #[test]
    fn test_rejects_non_jpeg() {
        let err = strip(b"GIF89a", "anim.jpg").unwrap_err();
        assert!(matches!(err, PipelineError::Format { .. }));
        let err = strip(&[], "empty.jpg").unwrap_err();
        assert!(matches!(err, PipelineError::Format { .. }));
    }

    #[test]
    fn test_scan_reports_kinds() {
        let mut jpeg = minimal_jpeg();
        jpeg.splice(20..20, com_segment(30));
        jpeg.splice(20..20, app1_exif_segment(64));

        let found = scan(&jpeg);
        assert!(found.contains(&MetadataKind::Exif));
        assert!(found.contains(&MetadataKind::Comment));

        let stripped = strip(&jpeg, "x.jpg").unwrap();
        assert!(scan(&stripped.bytes).is_empty());
        assert!(scan(b"not a jpeg").is_empty());
    }

    #[test]
    fn test_scan_sees_segments_after_entropy_data() {
        // A COM wedged between the scan data and EOI, where a progressive
        // file would put its next scan header.
        let mut jpeg = minimal_jpeg();
        let eoi_at = jpeg.len() - 2;
        jpeg.splice(eoi_at..eoi_at, com_segment(30));

        let found = scan(&jpeg);
        assert!(found.contains(&MetadataKind::Comment));

        let stripped = strip(&jpeg, "late.jpg").unwrap();
        assert_eq!(stripped.bytes, minimal_jpeg());
        assert!(scan(&stripped.bytes).is_empty());
    }
}
