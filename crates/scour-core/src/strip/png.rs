//! PNG metadata stripping.
//!
//! A PNG file is the 8-byte signature followed by chunks: a big-endian u32
//! data length, a 4-byte ASCII type, the data, and a CRC over type + data.
//! Rebuilding works from an allow-list: `IHDR`, `PLTE`, `IDAT` and `IEND`
//! are the critical chunks, and `tRNS` rides along because transparency
//! changes rendered pixels. Everything else (tEXt, zTXt, iTXt, eXIf, tIME,
//! iCCP, gAMA, pHYs and the rest) is skipped whole.
//!
//! Kept chunks are copied verbatim, original CRC included; nothing is ever
//! re-encoded, so the copy cannot invalidate a checksum.

use std::collections::BTreeSet;

use crate::error::{PipelineError, PipelineResult};
use crate::types::MetadataKind;

use super::StripOutcome;

const SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

const KEEP: [&[u8; 4]; 5] = [b"IHDR", b"PLTE", b"IDAT", b"IEND", b"tRNS"];

/// Strip metadata chunks from a PNG buffer.
///
/// Fails only when the signature is absent. The walk ends at the first kept
/// `IEND` (bytes after it are discarded), at a chunk whose declared length
/// overruns the buffer, or at a chunk header that is not valid PNG.
pub fn strip(data: &[u8], file_name: &str) -> PipelineResult<StripOutcome> {
    if data.len() < SIGNATURE.len() || data[..SIGNATURE.len()] != SIGNATURE {
        return Err(PipelineError::Format {
            file: file_name.to_string(),
            expected: "PNG".to_string(),
            reason: "missing PNG signature".to_string(),
        });
    }

    let mut output = Vec::with_capacity(data.len());
    output.extend_from_slice(&SIGNATURE);
    let mut removed = BTreeSet::new();
    let mut pos = SIGNATURE.len();

    while pos + 8 <= data.len() {
        let length =
            u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        let ctype = [data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]];
        if !ctype.iter().all(|b| b.is_ascii_alphabetic()) {
            break;
        }
        let Some(end) = pos.checked_add(12).and_then(|v| v.checked_add(length)) else {
            break;
        };
        if end > data.len() {
            break;
        }

        if KEEP.contains(&&ctype) {
            output.extend_from_slice(&data[pos..end]);
            if &ctype == b"IEND" {
                return Ok(StripOutcome::new(data.len(), output, removed));
            }
        } else {
            removed.insert(chunk_kind(&ctype));
        }
        pos = end;
    }

    Ok(StripOutcome::new(data.len(), output, removed))
}

/// Scan chunk headers for removable metadata without touching the data.
pub(crate) fn scan(data: &[u8]) -> BTreeSet<MetadataKind> {
    let mut found = BTreeSet::new();
    if data.len() < SIGNATURE.len() || data[..SIGNATURE.len()] != SIGNATURE {
        return found;
    }

    let mut pos = SIGNATURE.len();
    while pos + 8 <= data.len() {
        let length =
            u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        let ctype = [data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]];
        if !ctype.iter().all(|b| b.is_ascii_alphabetic()) {
            break;
        }
        let Some(end) = pos.checked_add(12).and_then(|v| v.checked_add(length)) else {
            break;
        };
        if end > data.len() {
            break;
        }
        if &ctype == b"IEND" {
            break;
        }
        if !KEEP.contains(&&ctype) {
            found.insert(chunk_kind(&ctype));
        }
        pos = end;
    }
    found
}

fn chunk_kind(ctype: &[u8; 4]) -> MetadataKind {
    match ctype {
        b"tEXt" | b"zTXt" | b"iTXt" => MetadataKind::Text,
        b"eXIf" => MetadataKind::Exif,
        b"tIME" => MetadataKind::Time,
        b"iCCP" => MetadataKind::IccProfile,
        b"gAMA" | b"cHRM" | b"sRGB" | b"sBIT" => MetadataKind::Color,
        _ => MetadataKind::Other,
    }
}

/// Build a chunk with a placeholder CRC; the stripper never validates CRCs.
#[cfg(test)]
pub(crate) fn test_chunk(ctype: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(12 + data.len());
    chunk.extend_from_slice(&(data.len() as u32).to_be_bytes());
    chunk.extend_from_slice(ctype);
    chunk.extend_from_slice(data);
    chunk.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    chunk
}

/// Minimal PNG: signature, IHDR (1x1 grayscale), a 10-byte IDAT, IEND.
/// 67 bytes; IHDR ends at offset 33.
#[cfg(test)]
pub(crate) fn minimal_png() -> Vec<u8> {
    let mut png = SIGNATURE.to_vec();
    png.extend_from_slice(&test_chunk(
        b"IHDR",
        &[0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x00, 0x00, 0x00, 0x00],
    ));
    png.extend_from_slice(&test_chunk(b"IDAT", &[0x78, 0x9C, 0x62, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01]));
    png.extend_from_slice(&test_chunk(b"IEND", &[]));
    png
}
