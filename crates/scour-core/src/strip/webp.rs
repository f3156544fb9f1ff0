//! WebP metadata stripping.
//!
//! WebP is a RIFF container: `RIFF`, a little-endian u32 file size counting
//! everything after the size field, `WEBP`, then chunks of fourcc + u32 LE
//! size + data, with a single pad byte after odd-sized data. Image payloads
//! live in `VP8 ` (lossy), `VP8L` (lossless), `ALPH` (alpha plane) and the
//! animation chunks `ANIM`/`ANMF`; the extended-format header `VP8X`
//! advertises which optional payloads exist. Metadata rides in `EXIF`,
//! `XMP ` and `ICCP` chunks, all dropped here.
//!
//! Two fixups keep the rebuilt container honest: kept `VP8X` headers get
//! their ICC/EXIF/XMP feature bits cleared, and the RIFF size field is
//! rewritten to `output length - 8` after the walk. A stale RIFF size is
//! the classic way to leak how much was removed.

use std::collections::BTreeSet;

use crate::error::{PipelineError, PipelineResult};
use crate::types::MetadataKind;

use super::StripOutcome;

const KEEP: [&[u8; 4]; 6] = [b"VP8 ", b"VP8L", b"VP8X", b"ANIM", b"ANMF", b"ALPH"];

/// VP8X feature flags, byte 0 of the chunk data.
const FLAG_ICC: u8 = 0x20;
const FLAG_EXIF: u8 = 0x08;
const FLAG_XMP: u8 = 0x04;

/// Strip metadata chunks from a WebP buffer.
///
/// Fails only when the 12-byte RIFF/WEBP header is absent. A chunk whose
/// declared size overruns the buffer ends the walk; whatever was rebuilt to
/// that point is returned with its RIFF size patched.
pub fn strip(data: &[u8], file_name: &str) -> PipelineResult<StripOutcome> {
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WEBP" {
        return Err(PipelineError::Format {
            file: file_name.to_string(),
            expected: "WebP".to_string(),
            reason: "missing RIFF/WEBP header".to_string(),
        });
    }

    let mut output = Vec::with_capacity(data.len());
    output.extend_from_slice(&data[0..12]);
    let mut removed = BTreeSet::new();
    let mut pos = 12;

    while pos + 8 <= data.len() {
        let fourcc = [data[pos], data[pos + 1], data[pos + 2], data[pos + 3]];
        let size = u32::from_le_bytes([
            data[pos + 4],
            data[pos + 5],
            data[pos + 6],
            data[pos + 7],
        ]) as usize;
        let Some(data_end) = pos.checked_add(8).and_then(|v| v.checked_add(size)) else {
            break;
        };
        if data_end > data.len() {
            break;
        }

        if KEEP.contains(&&fourcc) {
            if &fourcc == b"VP8X" && size >= 1 {
                // The header must stop advertising payloads we removed.
                output.extend_from_slice(&data[pos..pos + 8]);
                output.push(data[pos + 8] & !(FLAG_ICC | FLAG_EXIF | FLAG_XMP));
                output.extend_from_slice(&data[pos + 9..data_end]);
            } else {
                output.extend_from_slice(&data[pos..data_end]);
            }
            if size % 2 == 1 {
                // Always emitted, even when the input's own trailing pad
                // was truncated away; kept chunks come out properly padded.
                output.push(0);
            }
        } else {
            removed.insert(chunk_kind(&fourcc));
        }
        // Skip the input's pad byte; a missing pad at end-of-file just ends
        // the walk on the next iteration.
        pos = data_end + (size % 2);
    }

    let riff_size = (output.len() - 8) as u32;
    output[4..8].copy_from_slice(&riff_size.to_le_bytes());

    Ok(StripOutcome::new(data.len(), output, removed))
}

/// Scan chunk headers for removable metadata without touching the data.
pub(crate) fn scan(data: &[u8]) -> BTreeSet<MetadataKind> {
    let mut found = BTreeSet::new();
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WEBP" {
        return found;
    }

    let mut pos = 12;
    while pos + 8 <= data.len() {
        let fourcc = [data[pos], data[pos + 1], data[pos + 2], data[pos + 3]];
        let size = u32::from_le_bytes([
            data[pos + 4],
            data[pos + 5],
            data[pos + 6],
            data[pos + 7],
        ]) as usize;
        let Some(data_end) = pos.checked_add(8).and_then(|v| v.checked_add(size)) else {
            break;
        };
        if data_end > data.len() {
            break;
        }
        if !KEEP.contains(&&fourcc) {
            found.insert(chunk_kind(&fourcc));
        }
        pos = data_end + (size % 2);
    }
    found
}

fn chunk_kind(fourcc: &[u8; 4]) -> MetadataKind {
    match fourcc {
        b"EXIF" => MetadataKind::Exif,
        b"XMP " => MetadataKind::Xmp,
        b"ICCP" => MetadataKind::IccProfile,
        _ => MetadataKind::Other,
    }
}

/// Build a chunk with its size header and pad byte.
#[cfg(test)]
pub(crate) fn riff_chunk(fourcc: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(8 + data.len() + 1);
    chunk.extend_from_slice(fourcc);
    chunk.extend_from_slice(&(data.len() as u32).to_le_bytes());
    chunk.extend_from_slice(data);
    if data.len() % 2 == 1 {
        chunk.push(0);
    }
    chunk
}

/// Assemble chunks into a WebP file with a correct RIFF size.
#[cfg(test)]
pub(crate) fn webp_file(chunks: &[Vec<u8>]) -> Vec<u8> {
    let payload: usize = chunks.iter().map(|c| c.len()).sum();
    let mut file = b"RIFF".to_vec();
    file.extend_from_slice(&((payload + 4) as u32).to_le_bytes());
    file.extend_from_slice(b"WEBP");
    for chunk in chunks {
        file.extend_from_slice(chunk);
    }
    file
}

/// Minimal WebP: a single `VP8 ` chunk carrying a keyframe header.
#[cfg(test)]
pub(crate) fn minimal_webp() -> Vec<u8> {
    webp_file(&[riff_chunk(
        b"VP8 ",
        &[0x10, 0x00, 0x00, 0x9D, 0x01, 0x2A, 0x01, 0x00, 0x01, 0x00],
    )])
}

/// Minimal WebP plus an EXIF chunk.
#[cfg(test)]
pub(crate) fn webp_with_exif() -> Vec<u8> {
    webp_file(&[
        riff_chunk(
            b"VP8 ",
            &[0x10, 0x00, 0x00, 0x9D, 0x01, 0x2A, 0x01, 0x00, 0x01, 0x00],
        ),
        riff_chunk(b"EXIF", &[0x4D, 0x4D, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]),
    ])
}
