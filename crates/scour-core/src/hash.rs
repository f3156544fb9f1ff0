//! Content digests and the residual-metadata verifier.
//!
//! Digests are BLAKE3 over the raw bytes, hex-encoded. Taken before and
//! after cleaning they prove the output differs from the input and give
//! downstream consumers a stable identity for each artifact.

use crate::strip;
use crate::types::{ImageKind, VerificationRecord};

/// BLAKE3 digest of a byte buffer, as 64 lowercase hex characters.
pub fn content_digest(data: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(data);
    hasher.finalize().to_hex().to_string()
}

/// Check cleaned output for residual metadata and record the result.
///
/// Rather than asserting cleanliness because the stripper ran, this walks
/// the output's container structure and reports what is actually there.
pub fn verify(data: &[u8], kind: ImageKind) -> VerificationRecord {
    let found = strip::scan_metadata(data, kind);
    VerificationRecord::from_scan(&found)
}
