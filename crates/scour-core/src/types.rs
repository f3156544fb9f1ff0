//! Core data types for the scour image cleaning pipeline.
//!
//! These types describe what goes into a cleaning run (source buffers and
//! per-call options) and what comes out (cleaned bytes plus a verification
//! record tying the result to its digests).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Recognized input container types.
///
/// The pipeline trusts the caller's declared type for routing; when the
/// declared type and the actual bytes disagree, the strippers reject the
/// buffer and the re-encode path falls back to content sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
}

impl ImageKind {
    /// Parse a declared MIME type into a kind.
    ///
    /// Exactly `image/jpeg`, `image/png` and `image/webp` are recognized,
    /// case-insensitively; alias spellings like `image/jpg` are not.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Parse a file extension (without the dot) into a kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Canonical MIME type string.
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    /// Short lowercase format name ("jpeg", "png", "webp").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an image gets cleaned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanMode {
    /// Lossless removal of metadata segments; pixel data is copied verbatim.
    #[default]
    Strip,
    /// Decode the first frame and encode a brand new file in the target
    /// format; metadata cannot survive because only pixels cross over.
    Reencode,
}

impl CleanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strip => "strip",
            Self::Reencode => "reencode",
        }
    }
}

/// Output format for re-encoded images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl TargetFormat {
    /// File extension used for output naming ("png", "jpg", "webp").
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }

    /// Canonical MIME type of the produced file.
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    /// The container kind of the produced file.
    pub fn kind(&self) -> ImageKind {
        match self {
            Self::Png => ImageKind::Png,
            Self::Jpeg => ImageKind::Jpeg,
            Self::Webp => ImageKind::Webp,
        }
    }
}

/// Per-call cleaning options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CleanOptions {
    /// Strip or re-encode.
    pub mode: CleanMode,

    /// Output format when re-encoding.
    pub target_format: TargetFormat,

    /// Encode quality in [0.0, 1.0]; applies to JPEG output. Values outside
    /// the range are clamped at the encode boundary.
    pub quality: f32,

    /// Prefer lossless encoding where the target supports a choice.
    pub lossless: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            mode: CleanMode::Strip,
            target_format: TargetFormat::Png,
            quality: 0.92,
            lossless: false,
        }
    }
}

/// An input image: raw bytes plus what the caller believes about them.
///
/// The pipeline never retains the buffer past the call that received it.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Raw file contents.
    pub bytes: Vec<u8>,

    /// Caller-declared MIME type (e.g. "image/jpeg").
    pub declared_mime: String,

    /// Original file name, used for output naming and error context.
    pub file_name: String,
}

impl SourceImage {
    pub fn new(
        bytes: Vec<u8>,
        declared_mime: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes,
            declared_mime: declared_mime.into(),
            file_name: file_name.into(),
        }
    }
}

/// Classes of removable metadata the strippers recognize and report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataKind {
    /// EXIF blocks (camera, GPS, timestamps)
    Exif,
    /// XMP packets
    Xmp,
    /// Embedded ICC color profiles
    IccProfile,
    /// IPTC / Photoshop resource blocks
    Iptc,
    /// Free-form comment segments
    Comment,
    /// Textual chunks (PNG tEXt/zTXt/iTXt)
    Text,
    /// Modification timestamps (PNG tIME)
    Time,
    /// Color rendering hints (gAMA, cHRM, sRGB, sBIT)
    Color,
    /// Anything else outside the structural allow-list
    Other,
}

impl MetadataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exif => "exif",
            Self::Xmp => "xmp",
            Self::IccProfile => "icc-profile",
            Self::Iptc => "iptc",
            Self::Comment => "comment",
            Self::Text => "text",
            Self::Time => "time",
            Self::Color => "color",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the residual-metadata check run on cleaned output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// Whether any removable metadata remains in the output bytes
    pub metadata_detected: bool,

    /// Kinds of metadata found, empty when clean
    pub metadata_kinds: BTreeSet<String>,

    /// True exactly when no metadata was detected
    pub is_clean: bool,

    /// When the record was produced, in milliseconds since the Unix epoch
    pub produced_at: u64,
}

impl VerificationRecord {
    /// Build a record from the kinds a residual scan found.
    pub fn from_scan(found: &BTreeSet<MetadataKind>) -> Self {
        let metadata_kinds: BTreeSet<String> =
            found.iter().map(|k| k.as_str().to_string()).collect();
        let metadata_detected = !metadata_kinds.is_empty();
        Self {
            metadata_detected,
            metadata_kinds,
            is_clean: !metadata_detected,
            produced_at: epoch_millis(),
        }
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The complete output for one cleaned image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedImage {
    /// The cleaned file contents. Skipped during serialization so result
    /// manifests stay small; consumers write the bytes separately.
    #[serde(skip)]
    pub result_bytes: Vec<u8>,

    /// Output name derived from the input: `_clean` inserted before the
    /// extension, with the extension swapped when re-encoding.
    pub suggested_file_name: String,

    /// BLAKE3 digest of the input bytes (lowercase hex)
    pub original_digest: String,

    /// BLAKE3 digest of the output bytes (lowercase hex)
    pub result_digest: String,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// Residual-metadata check on the output bytes
    pub verification: VerificationRecord,
}

/// Progress notification delivered before each file in a batch and once
/// after the final file.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    /// Completion percentage in [0.0, 100.0]
    pub percent: f64,

    /// Name of the file about to be (or just) processed
    pub file_name: String,
}
