//! Error types for the scour image cleaning pipeline.
//!
//! Errors are organized by stage to provide clear, actionable error messages
//! that include relevant context (file names, stage names, specific issues).
//! The pipeline operates on in-memory buffers, so per-file context is the
//! caller-supplied file name rather than a path.

use thiserror::Error;

/// Top-level error type for scour operations.
#[derive(Error, Debug)]
pub enum ScourError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline processing errors, organized by stage.
///
/// A buffer that does not open with its declared container's signature is a
/// `Format` error; structural damage past the signature is not an error at
/// all (the strippers keep whatever valid prefix they built).
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Buffer does not start with the declared container signature
    #[error("Not a valid {expected} file: {file} ({reason})")]
    Format {
        file: String,
        expected: String,
        reason: String,
    },

    /// Declared type is not one this pipeline can clean
    #[error("Unsupported format for {file}: {mime}")]
    UnsupportedFormat { file: String, mime: String },

    /// Every decode backend failed to produce a pixel surface
    #[error("Decode error for {file}: {message}")]
    Decode { file: String, message: String },

    /// Encoding produced no bytes after fallback was exhausted
    #[error("Encode error for {file}: {message}")]
    Encode { file: String, message: String },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {file} after {timeout_ms}ms")]
    Timeout {
        file: String,
        stage: String,
        timeout_ms: u64,
    },

    /// File exceeds size limit
    #[error("File too large: {file} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        file: String,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {file} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        file: String,
        width: u32,
        height: u32,
        max_dim: u32,
    },
}

/// Convenience type alias for scour results.
pub type Result<T> = std::result::Result<T, ScourError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
