//! Scour Core - Embeddable image metadata removal library.
//!
//! Scour takes image bytes in and produces cleaned image bytes out, with a
//! verification record proving no recognizable metadata survived. Nothing
//! here touches the filesystem; callers own I/O.
//!
//! # Architecture
//!
//! Every image moves through the same linear progression:
//!
//! ```text
//! Bytes → Preflight → Strip or Re-encode → Verify → Digest → ProcessedImage
//! ```
//!
//! Strip walks the container (JPEG markers, PNG chunks, WebP RIFF chunks)
//! and drops metadata segments while copying pixel data untouched.
//! Re-encode decodes the first frame and writes a brand new file in the
//! target format, so even unrecognized metadata cannot survive.
//!
//! # Usage
//!
//! ```rust,ignore
//! use scour_core::{Scour, SourceImage};
//!
//! #[tokio::main]
//! async fn main() -> scour_core::Result<()> {
//!     let scour = Scour::with_defaults()?;
//!     let bytes = std::fs::read("./photo.jpg")?;
//!     let source = SourceImage::new(bytes, "image/jpeg", "photo.jpg");
//!
//!     let cleaned = scour.clean(&source, &scour.default_options()).await?;
//!     std::fs::write(&cleaned.suggested_file_name, &cleaned.result_bytes)?;
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod hash;
pub mod probe;
pub mod processor;
pub mod reencode;
pub mod strip;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{ConfigError, PipelineError, PipelineResult, Result, ScourError};
pub use processor::{output_file_name, ImageCleaner};
pub use reencode::{CodecBackend, EncodeParams, ReencodePipeline};
pub use strip::StripOutcome;
pub use types::{
    BatchProgress, CleanMode, CleanOptions, ImageKind, MetadataKind, ProcessedImage, SourceImage,
    TargetFormat, VerificationRecord,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Scour cleaner - the main entry point for image cleaning.
///
/// Wires a loaded [`Config`] to an [`ImageCleaner`] and carries the
/// configured default options.
pub struct Scour {
    config: Config,
    cleaner: ImageCleaner,
}

impl Scour {
    /// Create a new Scour instance with the given configuration.
    pub fn new(config: Config) -> Self {
        tracing::debug!("Initializing scour v{}", VERSION);
        let cleaner = ImageCleaner::new(config.limits.clone());
        Self { config, cleaner }
    }

    /// Create a new Scour instance with configuration from the default path.
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(Config::load()?))
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cleaning options seeded from the configured defaults.
    pub fn default_options(&self) -> CleanOptions {
        self.config.cleaning.to_options()
    }

    /// Clean a single image.
    pub async fn clean(
        &self,
        source: &SourceImage,
        options: &CleanOptions,
    ) -> PipelineResult<ProcessedImage> {
        self.cleaner.process_one(source, options).await
    }

    /// Clean a batch of images sequentially, reporting progress per file.
    pub async fn clean_batch<F>(
        &self,
        sources: &[SourceImage],
        options: &CleanOptions,
        on_progress: F,
    ) -> Vec<ProcessedImage>
    where
        F: FnMut(BatchProgress),
    {
        self.cleaner
            .process_batch(sources, options, on_progress)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_scour_new_plumbs_config() {
        let mut config = Config::default();
        config.cleaning.mode = CleanMode::Reencode;
        config.cleaning.target_format = TargetFormat::Webp;

        let scour = Scour::new(config);
        assert_eq!(scour.config().limits.max_file_size_mb, 100);
        assert_eq!(scour.default_options().mode, CleanMode::Reencode);
        assert_eq!(scour.default_options().target_format, TargetFormat::Webp);
    }
}
