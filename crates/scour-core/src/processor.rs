//! Cleaning orchestration - wires together all processing stages.
//!
//! One image moves through a fixed progression: format resolution,
//! size and dimension preflight, the selected cleaning mode (strip or
//! re-encode), then verification and digests. Batches run strictly
//! sequentially; a failed file is logged and excluded, never fatal.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::hash;
use crate::probe;
use crate::reencode::{CodecError, EncodeParams, ReencodePipeline};
use crate::strip;
use crate::types::{
    BatchProgress, CleanMode, CleanOptions, ImageKind, ProcessedImage, SourceImage,
};

/// The main cleaner that orchestrates the full pipeline.
pub struct ImageCleaner {
    limits: LimitsConfig,
    pipeline: Arc<ReencodePipeline>,
}

impl Default for ImageCleaner {
    fn default() -> Self {
        Self::new(LimitsConfig::default())
    }
}

impl ImageCleaner {
    /// Create a cleaner with the standard re-encode backend chain.
    pub fn new(limits: LimitsConfig) -> Self {
        Self {
            limits,
            pipeline: Arc::new(ReencodePipeline::new()),
        }
    }

    /// Create a cleaner backed by a caller-assembled pipeline.
    pub fn with_pipeline(limits: LimitsConfig, pipeline: ReencodePipeline) -> Self {
        Self {
            limits,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Clean a single in-memory image.
    pub async fn process_one(
        &self,
        source: &SourceImage,
        options: &CleanOptions,
    ) -> PipelineResult<ProcessedImage> {
        let start = std::time::Instant::now();
        tracing::debug!("Cleaning: {:?}", source.file_name);

        let kind = ImageKind::from_mime(&source.declared_mime).ok_or_else(|| {
            PipelineError::UnsupportedFormat {
                file: source.file_name.clone(),
                mime: source.declared_mime.clone(),
            }
        })?;

        self.check_size(source)?;
        // The probe reads container headers only. None means no parseable
        // header; the per-mode stages surface that as their own error.
        if let Some((width, height)) = probe::dimensions(&source.bytes) {
            self.check_dimensions(source, width, height)?;
        }
        let preflight_time = start.elapsed();
        tracing::trace!("  Preflight: {:?}", preflight_time);

        let original_digest = hash::content_digest(&source.bytes);

        let clean_start = std::time::Instant::now();
        let (result_bytes, width, height, result_kind) = match options.mode {
            CleanMode::Strip => self.strip_stage(source, kind)?,
            CleanMode::Reencode => self.reencode_stage(source, kind, options).await?,
        };
        let clean_time = clean_start.elapsed();
        tracing::trace!("  Clean ({}): {:?}", options.mode.as_str(), clean_time);

        let verify_start = std::time::Instant::now();
        let verification = hash::verify(&result_bytes, result_kind);
        let result_digest = hash::content_digest(&result_bytes);
        let verify_time = verify_start.elapsed();
        tracing::trace!("  Verify: {:?}", verify_time);

        let suggested_file_name = output_file_name(&source.file_name, options);

        let total_time = start.elapsed();
        tracing::debug!(
            "Cleaned {:?} in {:?} ({}x{}, {} -> {} bytes)",
            source.file_name,
            total_time,
            width,
            height,
            source.bytes.len(),
            result_bytes.len()
        );

        Ok(ProcessedImage {
            result_bytes,
            suggested_file_name,
            original_digest,
            result_digest,
            width,
            height,
            verification,
        })
    }

    /// Clean a batch of images strictly in order.
    ///
    /// Progress is reported as `(index / total) * 100` before each file and
    /// a final 100 after the last. Files that fail are logged and excluded;
    /// the returned vector preserves input order for the survivors.
    pub async fn process_batch<F>(
        &self,
        sources: &[SourceImage],
        options: &CleanOptions,
        mut on_progress: F,
    ) -> Vec<ProcessedImage>
    where
        F: FnMut(BatchProgress),
    {
        let total = sources.len();
        let mut results = Vec::with_capacity(total);

        for (index, source) in sources.iter().enumerate() {
            on_progress(BatchProgress {
                percent: (index as f64 / total as f64) * 100.0,
                file_name: source.file_name.clone(),
            });

            match self.process_one(source, options).await {
                Ok(processed) => results.push(processed),
                Err(e) => {
                    tracing::error!("Skipping {:?}: {}", source.file_name, e);
                }
            }
        }

        on_progress(BatchProgress {
            percent: 100.0,
            file_name: sources
                .last()
                .map(|s| s.file_name.clone())
                .unwrap_or_default(),
        });

        results
    }

    fn strip_stage(
        &self,
        source: &SourceImage,
        kind: ImageKind,
    ) -> PipelineResult<(Vec<u8>, u32, u32, ImageKind)> {
        let outcome = strip::strip_bytes(&source.bytes, kind, &source.file_name)?;
        tracing::debug!(
            "Stripped {:?}: removed {} bytes ({:?})",
            source.file_name,
            outcome.bytes_removed,
            outcome.removed
        );

        let (width, height) =
            probe::dimensions(&outcome.bytes).ok_or_else(|| PipelineError::Decode {
                file: source.file_name.clone(),
                message: "no readable dimensions in stripped output".to_string(),
            })?;

        Ok((outcome.bytes, width, height, kind))
    }

    async fn reencode_stage(
        &self,
        source: &SourceImage,
        kind: ImageKind,
        options: &CleanOptions,
    ) -> PipelineResult<(Vec<u8>, u32, u32, ImageKind)> {
        let pipeline = Arc::clone(&self.pipeline);
        let bytes = source.bytes.clone();
        let params = EncodeParams {
            format: options.target_format,
            quality: options.quality,
            lossless: options.lossless,
        };
        let timeout_ms = self.limits.reencode_timeout_ms;

        let reencode_result = timeout(Duration::from_millis(timeout_ms), async {
            tokio::task::spawn_blocking(move || pipeline.reencode(&bytes, kind, &params)).await
        })
        .await;

        let encoded = match reencode_result {
            Ok(Ok(Ok(encoded))) => encoded,
            Ok(Ok(Err(CodecError::Decode(message)))) => {
                return Err(PipelineError::Decode {
                    file: source.file_name.clone(),
                    message,
                })
            }
            Ok(Ok(Err(CodecError::Encode(message)))) => {
                return Err(PipelineError::Encode {
                    file: source.file_name.clone(),
                    message,
                })
            }
            Ok(Err(e)) => {
                return Err(PipelineError::Decode {
                    file: source.file_name.clone(),
                    message: format!("Task join error: {}", e),
                })
            }
            Err(_) => {
                return Err(PipelineError::Timeout {
                    file: source.file_name.clone(),
                    stage: "reencode".to_string(),
                    timeout_ms,
                })
            }
        };

        Ok((
            encoded.bytes,
            encoded.width,
            encoded.height,
            options.target_format.kind(),
        ))
    }

    fn check_size(&self, source: &SourceImage) -> PipelineResult<()> {
        // Enforced in bytes; the MB figures exist for the error message.
        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if source.bytes.len() as u64 > max_bytes {
            return Err(PipelineError::FileTooLarge {
                file: source.file_name.clone(),
                size_mb: source.bytes.len() as u64 / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }
        Ok(())
    }

    fn check_dimensions(
        &self,
        source: &SourceImage,
        width: u32,
        height: u32,
    ) -> PipelineResult<()> {
        if width > self.limits.max_image_dimension || height > self.limits.max_image_dimension {
            return Err(PipelineError::ImageTooLarge {
                file: source.file_name.clone(),
                width,
                height,
                max_dim: self.limits.max_image_dimension,
            });
        }
        Ok(())
    }
}

/// Derive the output name from the input name: `photo.jpeg` becomes
/// `photo_clean.jpeg`. Strip keeps the original extension; re-encode
/// substitutes the target format's.
pub fn output_file_name(file_name: &str, options: &CleanOptions) -> String {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    match options.mode {
        CleanMode::Strip => match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}_clean.{}", stem, ext),
            None => format!("{}_clean", stem),
        },
        CleanMode::Reencode => {
            format!("{}_clean.{}", stem, options.target_format.extension())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reencode::{CodecBackend, DecodedFrame, NativeCodec};
    use crate::types::TargetFormat;
    use std::io::Cursor;

    fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 80, 200]));
        let mut cursor = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, image::ImageFormat::Jpeg)
            .unwrap();
        cursor.into_inner()
    }

    fn tagged_jpeg(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = sample_jpeg(width, height);
        let mut inserted = crate::strip::jpeg::app1_exif_segment(120);
        inserted.extend_from_slice(&crate::strip::jpeg::com_segment(40));
        bytes.splice(2..2, inserted);
        bytes
    }

    #[tokio::test]
    async fn test_strip_jpeg_end_to_end() {
        let cleaner = ImageCleaner::default();
        let source = SourceImage::new(tagged_jpeg(10, 10), "image/jpeg", "photo.jpeg");

        let processed = cleaner
            .process_one(&source, &CleanOptions::default())
            .await
            .unwrap();

        assert_eq!(processed.suggested_file_name, "photo_clean.jpeg");
        assert_ne!(processed.original_digest, processed.result_digest);
        assert!(processed.result_bytes.len() < source.bytes.len());
        assert_eq!((processed.width, processed.height), (10, 10));
        assert!(processed.verification.is_clean);
        assert!(!processed.verification.metadata_detected);
    }

    #[tokio::test]
    async fn test_strip_preserves_pixels() {
        let tagged = tagged_jpeg(16, 16);
        let cleaner = ImageCleaner::default();
        let source = SourceImage::new(tagged.clone(), "image/jpeg", "photo.jpg");

        let processed = cleaner
            .process_one(&source, &CleanOptions::default())
            .await
            .unwrap();

        let before = image::load_from_memory(&tagged).unwrap().to_rgb8();
        let after = image::load_from_memory(&processed.result_bytes)
            .unwrap()
            .to_rgb8();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_reencode_to_png_keeps_dimensions() {
        let cleaner = ImageCleaner::default();
        let source = SourceImage::new(sample_jpeg(100, 50), "image/jpeg", "photo.jpeg");
        let options = CleanOptions {
            mode: CleanMode::Reencode,
            ..Default::default()
        };

        let processed = cleaner.process_one(&source, &options).await.unwrap();

        assert_eq!(processed.suggested_file_name, "photo_clean.png");
        assert_eq!((processed.width, processed.height), (100, 50));
        assert!(processed.result_bytes.starts_with(&[0x89, b'P', b'N', b'G']));
        assert!(processed.verification.is_clean);
    }

    #[tokio::test]
    async fn test_unsupported_mime_rejected() {
        let cleaner = ImageCleaner::default();
        let source = SourceImage::new(vec![0x47, 0x49, 0x46], "image/gif", "anim.gif");

        let err = cleaner
            .process_one(&source, &CleanOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn test_file_too_large_rejected() {
        let limits = LimitsConfig {
            max_file_size_mb: 1,
            ..Default::default()
        };
        let cleaner = ImageCleaner::new(limits);
        let source = SourceImage::new(vec![0u8; 2 * 1024 * 1024], "image/jpeg", "huge.jpg");

        let err = cleaner
            .process_one(&source, &CleanOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::FileTooLarge {
                size_mb: 2,
                max_mb: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_size_limit_enforced_in_bytes() {
        // 1,600,000 bytes truncates to 1 MB but still exceeds a 1 MB cap.
        let limits = LimitsConfig {
            max_file_size_mb: 1,
            ..Default::default()
        };
        let cleaner = ImageCleaner::new(limits);
        let source = SourceImage::new(vec![0u8; 1_600_000], "image/jpeg", "over.jpg");

        let err = cleaner
            .process_one(&source, &CleanOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::FileTooLarge {
                size_mb: 1,
                max_mb: 1,
                ..
            }
        ));

        // Exactly at the cap clears preflight; the zero bytes then fail as
        // a missing SOI, not as a size violation.
        let at_limit = SourceImage::new(vec![0u8; 1024 * 1024], "image/jpeg", "exact.jpg");
        let err = cleaner
            .process_one(&at_limit, &CleanOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Format { .. }));
    }

    #[tokio::test]
    async fn test_image_dimension_limit() {
        let limits = LimitsConfig {
            max_image_dimension: 10,
            ..Default::default()
        };
        let cleaner = ImageCleaner::new(limits);
        let source = SourceImage::new(sample_jpeg(20, 5), "image/jpeg", "wide.jpg");

        let err = cleaner
            .process_one(&source, &CleanOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ImageTooLarge {
                width: 20,
                height: 5,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_batch_skips_failures_and_reports_progress() {
        let cleaner = ImageCleaner::default();
        let sources = vec![
            SourceImage::new(tagged_jpeg(8, 8), "image/jpeg", "a.jpg"),
            SourceImage::new(vec![0xFF, 0x00, 0x01], "image/jpeg", "broken.jpg"),
            SourceImage::new(tagged_jpeg(8, 8), "image/jpeg", "b.jpg"),
            SourceImage::new(tagged_jpeg(8, 8), "image/jpeg", "c.jpg"),
        ];

        let mut events = Vec::new();
        let results = cleaner
            .process_batch(&sources, &CleanOptions::default(), |p| events.push(p))
            .await;

        assert_eq!(results.len(), 3);
        let names: Vec<_> = results
            .iter()
            .map(|r| r.suggested_file_name.as_str())
            .collect();
        assert_eq!(names, ["a_clean.jpg", "b_clean.jpg", "c_clean.jpg"]);

        let percents: Vec<f64> = events.iter().map(|p| p.percent).collect();
        assert_eq!(percents, [0.0, 25.0, 50.0, 75.0, 100.0]);
        assert_eq!(events[1].file_name, "broken.jpg");
        assert_eq!(events[4].file_name, "c.jpg");
    }

    #[tokio::test]
    async fn test_empty_batch_completes() {
        let cleaner = ImageCleaner::default();

        let mut events = Vec::new();
        let results = cleaner
            .process_batch(&[], &CleanOptions::default(), |p| events.push(p))
            .await;

        assert!(results.is_empty());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].percent, 100.0);
        assert_eq!(events[0].file_name, "");
    }

    struct SlowBackend;

    impl CodecBackend for SlowBackend {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn decode_first_frame(
            &self,
            data: &[u8],
            kind: ImageKind,
        ) -> Result<DecodedFrame, CodecError> {
            std::thread::sleep(Duration::from_millis(250));
            NativeCodec.decode_first_frame(data, kind)
        }
    }

    #[tokio::test]
    async fn test_reencode_times_out() {
        let limits = LimitsConfig {
            reencode_timeout_ms: 5,
            ..Default::default()
        };
        let pipeline = ReencodePipeline::with_backends(vec![Box::new(SlowBackend)]);
        let cleaner = ImageCleaner::with_pipeline(limits, pipeline);
        let source = SourceImage::new(sample_jpeg(4, 4), "image/jpeg", "slow.jpg");
        let options = CleanOptions {
            mode: CleanMode::Reencode,
            ..Default::default()
        };

        let err = cleaner.process_one(&source, &options).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Timeout { timeout_ms: 5, .. }
        ));
    }

    #[test]
    fn test_output_file_name_rules() {
        let strip = CleanOptions::default();
        assert_eq!(output_file_name("photo.jpeg", &strip), "photo_clean.jpeg");
        assert_eq!(
            output_file_name("archive.tar.png", &strip),
            "archive.tar_clean.png"
        );
        assert_eq!(output_file_name("noext", &strip), "noext_clean");

        let to_jpeg = CleanOptions {
            mode: CleanMode::Reencode,
            target_format: TargetFormat::Jpeg,
            ..Default::default()
        };
        assert_eq!(output_file_name("photo.png", &to_jpeg), "photo_clean.jpg");

        let to_webp = CleanOptions {
            mode: CleanMode::Reencode,
            target_format: TargetFormat::Webp,
            ..Default::default()
        };
        assert_eq!(output_file_name("photo.png", &to_webp), "photo_clean.webp");
    }
}
