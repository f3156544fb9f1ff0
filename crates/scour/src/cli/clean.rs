//! The `scour clean` command for cleaning images.

use clap::{Args, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use scour_core::{
    CleanMode, CleanOptions, Config, ImageKind, ProcessedImage, Scour, SourceImage, TargetFormat,
};

/// Arguments for the `clean` command.
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Image files or directories to clean
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Cleaning mode (defaults to the configured mode)
    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// Target format when re-encoding (defaults to the configured format)
    #[arg(short, long, value_enum)]
    pub format: Option<Format>,

    /// JPEG quality between 0.0 and 1.0 when re-encoding
    #[arg(short, long)]
    pub quality: Option<f32>,

    /// Prefer lossless encoding where the target supports it
    #[arg(long)]
    pub lossless: bool,

    /// Write cleaned files into this directory instead of alongside inputs
    #[arg(short, long, env = "SCOUR_OUTPUT_DIR", value_name = "DIR")]
    pub output_dir: Option<String>,

    /// Recurse into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Overwrite existing output files
    #[arg(long)]
    pub force: bool,

    /// Write a JSON manifest of the results to this path
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,
}

/// Cleaning strategies.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Mode {
    /// Walk the container and drop metadata segments, pixels untouched
    Strip,
    /// Decode the first frame and write a brand new file
    Reencode,
}

impl From<Mode> for CleanMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Strip => CleanMode::Strip,
            Mode::Reencode => CleanMode::Reencode,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Strip => write!(f, "strip"),
            Mode::Reencode => write!(f, "reencode"),
        }
    }
}

/// Re-encode target formats.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Format {
    /// Lossless PNG
    Png,
    /// Baseline JPEG at the configured quality
    Jpeg,
    /// Lossless WebP
    Webp,
}

impl From<Format> for TargetFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Png => TargetFormat::Png,
            Format::Jpeg => TargetFormat::Jpeg,
            Format::Webp => TargetFormat::Webp,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Png => write!(f, "png"),
            Format::Jpeg => write!(f, "jpeg"),
            Format::Webp => write!(f, "webp"),
        }
    }
}

/// One manifest record: where a cleaned file came from and went, plus the
/// digests and verification the pipeline produced.
#[derive(Debug, Serialize)]
struct ManifestEntry {
    input: String,
    output: String,
    #[serde(flatten)]
    image: ProcessedImage,
}

/// Execute the clean command.
pub async fn execute(args: CleanArgs, config: Config) -> anyhow::Result<()> {
    let options = build_options(&args, &config)?;
    let scour = Scour::new(config);

    let files = discover_files(&args.inputs, args.recursive);
    if files.is_empty() {
        tracing::warn!("No supported image files found");
        return Ok(());
    }
    tracing::info!("Found {} image(s) to clean", files.len());

    let output_dir = args
        .output_dir
        .as_deref()
        .map(|raw| PathBuf::from(shellexpand::tilde(raw).into_owned()));
    if let Some(dir) = &output_dir {
        std::fs::create_dir_all(dir)?;
    }

    let progress = create_progress_bar(files.len() as u64);
    let start_time = std::time::Instant::now();

    let mut succeeded: u64 = 0;
    let mut failed: u64 = 0;
    let mut skipped: u64 = 0;
    let mut bytes_in: u64 = 0;
    let mut bytes_out: u64 = 0;
    let mut manifest = Vec::new();

    for path in &files {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                failed += 1;
                tracing::error!("Failed: {:?} - {}", path, e);
                progress.inc(1);
                continue;
            }
        };

        // discover_files only yields supported extensions
        let Some(kind) = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageKind::from_extension)
        else {
            progress.inc(1);
            continue;
        };

        let in_len = bytes.len() as u64;
        let source = SourceImage::new(bytes, kind.mime(), file_name);

        match scour.clean(&source, &options).await {
            Ok(processed) => {
                let out_path =
                    output_path(path, output_dir.as_deref(), &processed.suggested_file_name);
                if out_path.exists() && !args.force {
                    skipped += 1;
                    tracing::warn!("Exists, not overwriting (use --force): {:?}", out_path);
                } else if let Err(e) = tokio::fs::write(&out_path, &processed.result_bytes).await {
                    failed += 1;
                    tracing::error!("Failed: {:?} - {}", out_path, e);
                } else {
                    succeeded += 1;
                    bytes_in += in_len;
                    bytes_out += processed.result_bytes.len() as u64;
                    tracing::debug!("Wrote {:?}", out_path);
                    manifest.push(ManifestEntry {
                        input: path.display().to_string(),
                        output: out_path.display().to_string(),
                        image: processed,
                    });
                }
            }
            Err(e) => {
                failed += 1;
                tracing::error!("Failed: {:?} - {}", path, e);
            }
        }

        // Update progress bar with rate
        progress.inc(1);
        let elapsed = start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            let processed_count = succeeded + failed;
            let rate = processed_count as f64 / elapsed;
            progress.set_message(format!("{:.1} img/sec", rate));
        }
    }

    progress.finish_and_clear();

    if let Some(manifest_path) = &args.manifest {
        let json = serde_json::to_string_pretty(&manifest)?;
        std::fs::write(manifest_path, json)?;
        tracing::info!("Manifest written to {:?}", manifest_path);
    }

    let elapsed = start_time.elapsed();
    print_summary(succeeded, failed, skipped, bytes_in, bytes_out, elapsed);

    if failed > 0 {
        anyhow::bail!("{failed} file(s) failed");
    }
    Ok(())
}

/// Resolve per-run options: config defaults overridden by flags.
fn build_options(args: &CleanArgs, config: &Config) -> anyhow::Result<CleanOptions> {
    let mut options = config.cleaning.to_options();
    if let Some(mode) = args.mode {
        options.mode = mode.into();
    }
    if let Some(format) = args.format {
        options.target_format = format.into();
    }
    if let Some(quality) = args.quality {
        anyhow::ensure!(
            (0.0..=1.0).contains(&quality),
            "--quality must be between 0.0 and 1.0, got {quality}"
        );
        options.quality = quality;
    }
    if args.lossless {
        options.lossless = true;
    }
    Ok(options)
}

/// Collect supported image files from the input paths.
///
/// Files are accepted by extension. Directories are walked one level deep
/// unless `recursive` is set. The result is sorted for deterministic order.
fn discover_files(inputs: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_file() {
            if supported(input) {
                files.push(input.clone());
            } else {
                tracing::warn!("Skipping unsupported file {:?}", input);
            }
            continue;
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        for entry in WalkDir::new(input)
            .max_depth(max_depth)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && supported(path) {
                files.push(path.to_path_buf());
            }
        }
    }

    files.sort();
    files.dedup();
    files
}

/// Check if a file has a supported extension.
fn supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageKind::from_extension)
        .is_some()
}

/// Where a cleaned file lands: the chosen output directory, or next to its
/// input.
fn output_path(input: &Path, output_dir: Option<&Path>, suggested_name: &str) -> PathBuf {
    match output_dir {
        Some(dir) => dir.join(suggested_name),
        None => input
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default()
            .join(suggested_name),
    }
}

/// Create a progress bar for batch cleaning.
fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )
            .unwrap()
            .progress_chars("##-"),
    );
    pb.set_message("cleaning...");
    pb
}

/// Print a formatted summary table after cleaning.
fn print_summary(
    succeeded: u64,
    failed: u64,
    skipped: u64,
    bytes_in: u64,
    bytes_out: u64,
    elapsed: std::time::Duration,
) {
    let total = succeeded + failed + skipped;
    let rate = if elapsed.as_secs_f64() > 0.0 {
        succeeded as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };
    let mb_in = bytes_in as f64 / 1_000_000.0;
    let mb_out = bytes_out as f64 / 1_000_000.0;

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Cleaned:      {:>8}", succeeded);
    if failed > 0 {
        eprintln!("    Failed:       {:>8}", failed);
    }
    if skipped > 0 {
        eprintln!("    Skipped:      {:>8}", skipped);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", total);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} img/sec", rate);
    eprintln!("    Size:         {:.1} MB in, {:.1} MB out", mb_in, mb_out);
    eprintln!("  ====================================");
}
