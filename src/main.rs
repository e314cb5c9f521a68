use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, warn};
use rayon::prelude::*;
use snapfit::config::{self, PipelineConfig};
use snapfit::imaging::{
    CompressionTarget, ImageNormalizationPipeline, Normalized, OutputFormat,
    PipelineError, Rasterizer, RustRasterizer, read_orientation, validation,
};
use snapfit::{naming, output};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Parser)]
#[command(name = "snapfit")]
#[command(about = "Orientation correction and size-bounded compression for photo uploads")]
#[command(long_about = "\
Orientation correction and size-bounded compression for photo uploads

Phones store photos sideways and record the intended rotation in an EXIF tag.
snapfit redraws such images upright, then re-encodes them until they fit a
byte budget: first by lowering quality, then by a bounded downscale.

  snapfit orientation IMG_2041.jpg
  snapfit validate --json portraits/
  snapfit normalize --preset fit --out-dir out/ photos/

Run 'snapfit gen-config' to generate a documented snapfit.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./snapfit.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the EXIF orientation and upright dimensions of each file
    Orientation {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Check upright dimensions against the portrait requirements
    Validate {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Redraw images upright and fit them into a byte budget
    Normalize(NormalizeArgs),
    /// Print a stock snapfit.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct NormalizeArgs {
    /// Files or directories (searched recursively for .jpg/.jpeg/.png)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(long, default_value = "normalized")]
    out_dir: PathBuf,

    /// Named byte budget
    #[arg(long, value_enum, conflicts_with = "max_bytes")]
    preset: Option<Preset>,

    /// Byte budget (overrides compression.max_bytes)
    #[arg(long)]
    max_bytes: Option<usize>,

    /// Output format (overrides compression.format)
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Only correct orientation; never re-encode for size
    #[arg(long)]
    no_compress: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    /// 1 MB, for images sent to the generation API
    Fit,
    /// 5 MB general upload limit
    General,
}

impl Preset {
    fn max_bytes(self) -> usize {
        match self {
            Self::Fit => config::FIT_IMAGE_MAX_BYTES,
            Self::General => config::GENERAL_MAX_BYTES,
        }
    }
}

#[derive(Error, Debug)]
enum FileError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[derive(Error, Debug)]
#[error("{failed} of {total} files failed")]
struct BatchFailed {
    failed: usize,
    total: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Orientation { files } => {
            let raster = RustRasterizer::new();
            for (i, path) in files.iter().enumerate() {
                let bytes = read_file(path)?;
                let code = read_orientation(&bytes);
                let upright = raster.identify(&bytes).ok().map(|raw| code.apply_to(raw));
                output::print_orientation(i + 1, &display_name(path), code, upright);
            }
        }
        Command::Validate { inputs, json } => {
            let config = load_config(cli.config.as_deref())?;
            let files = collect_images(&inputs)?;
            let raster = RustRasterizer::new();

            let mut checked = Vec::with_capacity(files.len());
            for path in &files {
                let bytes = read_file(path)?;
                let raw = raster.identify(&bytes)?;
                let dims = read_orientation(&bytes).apply_to(raw);
                let result = validation::validate(dims, &config.portrait);
                checked.push((path.display().to_string(), dims, result));
            }

            if json {
                let records: Vec<_> = checked
                    .iter()
                    .map(|(path, dims, v)| output::ValidationRecord {
                        path,
                        dimensions: *dims,
                        validation: v,
                    })
                    .collect();
                println!("{}", output::format_validation_json(&records)?);
            } else {
                for (i, (path, dims, v)) in checked.iter().enumerate() {
                    output::print_validation(i + 1, &display_name(Path::new(path)), *dims, v);
                }
            }

            let failed = checked.iter().filter(|(_, _, v)| !v.is_valid).count();
            if failed > 0 {
                return Err(BatchFailed {
                    failed,
                    total: checked.len(),
                }
                .into());
            }
        }
        Command::Normalize(args) => {
            let config = load_config(cli.config.as_deref())?;
            normalize(&config, &args)?;
        }
    }

    Ok(())
}

fn normalize(config: &PipelineConfig, args: &NormalizeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let files = collect_images(&args.inputs)?;
    std::fs::create_dir_all(&args.out_dir)?;
    init_thread_pool(&config.processing);

    let mut compression = config.compression.clone();
    if let Some(preset) = args.preset {
        compression.max_bytes = preset.max_bytes();
    }
    if let Some(max_bytes) = args.max_bytes {
        compression.max_bytes = max_bytes;
    }
    if let Some(format) = args.format {
        compression.format = format;
    }
    let target = (!args.no_compress).then(|| compression.target());

    let raster = RustRasterizer::new();
    let pipeline = ImageNormalizationPipeline::new(&raster, config.pipeline_options());

    let stems = naming::output_stems(&files);
    let results: Vec<_> = files
        .par_iter()
        .zip(&stems)
        .map(|(path, stem)| normalize_file(&pipeline, path, stem, target.as_ref(), &args.out_dir))
        .collect();

    let mut failed = 0;
    for (i, (path, result)) in files.iter().zip(&results).enumerate() {
        let source = path.display().to_string();
        match result {
            Ok((input_len, destination, normalized)) => output::print_normalized(
                i + 1,
                &source,
                *input_len,
                &destination.display().to_string(),
                normalized,
            ),
            Err(e) => {
                failed += 1;
                if let FileError::Pipeline(p) = e {
                    if p.is_timeout() {
                        warn!("{source}: rasterizer timed out during {}", p.stage());
                    }
                }
                output::print_failure(i + 1, &source, &e.to_string());
            }
        }
    }

    println!();
    println!("{}", output::format_summary("Normalized", files.len(), failed));
    if failed > 0 {
        return Err(BatchFailed {
            failed,
            total: files.len(),
        }
        .into());
    }
    Ok(())
}

fn normalize_file(
    pipeline: &ImageNormalizationPipeline<'_, RustRasterizer>,
    path: &Path,
    stem: &str,
    target: Option<&CompressionTarget>,
    out_dir: &Path,
) -> Result<(usize, PathBuf, Normalized), FileError> {
    let bytes = read_file(path)?;
    let normalized = pipeline.process(&bytes, target)?;

    let extension = OutputFormat::sniff(&normalized.bytes).extension();
    let destination = out_dir.join(format!("{stem}.{extension}"));
    std::fs::write(&destination, &normalized.bytes).map_err(|source| FileError::Io {
        path: destination.display().to_string(),
        source,
    })?;
    debug!("{} → {}", path.display(), destination.display());

    Ok((bytes.len(), destination, normalized))
}

fn read_file(path: &Path) -> Result<Vec<u8>, FileError> {
    std::fs::read(path).map_err(|source| FileError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Expand directories into the images they contain, sorted by path.
/// Files named explicitly are kept regardless of extension.
fn collect_images(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(input).follow_links(true) {
            let entry = entry?;
            if entry.file_type().is_file() && is_image(entry.path()) {
                found.push(entry.into_path());
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, config::ConfigError> {
    match path {
        Some(p) => config::load_config_file(p),
        None => config::load_config(Path::new(".")),
    }
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
